use anyhow::{Context, Result, bail};
use cardview::config::Config;
use cardview::daemon::Daemon;
use cardview::desktop::Scenario;
use cardview::{socket_client, socket_server};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Single-instance lock, removed again on drop.
struct Pidfile {
    path: PathBuf,
}

impl Pidfile {
    /// Claim the pidfile under the runtime dir (or ~/.cache), clearing a
    /// stale one left by a dead daemon.
    fn acquire() -> Result<Self> {
        let path = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .context("Could not determine runtime directory")?
            .join("cardview.pid");

        if let Some(pid) = read_pid(&path)? {
            if Path::new(&format!("/proc/{}", pid)).exists() {
                bail!(
                    "Another cardview daemon is already running (PID: {}). \
                     If this is incorrect, remove the pidfile at: {}",
                    pid,
                    path.display()
                );
            }
            info!("Removing stale pidfile (PID {} not found)", pid);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove stale pidfile: {}", e);
            }
        }

        let pid = std::process::id();
        fs::write(&path, pid.to_string()).context("Failed to write pidfile")?;
        info!("Created pidfile at {} with PID {}", path.display(), pid);
        Ok(Pidfile { path })
    }
}

fn read_pid(path: &Path) -> Result<Option<u32>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).context("Failed to read pidfile")?;
    let pid = text.trim().parse().context("Invalid PID in pidfile")?;
    Ok(Some(pid))
}

impl Drop for Pidfile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Removed pidfile at {}", self.path.display()),
            Err(e) => error!("Failed to remove pidfile: {}", e),
        }
    }
}

fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    match config.command().ipc_command() {
        Some(command) => socket_client::send_command_and_exit(command),
        None => run_daemon(config),
    }
}

/// Run the daemon on a single-threaded runtime
fn run_daemon(config: Config) -> Result<()> {
    info!("Starting cardview daemon (filter: {:?})", config.filter);

    let _pidfile = Pidfile::acquire()?;

    let policy = config.policy()?;
    let scenario = match &config.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    info!(
        "Simulating {} windows on a {}x{} viewport",
        scenario.windows.len(),
        scenario.viewport.width,
        scenario.viewport.height
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async move {
        let (ipc_rx, _socket_guard) = socket_server::start_server().await?;
        Daemon::new(scenario, policy, config.filter).run(ipc_rx).await?;
        info!("Daemon exited normally");
        Ok(())
    })
}
