use crate::ipc::{IpcCommand, IpcResponse, get_socket_path};
use anyhow::{Context, Result, bail};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Send `command` to the daemon listening on `socket_path`.
pub fn request_at(socket_path: &Path, command: IpcCommand) -> Result<IpcResponse> {
    let stream = UnixStream::connect(socket_path).with_context(|| {
        format!(
            "Failed to connect to cardview daemon at {}. Is it running?",
            socket_path.display()
        )
    })?;
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;

    let mut writer = &stream;
    writeln!(writer, "{}", command).context("Failed to send command")?;
    writer.flush()?;

    let mut line = String::new();
    BufReader::new(&stream)
        .read_line(&mut line)
        .context("Failed to read daemon response")?;
    if line.trim().is_empty() {
        bail!("Daemon closed the connection without answering `{}`", command);
    }

    serde_json::from_str(&line).context("Failed to parse daemon response")
}

pub fn send_command(command: IpcCommand) -> Result<IpcResponse> {
    request_at(&get_socket_path()?, command)
}

/// Human-readable rendering of a status reply; `None` for other replies.
pub fn describe(response: &IpcResponse) -> Option<String> {
    let IpcResponse::Status {
        visibility,
        card_count,
        current_index,
    } = response
    else {
        return None;
    };

    let mut text = format!("Card view: {:?}\nCards: {}", visibility, card_count);
    if let Some(index) = current_index {
        text.push_str(&format!("\nCurrent card: {}", index));
    }
    Some(text)
}

/// Send command and print result, exit with appropriate code
pub fn send_command_and_exit(command: IpcCommand) -> ! {
    let code = match send_command(command) {
        Ok(IpcResponse::Error(e)) => {
            eprintln!("Error: {}", e);
            1
        }
        Ok(response) => {
            if let Some(text) = describe(&response) {
                println!("{}", text);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_manager::Visibility;
    use std::os::unix::net::UnixListener;
    use std::thread;

    fn serve_once(path: &Path, reply: &'static str) -> thread::JoinHandle<String> {
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(&stream).read_line(&mut line).unwrap();
            let mut writer = &stream;
            writer.write_all(reply.as_bytes()).unwrap();
            line
        })
    }

    fn socket_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("cardview-client-{}-{}.sock", name, std::process::id()))
    }

    #[test]
    fn test_request_round_trip() {
        let path = socket_path("status");
        let _ = std::fs::remove_file(&path);
        let server = serve_once(
            &path,
            "{\"status\":{\"visibility\":\"shown\",\"card_count\":3,\"current_index\":2}}\n",
        );

        let response = request_at(&path, IpcCommand::Status).unwrap();

        assert_eq!(server.join().unwrap().trim(), "status");
        match response {
            IpcResponse::Status {
                visibility,
                card_count,
                current_index,
            } => {
                assert_eq!(visibility, Visibility::Shown);
                assert_eq!(card_count, 3);
                assert_eq!(current_index, Some(2));
            }
            other => panic!("unexpected {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_request_empty_reply_is_error() {
        let path = socket_path("empty");
        let _ = std::fs::remove_file(&path);
        let server = serve_once(&path, "");

        let err = request_at(&path, IpcCommand::Hide).unwrap_err();

        server.join().unwrap();
        assert!(err.to_string().contains("without answering"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_request_without_daemon() {
        let err = request_at(Path::new("/nonexistent/cardview.sock"), IpcCommand::Show).unwrap_err();
        assert!(err.to_string().contains("Is it running?"));
    }

    #[test]
    fn test_describe_status() {
        let text = describe(&IpcResponse::Status {
            visibility: Visibility::Hidden,
            card_count: 0,
            current_index: None,
        })
        .unwrap();
        assert_eq!(text, "Card view: Hidden\nCards: 0");
        assert!(describe(&IpcResponse::Ok).is_none());
    }
}
