use crate::config::{FilterMode, Policy};
use crate::desktop::{Desktop, Scenario};
use crate::events::{EventReceiver, Publisher};
use crate::input::{Dispatch, InputEvent, WheelDirection};
use crate::ipc::{IpcCommand, IpcRequest, IpcResponse};
use crate::task_manager::{ShowOptions, TaskManager, WindowEvent};
use anyhow::Result;
use std::rc::Rc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Runs the card view over a simulated desktop and serves IPC requests.
///
/// Must run inside a `LocalSet`: the card view is single-threaded.
pub struct Daemon {
    task_manager: Rc<TaskManager>,
    desktop: Rc<Desktop>,
    filter: FilterMode,
    window_rx: mpsc::UnboundedReceiver<WindowEvent>,
    event_rx: EventReceiver,
    screenshots: watch::Sender<bool>,
}

impl Daemon {
    pub fn new(scenario: Scenario, policy: Policy, filter: FilterMode) -> Self {
        let desktop = Desktop::new(scenario);
        let (window_tx, window_rx) = mpsc::unbounded_channel();
        desktop.set_event_sender(window_tx);

        let (publisher, event_rx) = Publisher::channel();
        let (screenshots, _) = watch::channel(policy.screenshots_enabled);
        let task_manager = Rc::new(TaskManager::new(
            desktop.collaborators(),
            policy,
            desktop.viewport(),
            publisher,
        ));

        Daemon {
            task_manager,
            desktop,
            filter,
            window_rx,
            event_rx,
            screenshots,
        }
    }

    /// Main event loop
    pub async fn run(mut self, mut ipc_rx: mpsc::UnboundedReceiver<IpcRequest>) -> Result<()> {
        info!("Starting daemon event loop");

        let preference = {
            let task_manager = self.task_manager.clone();
            let rx = self.screenshots.subscribe();
            tokio::task::spawn_local(async move {
                task_manager.follow_screenshot_preference(rx).await;
            })
        };

        loop {
            tokio::select! {
                Some(request) = ipc_rx.recv() => {
                    if request.command == IpcCommand::Shutdown {
                        info!("Shutdown requested");
                        let _ = request.reply.send(IpcResponse::Ok);
                        break;
                    }
                    self.handle_request(request);
                }
                Some(event) = self.window_rx.recv() => {
                    let task_manager = self.task_manager.clone();
                    tokio::task::spawn_local(async move {
                        task_manager.handle_window_event(event).await;
                    });
                }
                Some(event) = self.event_rx.recv() => {
                    info!("Notification: {}", event.name());
                }
                else => {
                    info!("All channels closed, shutting down");
                    break;
                }
            }

            for call in self.desktop.take_calls() {
                debug!("Desktop call: {:?}", call);
            }
        }

        preference.abort();
        Ok(())
    }

    fn handle_request(&self, request: IpcRequest) {
        debug!("IPC command: {:?}, State: {:?}", request.command, self.task_manager.visibility());

        let enabled = match request.command {
            IpcCommand::ScreenshotsOn => Some(true),
            IpcCommand::ScreenshotsOff => Some(false),
            _ => None,
        };
        if let Some(enabled) = enabled {
            self.screenshots.send_replace(enabled);
            let _ = request.reply.send(IpcResponse::Ok);
            return;
        }

        // Lifecycle operations suspend; run them as tasks so the loop keeps
        // serving requests and window events in the meantime
        let task_manager = self.task_manager.clone();
        let filter = self.filter;
        tokio::task::spawn_local(async move {
            let response = execute(&task_manager, request.command, filter).await;
            if request.reply.send(response).is_err() {
                debug!("Client went away before the reply");
            }
        });
    }
}

async fn execute(task_manager: &TaskManager, command: IpcCommand, filter: FilterMode) -> IpcResponse {
    match command {
        IpcCommand::Show => {
            task_manager
                .show(ShowOptions {
                    filter: filter.into(),
                })
                .await;
            IpcResponse::Ok
        }
        IpcCommand::Hide => {
            task_manager.hide(None, None).await;
            IpcResponse::Ok
        }
        IpcCommand::Next | IpcCommand::Prev | IpcCommand::Close => {
            let direction = match command {
                IpcCommand::Next => WheelDirection::Right,
                IpcCommand::Prev => WheelDirection::Left,
                _ => WheelDirection::Down,
            };
            match task_manager.handle_input(InputEvent::Wheel(direction)).await {
                Dispatch::Ignored if !task_manager.is_listening() => {
                    IpcResponse::Error("Card view is not shown".to_string())
                }
                _ => IpcResponse::Ok,
            }
        }
        IpcCommand::Status => {
            let status = task_manager.status();
            IpcResponse::Status {
                visibility: status.visibility,
                card_count: status.card_count,
                current_index: status.current_index,
            }
        }
        IpcCommand::ScreenshotsOn | IpcCommand::ScreenshotsOff | IpcCommand::Shutdown => {
            IpcResponse::Ok
        }
    }
}
