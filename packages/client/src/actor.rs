//! Session actor.
//!
//! One task owns the [`ClientEngine`] and the [`Transport`]; everything else
//! talks to it through a cloneable [`SessionHandle`]. Commands are processed
//! one at a time, so engine triggers never interleave. A resync holds the
//! mailbox while history is fetched; commands sent meanwhile queue up.

use crate::engine::ClientEngine;
use crate::error::EngineError;
use crate::events::SessionEvent;
use crate::protocol::{ModelOperationEvent, OperationAck};
use crate::state::SyncState;
use crate::transport::Transport;
use coedit_model::{ChangeEvent, EventFilter, SubscriptionId};
use coedit_ot::Operation;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Reply<T> = oneshot::Sender<T>;

enum Command {
    SubmitLocal {
        operation: Operation,
        reply: Reply<Result<u64, EngineError>>,
    },
    RemoteOperation {
        event: ModelOperationEvent,
        reply: Reply<Result<(), EngineError>>,
    },
    Acknowledge {
        ack: OperationAck,
        reply: Reply<Result<(), EngineError>>,
    },
    Reconnected {
        server_version: u64,
        reply: Reply<Result<u64, EngineError>>,
    },
    Subscribe {
        filter: EventFilter,
        handler: Box<dyn FnMut(&ChangeEvent) + Send>,
        reply: Reply<SubscriptionId>,
    },
    Snapshot {
        reply: Reply<serde_json::Value>,
    },
    Status {
        reply: Reply<EngineStatus>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Point-in-time summary of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub state: SyncState,
    pub version: u64,
    pub pending: usize,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Applies a local operation and returns its sequence number.
    ///
    /// The operation is sent immediately while the session is live. A
    /// transport error leaves it queued and takes the session offline: later
    /// operations are held and the whole queue is resent, in order, after the
    /// next resync.
    pub async fn submit_local(&self, operation: Operation) -> Result<u64, EngineError> {
        self.request(|reply| Command::SubmitLocal { operation, reply }).await?
    }

    pub async fn remote_operation(&self, event: ModelOperationEvent) -> Result<(), EngineError> {
        self.request(|reply| Command::RemoteOperation { event, reply }).await?
    }

    pub async fn acknowledge(&self, ack: OperationAck) -> Result<(), EngineError> {
        self.request(|reply| Command::Acknowledge { ack, reply }).await?
    }

    /// Replays history up to `server_version` and resends pending operations.
    /// Returns the version the session reached.
    pub async fn reconnected(&self, server_version: u64) -> Result<u64, EngineError> {
        self.request(|reply| Command::Reconnected { server_version, reply }).await?
    }

    /// Registers a document change handler on the session's tree.
    pub async fn on_change(
        &self,
        filter: EventFilter,
        handler: impl FnMut(&ChangeEvent) + Send + 'static,
    ) -> Result<SubscriptionId, EngineError> {
        let handler = Box::new(handler);
        self.request(|reply| Command::Subscribe { filter, handler, reply }).await
    }

    pub async fn snapshot(&self) -> Result<serde_json::Value, EngineError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Detaches the document and stops the actor.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Session events published after each processed command
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request<R>(&self, command: impl FnOnce(Reply<R>) -> Command) -> Result<R, EngineError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        response.await.map_err(|_| EngineError::SessionClosed)
    }
}

/// Moves the engine and transport onto a new task.
pub fn spawn<T: Transport>(engine: ClientEngine, transport: T) -> (SessionHandle, JoinHandle<()>) {
    let capacity = engine.config().command_buffer.max(1);
    let (commands, inbox) = mpsc::channel(capacity);
    let (events, _) = broadcast::channel(capacity);

    let handle = SessionHandle { commands, events: events.clone() };
    let task = tokio::spawn(run(engine, transport, inbox, events));
    (handle, task)
}

async fn run<T: Transport>(
    mut engine: ClientEngine,
    mut transport: T,
    mut inbox: mpsc::Receiver<Command>,
    events: broadcast::Sender<SessionEvent>,
) {
    info!(session = %engine.config().session_id, version = engine.version(), "Session started");

    while let Some(command) = inbox.recv().await {
        let stop = match command {
            Command::SubmitLocal { operation, reply } => {
                let _ = reply.send(submit(&mut engine, &mut transport, operation));
                false
            }
            Command::RemoteOperation { event, reply } => {
                let _ = reply.send(engine.handle_remote(event));
                false
            }
            Command::Acknowledge { ack, reply } => {
                let _ = reply.send(engine.handle_ack(ack));
                false
            }
            Command::Reconnected { server_version, reply } => {
                let _ = reply.send(resync(&mut engine, &mut transport, server_version).await);
                false
            }
            Command::Subscribe { filter, handler, reply } => {
                let _ = reply.send(engine.on(filter, handler));
                false
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(engine.value());
                false
            }
            Command::Status { reply } => {
                let status = EngineStatus {
                    state: engine.state(),
                    version: engine.version(),
                    pending: engine.pending_len(),
                };
                let _ = reply.send(status);
                false
            }
            Command::Shutdown { reply } => {
                engine.detach();
                let _ = reply.send(());
                true
            }
        };

        publish(&mut engine, &events);
        if stop {
            break;
        }
    }

    info!(session = %engine.config().session_id, "Session stopped");
}

fn submit<T: Transport>(engine: &mut ClientEngine, transport: &mut T, operation: Operation) -> Result<u64, EngineError> {
    let event = engine.submit_local(operation)?;
    if engine.state().is_live() {
        if let Err(err) = transport.send_operation(&event) {
            engine.transport_failed();
            return Err(EngineError::Transport(err.0));
        }
    } else {
        debug!(seq_no = event.seq_no, state = %engine.state(), "Holding operation until resync");
    }
    Ok(event.seq_no)
}

async fn resync<T: Transport>(engine: &mut ClientEngine, transport: &mut T, server_version: u64) -> Result<u64, EngineError> {
    let history = match engine.begin_resync(server_version)? {
        Some(request) => {
            debug!(first = request.first, last = request.last, "Requesting history");
            transport.request_history(request).await
        }
        None => Ok(Vec::new()),
    };

    let resend = engine.complete_resync(history)?;
    for event in &resend {
        if let Err(err) = transport.send_operation(event) {
            engine.transport_failed();
            return Err(EngineError::Transport(err.0));
        }
    }
    Ok(engine.version())
}

fn publish(engine: &mut ClientEngine, events: &broadcast::Sender<SessionEvent>) {
    for event in engine.drain_events() {
        if events.send(event).is_err() {
            // No subscribers; later events would be dropped the same way.
            break;
        }
    }
    if engine.state() == SyncState::Unrecoverable {
        warn!(session = %engine.config().session_id, "Session requires a reload");
    }
}
