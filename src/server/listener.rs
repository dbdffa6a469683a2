use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db::{VmId, VmStore};
use crate::protocol::{DEFAULT_MAX_FRAME_LENGTH, JsonLineCodec};
use crate::server::connection::Connection;
use crate::server::dispatcher::Dispatcher;
use crate::server::sessions::{ConnectionId, SessionStore};

/// Pause after a failed accept, so a persistent failure such as descriptor
/// exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server speaking the line-delimited JSON protocol.
pub struct Server<S: VmStore> {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher<S>>,
    max_frame_length: usize,
}

impl<S: VmStore + 'static> Server<S> {
    /// Creates a new server with a given listener and store.
    pub fn new(listener: TcpListener, store: Arc<S>) -> Self {
        let sessions = Arc::new(SessionStore::new());
        Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new(store, sessions)),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Sessions of this server's connections.
    pub fn sessions(&self) -> Arc<SessionStore> {
        self.dispatcher.sessions().clone()
    }

    /// Accepts connections until `shutdown` is cancelled, then waits for
    /// every connection task to finish.
    pub async fn serve(self, shutdown: CancellationToken) {
        let mut connections = JoinSet::new();
        info!(addr = ?self.listener.local_addr().ok(), "server listening");

        loop {
            let accepted = tokio::select! {
                res = self.listener.accept() => res,
                Some(res) = connections.join_next(), if !connections.is_empty() => {
                    log_task_exit(res);
                    continue;
                }
                _ = shutdown.cancelled() => break,
            };
            let (socket, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            info!(peer = %peer, "accepted connection");
            let dispatcher = self.dispatcher.clone();
            let codec = JsonLineCodec::with_max_frame_length(self.max_frame_length);
            let cancel_token = shutdown.child_token();

            connections.spawn(async move {
                let session = SessionGuard {
                    sessions: dispatcher.sessions().clone(),
                    peer,
                    armed: true,
                };
                let mut connection = Connection::new(Framed::new(socket, codec), peer, dispatcher);
                if let Err(e) = connection.run(cancel_token).await {
                    warn!(peer = %peer, error = %e, "connection error");
                }

                // The session goes first, then the socket
                let vm_id = session.release();
                drop(connection);
                info!(peer = %peer, vm_id = ?vm_id, "connection closed");
            });
        }

        info!(connections = connections.len(), "server shutting down");
        while let Some(res) = connections.join_next().await {
            log_task_exit(res);
        }
        info!("server stopped");
    }
}

fn log_task_exit(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        error!(error = %e, "connection task failed");
    }
}

/// Removes a connection's session when its task ends.
///
/// A task that returns normally calls `release` before dropping its socket.
/// The `Drop` impl only covers a task that panics or is aborted.
struct SessionGuard {
    sessions: Arc<SessionStore>,
    peer: ConnectionId,
    armed: bool,
}

impl SessionGuard {
    fn release(mut self) -> Option<VmId> {
        self.armed = false;
        self.sessions.remove(self.peer)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.armed {
            let vm_id = self.sessions.remove(self.peer);
            warn!(peer = %self.peer, vm_id = ?vm_id, "connection task ended abnormally");
        }
    }
}
