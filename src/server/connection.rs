mod error;

pub use error::ConnectionError;

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::db::VmStore;
use crate::protocol::{JsonLineCodec, ProtocolError};
use crate::server::dispatcher::Dispatcher;
use crate::server::sessions::ConnectionId;

/// A single client connection.
///
/// Each turn of the loop reads one frame, dispatches it and writes one
/// response frame back. The connection ends on end of stream, a blank line,
/// any protocol or I/O fault, or cancellation. Faults are returned to the
/// caller; no error frame is sent for them.
///
/// The session tied to this connection is removed by the listener once
/// `run` returns.
pub struct Connection<S: VmStore> {
    framed: Framed<TcpStream, JsonLineCodec>,
    peer: ConnectionId,
    dispatcher: Arc<Dispatcher<S>>,
}

impl<S: VmStore> Connection<S> {
    pub fn new(
        framed: Framed<TcpStream, JsonLineCodec>,
        peer: ConnectionId,
        dispatcher: Arc<Dispatcher<S>>,
    ) -> Self {
        Self {
            framed,
            peer,
            dispatcher,
        }
    }

    pub fn peer(&self) -> ConnectionId {
        self.peer
    }

    pub async fn run(&mut self, cancel_token: CancellationToken) -> Result<(), ConnectionError> {
        loop {
            tokio::select! {
                res = self.handle_frame() => {
                    if res? {
                        return Ok(());
                    }
                }
                _ = cancel_token.cancelled() => {
                    info!(peer = %self.peer, "connection cancelled");
                    return Ok(());
                }
            }
        }
    }

    /// Handle a single frame from the client.
    /// Returns true if the connection should terminate.
    async fn handle_frame(&mut self) -> Result<bool, ConnectionError> {
        let request = match self.framed.next().await {
            Some(Ok(request)) => request,
            Some(Err(ProtocolError::EmptyFrame)) => {
                debug!(peer = %self.peer, "empty frame");
                return Ok(true);
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(true), // EOF - client disconnected
        };

        debug!(peer = %self.peer, command = ?request.command, "received frame");
        let response = self.dispatcher.dispatch(self.peer, request).await;

        self.framed.send(response).await?;
        Ok(false)
    }
}
