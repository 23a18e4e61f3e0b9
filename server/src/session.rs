//! Per-connection I/O workers
//!
//! A session is the only code that talks to a player's socket. Its reader
//! decodes inbound JSON into [`PlayerMsg`]s and queues them for the
//! coordinator; its writer relays whatever the hub puts in the session's
//! outbound queue. Neither worker touches game or membership state.

use crate::network::ServerMessage;
use crate::PlayerId;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::PlayerMsg;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// How long one outbound frame, or the closing handshake, may take
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct Session {
    pub id: PlayerId,
    pub addr: SocketAddr,
    server_tx: mpsc::Sender<ServerMessage>,
    outbox_capacity: usize,
    write_timeout: Duration,
}

impl Session {
    pub fn new(
        id: PlayerId,
        addr: SocketAddr,
        server_tx: mpsc::Sender<ServerMessage>,
        outbox_capacity: usize,
    ) -> Self {
        Self {
            id,
            addr,
            server_tx,
            outbox_capacity,
            write_timeout: WRITE_TIMEOUT,
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Performs the WebSocket handshake and runs the session to completion
    pub async fn serve(self, stream: TcpStream) {
        match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => self.run(ws).await,
            Err(e) => warn!("Handshake with {} failed: {}", self.addr, e),
        }
    }

    /// Registers with the coordinator, then reads until the connection ends
    pub async fn run<S>(self, ws: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, mut stream) = ws.split();
        let (outbox, outbox_rx) = mpsc::channel(self.outbox_capacity);

        if self
            .server_tx
            .send(ServerMessage::Connected {
                id: self.id,
                outbox,
            })
            .await
            .is_err()
        {
            error!("Coordinator is gone, dropping {}", self.addr);
            return;
        }
        info!("{} connected from {}", self.id, self.addr);

        let mut writer = tokio::spawn(write_loop(
            self.id,
            sink,
            outbox_rx,
            self.write_timeout,
        ));
        let mut writer_done = false;

        loop {
            // The writer ends on eviction or a stuck socket; stop reading then too
            let frame = tokio::select! {
                frame = stream.next() => frame,
                result = &mut writer => {
                    writer_done = true;
                    if let Err(e) = result {
                        error!("Writer for {} panicked: {}", self.id, e);
                    }
                    debug!("{} writer finished, closing session", self.id);
                    break;
                }
            };
            let Some(frame) = frame else { break };

            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("{} sent a non-UTF-8 frame", self.id);
                        break;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    info!("{} read error: {}", self.id, e);
                    break;
                }
            };

            let msg = match serde_json::from_str::<PlayerMsg>(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("{} sent a malformed message: {}", self.id, e);
                    break;
                }
            };
            debug!("{} -> {:?}", self.id, msg);

            if self
                .server_tx
                .send(ServerMessage::Command { id: self.id, msg })
                .await
                .is_err()
            {
                error!("Coordinator is gone, closing {}", self.id);
                break;
            }
        }

        // Unregistering drops the outbound queue, which stops the writer
        if let Err(e) = self
            .server_tx
            .send(ServerMessage::Disconnected { id: self.id })
            .await
        {
            error!("Failed to report disconnect of {}: {}", self.id, e);
            writer.abort();
            return;
        }
        if !writer_done {
            if let Err(e) = writer.await {
                error!("Writer for {} panicked: {}", self.id, e);
            }
        }
        info!("{} disconnected", self.id);
    }
}

async fn write_loop<S>(
    id: PlayerId,
    mut sink: futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    mut outbox_rx: mpsc::Receiver<Arc<str>>,
    write_timeout: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(payload) = outbox_rx.recv().await {
        let message = Message::Text(payload.to_string());
        match tokio::time::timeout(write_timeout, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                info!("{} write error: {}", id, e);
                return;
            }
            Err(_) => {
                warn!("{} stopped reading, dropping connection", id);
                return;
            }
        }
    }
    // Hub closed the queue
    if tokio::time::timeout(write_timeout, sink.close()).await.is_err() {
        warn!("{} did not take the close frame", id);
    }
}
