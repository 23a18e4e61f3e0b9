//! Server network layer: WebSocket listener and the coordinator loop

use crate::game::{Event, Game, Rejection, State};
use crate::hub::{Departure, Hub, Outbox};
use crate::session::Session;
use crate::PlayerId;
use log::{debug, error, info, warn};
use shared::{Command, PlayerMsg};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Outbound payloads a session may have queued before it counts as stalled
    pub outbox_capacity: usize,
    /// Messages the coordinator may have queued from all sessions together
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            outbox_capacity: 16,
            queue_capacity: 1024,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Messages sent from session tasks to the coordinator
#[derive(Debug)]
pub enum ServerMessage {
    Connected { id: PlayerId, outbox: Outbox },
    Command { id: PlayerId, msg: PlayerMsg },
    Disconnected { id: PlayerId },
}

/// Owner of the hub and the game; applies messages strictly one at a time
pub struct Coordinator {
    hub: Hub,
    game: Game,
}

impl Coordinator {
    pub fn new(game: Game) -> Self {
        Self {
            hub: Hub::new(),
            game,
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Processes queued messages until every sender is gone
    pub async fn run(mut self, mut server_rx: mpsc::Receiver<ServerMessage>) {
        while let Some(message) = server_rx.recv().await {
            self.handle(message);
        }
        info!("Coordinator shutting down");
    }

    pub fn handle(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected { id, outbox } => {
                self.hub.register(id, outbox);
                self.game.add_player(id);
            }
            ServerMessage::Command { id, msg } => match self.handle_command(id, &msg) {
                Ok(state) => {
                    debug!("{} -> {}", id, state);
                    debug!("{}", self.game);
                    self.broadcast_desk();
                }
                Err(rejection) => warn!("Rejected {:?} from {}: {}", msg, id, rejection),
            },
            ServerMessage::Disconnected { id } => {
                if let Some(departure) = self.hub.unregister(id) {
                    if self.forget(departure) {
                        self.broadcast_desk();
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, id: PlayerId, msg: &PlayerMsg) -> Result<State, Rejection> {
        if !self.hub.contains(id) {
            return Err(Rejection::UnknownPlayer(id));
        }
        let event = match msg.kind().map_err(Rejection::UnknownCommand)? {
            Command::Start => Event::Start,
            Command::Move => Event::Move {
                player: id,
                card: msg.card()?,
            },
        };
        self.game.apply(self.hub.ring(), event)
    }

    /// Drops a departed player from the game; true if the table changed
    fn forget(&mut self, departure: Departure) -> bool {
        self.game
            .remove_player(self.hub.ring(), departure.id, departure.successor)
    }

    /// Sends the desk to everyone, again if evictions changed the table
    fn broadcast_desk(&mut self) {
        loop {
            let payload: Arc<str> = match serde_json::to_string(&self.game.desk_msg()) {
                Ok(json) => json.into(),
                Err(e) => {
                    error!("Failed to encode desk: {}", e);
                    return;
                }
            };

            let mut changed = false;
            for departure in self.hub.broadcast(payload) {
                changed |= self.forget(departure);
            }
            if !changed {
                return;
            }
        }
    }
}

/// Listening server; accepts connections and feeds the coordinator
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    game: Game,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_game(config, Game::new()).await
    }

    /// Binds with a caller-supplied game, e.g. a seeded one
    pub async fn with_game(
        config: ServerConfig,
        game: Game,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            config,
            game,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Main server loop
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let (server_tx, server_rx) = mpsc::channel(self.config.queue_capacity);

        tokio::spawn(accept_loop(
            self.listener,
            server_tx,
            self.config.outbox_capacity,
        ));

        info!("Server started successfully");
        Coordinator::new(self.game).run(server_rx).await;
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    server_tx: mpsc::Sender<ServerMessage>,
    outbox_capacity: usize,
) {
    let mut next_id: u32 = 1;

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let id = PlayerId(next_id);
                next_id = next_id.wrapping_add(1);

                let session = Session::new(id, addr, server_tx.clone(), outbox_capacity);
                tokio::spawn(session.serve(stream));
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}
