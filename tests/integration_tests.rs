//! Integration tests for the Durak server components
//!
//! These tests validate cross-component interactions and real network behavior.

use server::deck::Deck;
use server::game::{Event, Game, Rejection, State};
use server::hub::Hub;
use server::ring::TurnRing;
use server::PlayerId;
use shared::{Card, DeskMsg, PlayerMsg, Suit, HAND_SIZE};
use std::sync::Arc;
use std::time::Duration;

const A: PlayerId = PlayerId(1);
const B: PlayerId = PlayerId(2);

fn card(text: &str) -> Card {
    text.parse().unwrap()
}

fn ring_of(ids: &[PlayerId]) -> TurnRing<PlayerId> {
    let mut ring = TurnRing::new();
    for &id in ids {
        ring.add(id);
    }
    ring
}

/// Two-player game where A holds S7 and B holds S8, hearts are trump
fn rigged_game() -> (TurnRing<PlayerId>, Game) {
    let a = ["S7", "C6", "C7", "C8", "C9", "C10"];
    let b = ["S8", "D6", "D7", "D8", "D9", "DA"];
    let mut order = Vec::new();
    for pass in 0..HAND_SIZE {
        order.push(card(a[pass]));
        order.push(card(b[pass]));
    }
    order.push(card("H6"));
    for c in Card::full_deck() {
        if !order.contains(&c) {
            order.push(c);
        }
    }

    let ring = ring_of(&[A, B]);
    let mut game = Game::with_seed(0);
    game.add_player(A);
    game.add_player(B);
    game.begin(&ring, Deck::from_cards(order), A).unwrap();
    (ring, game)
}

fn play(player: PlayerId, text: &str) -> Event {
    Event::Move {
        player,
        card: Some(card(text)),
    }
}

fn pass(player: PlayerId) -> Event {
    Event::Move { player, card: None }
}

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Inbound messages decode from the exact client JSON
    #[test]
    fn player_msg_from_client_json() {
        let start: PlayerMsg = serde_json::from_str(r#"{"command":0,"card":""}"#).unwrap();
        assert_eq!(start, PlayerMsg::start());

        let mv: PlayerMsg = serde_json::from_str(r#"{"command":1,"card":"DQ"}"#).unwrap();
        assert_eq!(mv.card().unwrap(), Some(card("DQ")));
    }

    /// Malformed JSON does not decode
    #[test]
    fn malformed_player_msg() {
        assert!(serde_json::from_str::<PlayerMsg>("not json").is_err());
        assert!(serde_json::from_str::<PlayerMsg>(r#"{"card":"S7"}"#).is_err());
        assert!(serde_json::from_str::<PlayerMsg>(r#"{"command":"start"}"#).is_err());
    }

    /// Unknown command codes decode and are left for the server to skip
    #[test]
    fn unknown_command_codes_decode() {
        for json in [r#"{"command":-1}"#, r#"{"command":256}"#, r#"{"command":9,"card":""}"#] {
            let msg: PlayerMsg = serde_json::from_str(json).unwrap();
            assert!(msg.kind().is_err());
        }
    }

    /// Outbound desk keeps table order
    #[test]
    fn desk_msg_json() {
        let msg = DeskMsg {
            desk: vec![card("S7"), card("S8")],
        };
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"desk":["S7","S8"]}"#);
    }

    /// Card text validity examples
    #[test]
    fn card_text_validity() {
        assert!(shared::is_valid("S7"));
        assert!(shared::is_valid("H10"));
        assert!(shared::is_valid("DQ"));
        assert!(!shared::is_valid("S1"));
    }
}

/// TURN RING TESTS
mod ring_tests {
    use super::*;

    /// Adding A, B, C links them in a FIFO circle
    #[test]
    fn fifo_circle() {
        let ring = ring_of(&[A, B, PlayerId(3)]);
        assert_eq!(ring.next(A), Ok(B));
        assert_eq!(ring.next(B), Ok(PlayerId(3)));
        assert_eq!(ring.next(PlayerId(3)), Ok(A));
    }

    /// Removing B from [A, B] leaves A pointing at itself
    #[test]
    fn removal_to_single_member() {
        let mut ring = ring_of(&[A, B]);
        ring.remove(B);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.next(A), Ok(A));
    }

    /// Enumeration yields each live member exactly once
    #[test]
    fn enumerate_after_churn() {
        let ids: Vec<PlayerId> = (1..=6).map(PlayerId).collect();
        let mut ring = ring_of(&ids);
        ring.remove(PlayerId(2));
        ring.remove(PlayerId(5));
        ring.add(PlayerId(7));

        let members: Vec<PlayerId> = ring.enumerate().collect();
        assert_eq!(
            members,
            vec![PlayerId(1), PlayerId(3), PlayerId(4), PlayerId(6), PlayerId(7)]
        );
        assert_eq!(members.len(), ring.len());
    }
}

/// GAME ENGINE TESTS
mod engine_tests {
    use super::*;

    /// Start with two players: six cards each, one trump, reveal under the deck
    #[test]
    fn two_player_start() {
        let ring = ring_of(&[A, B]);
        let mut game = Game::with_seed(17);
        game.add_player(A);
        game.add_player(B);

        let state = tokio_test::assert_ok!(game.apply(&ring, Event::Start));
        assert_eq!(state, State::Attack);
        assert_eq!(game.hand(A).unwrap().len(), 6);
        assert_eq!(game.hand(B).unwrap().len(), 6);
        assert_eq!(game.deck().len(), 36 - 12);
        assert_eq!(game.deck().bottom().map(|c| c.suit), game.trump());
    }

    /// Attack S7, defend S8, pass: Beat and the defender becomes attacker
    #[test]
    fn attack_defend_pass_scenario() {
        let (ring, mut game) = rigged_game();
        assert_eq!(game.round().unwrap().attacker, A);

        assert_eq!(game.apply(&ring, play(A, "S7")), Ok(State::Defense));
        assert_eq!(game.desk(), &[card("S7")]);

        assert_eq!(game.apply(&ring, play(B, "S8")), Ok(State::Attack));
        assert_eq!(game.desk(), &[card("S7"), card("S8")]);

        assert_eq!(game.apply(&ring, pass(A)), Ok(State::Attack));
        assert!(game.desk().is_empty());
        assert_eq!(game.round().unwrap().attacker, B);
        assert_eq!(game.round().unwrap().defender, A);
    }

    /// Defender takes: hand grows by the desk size and the turn moves on
    #[test]
    fn defender_takes_scenario() {
        let (ring, mut game) = rigged_game();
        game.apply(&ring, play(A, "S7")).unwrap();

        let before = game.hand(B).unwrap().len();
        let desk = game.desk().len();
        assert_eq!(game.apply(&ring, pass(B)), Ok(State::Attack));

        assert_eq!(game.hand(B).unwrap().len(), before + desk);
        assert!(game.desk().is_empty());
        assert_eq!(game.round().unwrap().attacker, ring.next(B).unwrap());
    }

    /// Out-of-turn moves change nothing
    #[test]
    fn rejection_is_idempotent() {
        let (ring, mut game) = rigged_game();

        let round = *game.round().unwrap();
        let desk = game.desk().to_vec();
        let hand_a = game.hand(A).unwrap().clone();
        let hand_b = game.hand(B).unwrap().clone();

        assert_eq!(game.apply(&ring, play(B, "S8")), Err(Rejection::OutOfTurn(B)));
        assert_eq!(game.apply(&ring, pass(B)), Err(Rejection::OutOfTurn(B)));

        assert_eq!(game.state(), State::Attack);
        assert_eq!(*game.round().unwrap(), round);
        assert_eq!(game.desk(), desk.as_slice());
        assert_eq!(*game.hand(A).unwrap(), hand_a);
        assert_eq!(*game.hand(B).unwrap(), hand_b);
    }

    /// Different non-trump suits cannot beat each other
    #[test]
    fn incomparable_defense_is_rejected() {
        let (ring, mut game) = rigged_game();
        game.apply(&ring, play(A, "S7")).unwrap();
        assert!(matches!(
            game.apply(&ring, play(B, "D6")),
            Err(Rejection::WontBeat { trump: Suit::Hearts, .. })
        ));
        assert_eq!(game.state(), State::Defense);
    }
}

/// HUB TESTS
mod hub_tests {
    use super::*;
    use tokio::sync::mpsc;

    /// A saturated session is evicted while everyone else still receives
    #[test]
    fn broadcast_isolation() {
        let mut hub = Hub::new();
        let (stalled_tx, _stalled_rx) = mpsc::channel(1);
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register(A, tx_a);
        hub.register(PlayerId(3), stalled_tx);
        hub.register(B, tx_b);

        hub.broadcast(Arc::from("one"));
        let evicted = hub.broadcast(Arc::from("two"));

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, PlayerId(3));
        assert!(!hub.ring().enumerate().any(|id| id == PlayerId(3)));

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.try_recv().unwrap().as_ref(), "one");
            assert_eq!(rx.try_recv().unwrap().as_ref(), "two");
        }
    }
}

/// END-TO-END TESTS OVER REAL SOCKETS
mod socket_tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use server::network::{Server, ServerConfig};
    use std::net::SocketAddr;
    use tokio::net::TcpStream;
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server(seed: u64) -> SocketAddr {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::with_game(config, Game::with_seed(seed))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Ws {
        let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        // Let the coordinator register the session before the next step
        sleep(Duration::from_millis(50)).await;
        ws
    }

    async fn send(ws: &mut Ws, msg: &PlayerMsg) {
        let text = serde_json::to_string(msg).unwrap();
        ws.send(Message::Text(text)).await.unwrap();
    }

    async fn recv_desk(ws: &mut Ws) -> Vec<Card> {
        loop {
            let frame = timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("timed out waiting for desk")
                .expect("connection closed")
                .unwrap();
            if let Message::Text(text) = frame {
                return serde_json::from_str::<DeskMsg>(&text).unwrap().desk;
            }
        }
    }

    /// Two players start, attack and take over WebSockets
    #[tokio::test]
    async fn two_players_over_websocket() {
        let seed = 99;
        let addr = start_server(seed).await;
        let mut c1 = connect(addr).await;
        let mut c2 = connect(addr).await;

        send(&mut c1, &PlayerMsg::start()).await;
        assert!(recv_desk(&mut c1).await.is_empty());
        assert!(recv_desk(&mut c2).await.is_empty());

        // Replay the same seed offline to learn the deal
        let ring = ring_of(&[A, B]);
        let mut mirror = Game::with_seed(seed);
        mirror.add_player(A);
        mirror.add_player(B);
        mirror.apply(&ring, Event::Start).unwrap();
        let round = *mirror.round().unwrap();
        let attack = *mirror.hand(round.attacker).unwrap().iter().next().unwrap();

        let (attacker, defender) = if round.attacker == A {
            (&mut c1, &mut c2)
        } else {
            (&mut c2, &mut c1)
        };

        send(attacker, &PlayerMsg::play(attack)).await;
        assert_eq!(recv_desk(attacker).await, vec![attack]);
        assert_eq!(recv_desk(defender).await, vec![attack]);

        send(defender, &PlayerMsg::pass()).await;
        assert!(recv_desk(attacker).await.is_empty());
        assert!(recv_desk(defender).await.is_empty());
    }

    /// A message that is not JSON ends that session only
    #[tokio::test]
    async fn malformed_message_closes_session() {
        let addr = start_server(1).await;
        let mut c1 = connect(addr).await;

        c1.send(Message::Text("{not json".to_string())).await.unwrap();

        let closed = timeout(Duration::from_secs(2), async {
            loop {
                match c1.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .unwrap();
        assert!(closed);

        // The server keeps accepting players
        let mut c2 = connect(addr).await;
        let mut c3 = connect(addr).await;
        send(&mut c2, &PlayerMsg::start()).await;
        assert!(recv_desk(&mut c2).await.is_empty());
        assert!(recv_desk(&mut c3).await.is_empty());
    }
}
