//! Line-driven debug client
//!
//! Type `start`, `play S7` or `pass` and watch the desk broadcasts come back.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{Card, DeskMsg, PlayerMsg};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,
}

fn parse_line(line: &str) -> Result<PlayerMsg, String> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (Some("start"), None) => Ok(PlayerMsg::start()),
        (Some("pass") | Some("take"), None) => Ok(PlayerMsg::pass()),
        (Some("play"), Some(text)) => text
            .parse::<Card>()
            .map(PlayerMsg::play)
            .map_err(|e| e.to_string()),
        _ => Err(format!("unrecognised input {:?}", line)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let (ws, _) = connect_async(args.server.as_str()).await?;
    info!("Connected to {}", args.server);
    println!("Commands: start | play <card> | pass");

    let (mut sink, mut stream) = ws.split();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok(msg) => sink.send(Message::Text(serde_json::to_string(&msg)?)).await?,
                    Err(e) => warn!("{}", e),
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<DeskMsg>(&text) {
                        Ok(msg) => {
                            let cards: Vec<String> = msg.desk.iter().map(Card::to_string).collect();
                            println!("desk: [{}]", cards.join(" "));
                        }
                        Err(e) => warn!("Unexpected message {:?}: {}", text, e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }

    Ok(())
}
