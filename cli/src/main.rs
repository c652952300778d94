mod display;
mod reconnect;

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use protocol::{Command, Event, Half, Position, Team};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::display::Scoreboard;
use crate::reconnect::{Decision, ReconnectPolicy, Reconnector};

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("frame codec failed: {0}")]
    Codec(#[from] protocol::CodecError),
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server rejected command ({code}): {message}")]
    ServerError { code: String, message: String },
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("gave up after {0} reconnect attempts")]
    ReconnectExhausted(u32),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "scoreboard-cli", about = "Scoreboard hub operator and display CLI")]
struct Cli {
    #[arg(long, env = "SCOREBOARD_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Check `/healthz`.
    Ping,
    /// Print the current match state as JSON.
    State,
    /// Follow the match live, reconnecting on loss.
    Watch(WatchArgs),
    /// Send one command and print the hub's answer.
    Send(SendCommand),
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[arg(long, default_value_t = reconnect::DEFAULT_RETRY_INTERVAL.as_secs())]
    retry_interval_secs: u64,

    #[arg(long, default_value_t = reconnect::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
}

#[derive(Args, Debug)]
struct SendCommand {
    #[command(subcommand)]
    command: SendSubcommand,
}

#[derive(Subcommand, Debug)]
enum SendSubcommand {
    Goal {
        #[arg(value_parser = parse_team)]
        team: Team,
    },
    UndoGoal {
        #[arg(value_parser = parse_team)]
        team: Team,
    },
    Reset {
        #[arg(value_parser = parse_half, default_value = "1")]
        half: Half,
    },
    SetTime {
        #[arg(help = "Clock value in seconds")]
        time: u32,
        #[arg(value_parser = parse_half)]
        half: Half,
    },
    ToggleHalf {
        #[arg(value_parser = parse_half)]
        half: Half,
    },
    StartHalf {
        #[arg(value_parser = parse_half)]
        half: Half,
    },
    ToggleMute,
    ToggleAutoStop,
    Position {
        element: String,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },
    FontSize {
        element: String,
        size: f64,
    },
    FontFamily {
        element: String,
        family: String,
    },
    Background {
        #[arg(help = "Image URL; omit to clear the background")]
        image: Option<String>,
        #[arg(long)]
        scale: Option<f64>,
        #[arg(long)]
        fixed: Option<bool>,
    },
    BackgroundPosition {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },
    BackgroundSize {
        scale: f64,
    },
    ToggleBackgroundFixed,
    ReloadFonts,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Ping => run_ping(&cli.base_url).await,
        CliCommand::State => run_state(&cli.base_url).await,
        CliCommand::Watch(args) => run_watch(&cli.base_url, args).await,
        CliCommand::Send(send) => run_send(&cli.base_url, to_command(send.command)).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let status = reqwest::get(url).await?.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_state(base_url: &str) -> Result<(), CliError> {
    let (mut stream, board) = connect_ready(base_url).await?;
    print_json(board.state())?;
    stream.close(None).await?;
    Ok(())
}

async fn run_send(base_url: &str, command: Command) -> Result<(), CliError> {
    let (mut stream, _) = connect_ready(base_url).await?;
    let expected = expected_reply(&command);

    stream.send(Message::text(protocol::encode_command(&command)?)).await?;

    let reply = loop {
        match recv_event(&mut stream, REPLY_TIMEOUT).await? {
            Event::Error { code, message } => return Err(CliError::ServerError { code, message }),
            event if event.tag() == expected => break event,
            _ => {}
        }
    };

    print_json(&reply)?;
    stream.close(None).await?;
    Ok(())
}

/// Connect and consume the `full_state` + `available_fonts` greeting.
async fn connect_ready(base_url: &str) -> Result<(WsStream, Scoreboard), CliError> {
    let (mut stream, _) = connect_async(ws_url(base_url)?).await?;
    let mut board = Scoreboard::default();
    wait_for_greeting(&mut stream, &mut board).await?;
    Ok((stream, board))
}

async fn run_watch(base_url: &str, args: WatchArgs) -> Result<(), CliError> {
    let url = ws_url(base_url)?;
    let policy =
        ReconnectPolicy { interval: Duration::from_secs(args.retry_interval_secs), max_attempts: args.max_attempts };
    let mut agent = Reconnector::new(policy);
    let mut board = Scoreboard::default();

    loop {
        match connect_async(&url).await {
            Ok((stream, _)) => {
                agent.on_connected();
                eprintln!("connected to {url}");
                let reason = follow(stream, &mut board).await;
                eprintln!("connection lost: {reason}");
            }
            Err(e) => eprintln!("connect failed: {e}"),
        }

        match agent.on_disconnected() {
            Decision::Retry { attempt, after } => {
                eprintln!("reconnecting in {}s (attempt {attempt}/{})", after.as_secs(), policy.max_attempts);
                tokio::time::sleep(after).await;
            }
            Decision::GiveUp { attempts } => return Err(CliError::ReconnectExhausted(attempts)),
        }
    }
}

/// Render events until the connection ends. Returns why it ended.
async fn follow(mut stream: WsStream, board: &mut Scoreboard) -> String {
    loop {
        let message = match stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => return e.to_string(),
            None => return "stream ended".to_owned(),
        };
        match message {
            Message::Text(text) => match protocol::decode_event(text.as_str()) {
                Ok(Event::Error { code, message }) => eprintln!("hub error ({code}): {message}"),
                Ok(event @ Event::AvailableFonts { .. }) => {
                    board.apply(event);
                    eprintln!("{} fonts available", board.fonts().len());
                }
                Ok(event) => {
                    if board.apply(event) {
                        println!("{}", board.render());
                    }
                }
                Err(e) => eprintln!("undecodable frame: {e}"),
            },
            Message::Close(frame) => {
                return frame.map_or_else(|| "closed".to_owned(), |f| format!("closed ({}): {}", f.code, f.reason));
            }
            _ => {}
        }
    }
}

async fn wait_for_greeting(stream: &mut WsStream, board: &mut Scoreboard) -> Result<(), CliError> {
    loop {
        let event = recv_event(stream, REPLY_TIMEOUT).await?;
        let done = matches!(event, Event::AvailableFonts { .. });
        board.apply(event);
        if done {
            return Ok(());
        }
    }
}

async fn recv_event(stream: &mut WsStream, timeout: Duration) -> Result<Event, CliError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(CliError::WsClosed);
            };
            match message? {
                Message::Text(text) => return protocol::decode_event(text.as_str()).map_err(CliError::from),
                Message::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    };

    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| CliError::Timeout)?
}

fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base_url = base_url.trim_end_matches('/');
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/ws"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/ws"));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

fn to_command(send: SendSubcommand) -> Command {
    match send {
        SendSubcommand::Goal { team } => Command::AddGoal { team },
        SendSubcommand::UndoGoal { team } => Command::UndoGoal { team },
        SendSubcommand::Reset { half } => Command::Reset { half },
        SendSubcommand::SetTime { time, half } => Command::SetCustomTime { time, half },
        SendSubcommand::ToggleHalf { half } => Command::ToggleHalf { half },
        SendSubcommand::StartHalf { half } => Command::StartHalf { half },
        SendSubcommand::ToggleMute => Command::ToggleMute,
        SendSubcommand::ToggleAutoStop => Command::ToggleAutoStop,
        SendSubcommand::Position { element, x, y } => {
            Command::UpdateElementPosition { element, position: Position::new(x, y) }
        }
        SendSubcommand::FontSize { element, size } => Command::UpdateFontSize { element, size },
        SendSubcommand::FontFamily { element, family } => Command::UpdateFontFamily { element, font_family: family },
        SendSubcommand::Background { image, scale, fixed } => {
            Command::SetBackground { image, position: None, scale, fixed }
        }
        SendSubcommand::BackgroundPosition { x, y } => Command::UpdateBackgroundPosition { x, y },
        SendSubcommand::BackgroundSize { scale } => Command::UpdateBackgroundSize { scale },
        SendSubcommand::ToggleBackgroundFixed => Command::ToggleBackgroundFixed,
        SendSubcommand::ReloadFonts => Command::ReloadFonts,
    }
}

/// Tag of the first event the hub answers `command` with. Other traffic
/// (clock ticks, other operators) is skipped while waiting for it.
fn expected_reply(command: &Command) -> &'static str {
    match command {
        Command::AddGoal { .. } | Command::UndoGoal { .. } => "score_update",
        Command::Reset { .. }
        | Command::SetCustomTime { .. }
        | Command::ToggleHalf { .. }
        | Command::RequestState => "full_state",
        Command::StartHalf { .. } => "half_changed",
        Command::ToggleMute => "mute_state",
        Command::ToggleAutoStop => "auto_stop_update",
        Command::UpdateElementPosition { .. } => "element_position_update",
        Command::UpdateFontSize { .. } => "font_size_update",
        Command::UpdateFontFamily { .. } => "font_family_update",
        Command::SetBackground { .. } => "background_update",
        Command::UpdateBackgroundPosition { .. } => "background_position_update",
        Command::UpdateBackgroundSize { .. } => "background_size_update",
        Command::ToggleBackgroundFixed => "background_fixed_update",
        Command::ReloadFonts => "available_fonts",
    }
}

fn parse_team(raw: &str) -> Result<Team, String> {
    let value: u8 = raw.parse().map_err(|_| format!("team must be 1 or 2, got `{raw}`"))?;
    Team::try_from(value).map_err(|e| e.to_string())
}

fn parse_half(raw: &str) -> Result<Half, String> {
    let value: u8 = raw.parse().map_err(|_| format!("half must be 1 or 2, got `{raw}`"))?;
    Half::try_from(value).map_err(|e| e.to_string())
}

fn print_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_maps_scheme_and_path() {
        assert_eq!(ws_url("http://127.0.0.1:8080").expect("http"), "ws://127.0.0.1:8080/ws");
        assert_eq!(ws_url("https://board.example/").expect("https"), "wss://board.example/ws");
        assert!(matches!(ws_url("ftp://x"), Err(CliError::InvalidBaseUrl(_))));
    }

    #[test]
    fn selectors_parse_from_wire_values() {
        assert_eq!(parse_team("2"), Ok(Team::Two));
        assert_eq!(parse_half("1"), Ok(Half::First));
        assert!(parse_team("3").is_err());
        assert!(parse_half("first").is_err());
    }

    #[test]
    fn send_subcommands_map_to_commands() {
        assert_eq!(
            to_command(SendSubcommand::Position { element: "timer".into(), x: -10, y: 20 }),
            Command::UpdateElementPosition { element: "timer".into(), position: Position::new(-10, 20) }
        );
        assert_eq!(
            to_command(SendSubcommand::Background { image: None, scale: Some(2.0), fixed: None }),
            Command::SetBackground { image: None, position: None, scale: Some(2.0), fixed: None }
        );
    }

    #[test]
    fn expected_reply_matches_processor_events() {
        assert_eq!(expected_reply(&Command::AddGoal { team: Team::One }), "score_update");
        assert_eq!(expected_reply(&Command::StartHalf { half: Half::Second }), "half_changed");
        assert_eq!(expected_reply(&Command::ReloadFonts), "available_fonts");
    }

    #[test]
    fn cli_parses_send_goal() {
        let cli = Cli::try_parse_from(["scoreboard-cli", "send", "goal", "1"]).expect("parse");
        let CliCommand::Send(send) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(to_command(send.command), Command::AddGoal { team: Team::One });
    }
}
