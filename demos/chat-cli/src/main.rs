use chatline::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: chat-cli <origin> <event-id> <user-id> <name>";

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
struct Args {
    origin: String,
    event_id: EventId,
    user: ChatUser,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let [origin, event_id, user_id, name] = args else {
        return Err(USAGE.into());
    };
    let event_id = event_id
        .parse()
        .map_err(|_| format!("event id must be a number, got `{event_id}`"))?;
    let user_id = user_id
        .parse()
        .map_err(|_| format!("user id must be a number, got `{user_id}`"))?;
    Ok(Args {
        origin: origin.clone(),
        event_id: EventId(event_id),
        user: ChatUser::new(user_id, name.as_str()),
    })
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Say(&'a str),
    Typing,
    StopTyping,
    Quit,
}

fn parse_line(line: &str) -> Command<'_> {
    match line.trim() {
        "/quit" | "/leave" => Command::Quit,
        "/typing" => Command::Typing,
        "/stop" => Command::StopTyping,
        _ => Command::Say(line),
    }
}

fn print_frame(frame: &ServerFrame) {
    match frame {
        ServerFrame::NewMessage { message, .. } => {
            let who = message.user_name.as_deref().unwrap_or("?");
            println!("<{who}> {}", message.content);
        }
        ServerFrame::Typing { user, is_typing: true, .. } => {
            println!("* {} is typing", user.name);
        }
        ServerFrame::Error { message } => eprintln!("! {message}"),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv)?;

    let session = ChatClientBuilder::new().origin(&args.origin).build()?;
    session.subscribe(ListenerKind::Message, |event| {
        if let SessionEvent::Message(frame) = event {
            print_frame(frame);
        }
    });
    session.subscribe(ListenerKind::Error, |event| {
        if let SessionEvent::TransportError(e) = event {
            eprintln!("! connection problem: {e}");
        }
    });
    session.connect();

    match session.initialize(args.event_id, &args.user).await? {
        HandshakeOutcome::Loaded(history) => {
            for message in &history {
                let who = message.user_name.as_deref().unwrap_or("?");
                println!("<{who}> {}", message.content);
            }
        }
        HandshakeOutcome::Unconfirmed => eprintln!("! history not confirmed, continuing"),
    }

    let mut typing = TypingIndicator::new(session.clone(), args.event_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Command::Quit => break,
            Command::Typing => {
                typing.keystroke();
            }
            Command::StopTyping => {
                typing.stop();
            }
            Command::Say(text) => {
                typing.stop();
                if !session.send_message(args.event_id, text) && !text.trim().is_empty() {
                    eprintln!("! not connected, message not sent");
                }
            }
        }
    }

    session.leave_conversation(args.event_id);
    session.disconnect();
    Ok(())
}
