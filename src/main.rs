use std::sync::Arc;

use chrono::{Local, TimeZone};
use log::{error, info};
use room_chat::{
    ChatClient, ChatHandle, ClientEvent, ClientSettings, Config, ConversationTarget, Direction,
    Identity, LocalRoom, Snapshot, StaticAuth, Transport, ValidationError, WsTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let auth = match &config.email {
        Some(email) => StaticAuth::new(Identity::new(
            config.user_id.clone().unwrap_or_else(|| email.clone()),
            email.clone(),
        )),
        None => StaticAuth::signed_out(),
    };

    let transport: Arc<dyn Transport> = match &config.server_url {
        Some(url) => {
            info!("using chat backend at {}", url);
            Arc::new(WsTransport::new(url.clone()))
        }
        None => {
            info!("ROOM_CHAT_URL not set, running against an in-process room");
            Arc::new(LocalRoom::new())
        }
    };

    let settings = ClientSettings::from(&config);
    let (handle, task) = match ChatClient::connect(settings, &auth, transport).await {
        Ok(started) => started,
        Err(e) => {
            error!("{}", e);
            eprintln!("Set ROOM_CHAT_EMAIL to sign in.");
            std::process::exit(1);
        }
    };

    tokio::spawn(print_events(handle.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !run_command(&handle, line.trim_end()).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("failed to read stdin: {}", e);
                break;
            }
        }
    }

    let _ = handle.shutdown();
    let _ = task.await;
}

/// Returns false when the user asked to quit.
async fn run_command(handle: &ChatHandle, line: &str) -> bool {
    let result = match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => return false,
        ("/public", _) => handle.select(ConversationTarget::Public),
        ("/dm", peer) if !peer.trim().is_empty() => {
            handle.select(ConversationTarget::direct(peer.trim()))
        }
        ("/new", _) => handle.start_new_direct_message(),
        ("/to", address) => handle.set_pending_recipient(address.trim()),
        ("/refresh", _) => handle.refresh(),
        ("/send", _) => handle.submit(),
        ("/contacts", _) => handle.snapshot().await.map(|s| {
            if s.contacts.is_empty() {
                println!("No conversations yet");
            }
            for contact in s.contacts {
                println!("@ {contact}");
            }
        }),
        ("/show", _) => handle.snapshot().await.map(|s| print_view(&s)),
        _ if line.starts_with('/') => {
            println!(
                "commands: /public /dm <email> /new /to <email> /send /contacts /show /refresh /quit"
            );
            Ok(())
        }
        _ => handle.set_draft(line).and_then(|()| handle.submit()),
    };
    if let Err(e) = result {
        error!("{}", e);
        return false;
    }
    true
}

fn print_view(snapshot: &Snapshot) {
    println!("== {} (signed in as {})", snapshot.target, snapshot.identity.email);
    if snapshot.target.is_composing() {
        println!("recipient: {}", snapshot.pending_recipient);
        return;
    }
    if snapshot.messages.is_empty() {
        println!("No messages yet. Start a conversation!");
    }
    for message in &snapshot.messages {
        let at = clock_time(message.created_at);
        match message.direction {
            Direction::Outgoing => println!("{at}   > {}", message.content),
            Direction::Incoming => println!(
                "{at} {}: {}",
                message.sender_label.as_deref().unwrap_or("?"),
                message.content
            ),
        }
    }
}

/// Local HH:MM for a millisecond timestamp.
fn clock_time(created_at: u64) -> String {
    i64::try_from(created_at)
        .ok()
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map_or_else(|| "--:--".to_string(), |t| t.format("%H:%M").to_string())
}

async fn print_events(mut events: broadcast::Receiver<ClientEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                println!("! {skipped} updates skipped, /show to resync");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            ClientEvent::MessageReceived {
                message,
                conversation: Some(conversation),
            } => {
                let from = message.sender_email.as_deref().unwrap_or("?");
                let at = clock_time(message.created_at);
                println!("{at} [{conversation}] {from}: {}", message.content);
            }
            ClientEvent::TargetChanged { target } => println!("== {target}"),
            ClientEvent::ValidationFailed {
                error: ValidationError::SubmissionInFlight,
            } => println!("! not sent: a message is already being sent, /send to retry this draft"),
            ClientEvent::ValidationFailed { error } => println!("! {error}"),
            ClientEvent::SubmitFailed { error } => println!("! message not sent: {error}"),
            ClientEvent::Disconnected { error } => println!("! disconnected: {error}"),
            ClientEvent::Reconnected => println!("! reconnected"),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_time_is_hours_and_minutes() {
        let stamp = clock_time(1_700_000_000_000);
        assert_eq!(stamp.len(), 5);
        assert_eq!(&stamp[2..3], ":");
        assert!(stamp.chars().filter(char::is_ascii_digit).count() == 4);
    }

    #[test]
    fn out_of_range_time_is_a_placeholder() {
        assert_eq!(clock_time(u64::MAX), "--:--");
    }

    #[tokio::test]
    async fn send_command_resubmits_the_current_draft() {
        let room = LocalRoom::new();
        let auth = StaticAuth::new(Identity::new("u-a", "a@x.com"));
        let (handle, _task) =
            ChatClient::connect(ClientSettings::default(), &auth, Arc::new(room.clone()))
                .await
                .unwrap();

        handle.set_draft("again").unwrap();
        assert!(run_command(&handle, "/send").await);

        let history = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let history = room.fetch_history("general").await.unwrap();
                if !history.is_empty() {
                    return history;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(history[0].content, "again");
    }
}
