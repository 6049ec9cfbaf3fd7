//! The chat update loop.
//!
//! A single task owns the [`Session`]. User commands, pushed messages and the
//! results of transport calls all arrive on one queue and are applied one at a
//! time, so derived views are never observed half-updated. Transport calls run
//! in spawned tasks and report back through the same queue.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::backoff::Backoff;
use crate::config::Config;
use crate::contacts::ContactSet;
use crate::error::{ChatError, TransportError, ValidationError};
use crate::models::{Identity, Message};
use crate::session::{Session, Submission, SubmitState};
use crate::target::ConversationTarget;
use crate::transport::{AuthProvider, PushEvent, PushSink, Subscription, Transport};
use crate::view::{self, MessageView};

const EVENT_CAPACITY: usize = 256;

/// Tunables for a client session.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub room_id: String,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub submit_timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings::from(&Config::default())
    }
}

impl From<&Config> for ClientSettings {
    fn from(config: &Config) -> Self {
        ClientSettings {
            room_id: config.room_id.clone(),
            reconnect_initial: config.reconnect_initial,
            reconnect_max: config.reconnect_max,
            submit_timeout: config.submit_timeout,
        }
    }
}

/// Notifications for whoever renders the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    HistoryLoaded { added: usize },
    MessageReceived {
        message: Message,
        /// Where the message is listed for this user, if anywhere.
        conversation: Option<ConversationTarget>,
    },
    ContactsChanged { contacts: Vec<String> },
    TargetChanged { target: ConversationTarget },
    MessageSent { id: String },
    SubmitFailed { error: String },
    ValidationFailed { error: ValidationError },
    TransportFailed { error: String },
    Disconnected { error: String },
    Reconnected,
}

/// Point-in-time copy of the session, as a renderer needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub identity: Identity,
    pub target: ConversationTarget,
    pub pending_recipient: String,
    pub draft: String,
    pub submitting: bool,
    pub connected: bool,
    pub messages: Vec<MessageView>,
    pub contacts: Vec<String>,
    pub store_len: usize,
}

enum Command {
    Select(ConversationTarget),
    StartNewDirectMessage,
    SetPendingRecipient(String),
    SetDraft(String),
    Submit,
    Refresh,
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

enum Event {
    Command(Command),
    Subscribed {
        generation: u64,
        result: Result<Subscription, TransportError>,
    },
    Pushed {
        generation: u64,
        event: PushEvent,
    },
    HistoryLoaded(Result<Vec<Message>, TransportError>),
    SubmitFinished {
        submission: Submission,
        result: Result<Message, TransportError>,
    },
    Resubscribe {
        generation: u64,
    },
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct ChatHandle {
    queue: mpsc::UnboundedSender<Event>,
    events: broadcast::Sender<ClientEvent>,
}

impl ChatHandle {
    fn send(&self, command: Command) -> Result<(), ChatError> {
        self.queue
            .send(Event::Command(command))
            .map_err(|_| ChatError::SessionClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn select(&self, target: ConversationTarget) -> Result<(), ChatError> {
        self.send(Command::Select(target))
    }

    pub fn start_new_direct_message(&self) -> Result<(), ChatError> {
        self.send(Command::StartNewDirectMessage)
    }

    pub fn set_pending_recipient(&self, address: impl Into<String>) -> Result<(), ChatError> {
        self.send(Command::SetPendingRecipient(address.into()))
    }

    pub fn set_draft(&self, draft: impl Into<String>) -> Result<(), ChatError> {
        self.send(Command::SetDraft(draft.into()))
    }

    /// Sends the current draft. The outcome is reported as a [`ClientEvent`].
    pub fn submit(&self) -> Result<(), ChatError> {
        self.send(Command::Submit)
    }

    /// Refetches the room history; duplicates are discarded.
    pub fn refresh(&self) -> Result<(), ChatError> {
        self.send(Command::Refresh)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, ChatError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| ChatError::SessionClosed)
    }

    /// Releases the push channel and stops the loop.
    pub fn shutdown(&self) -> Result<(), ChatError> {
        self.send(Command::Shutdown)
    }
}

pub struct ChatClient;

impl ChatClient {
    /// Authenticates, then starts the update loop. Subscribing happens in the
    /// background; history is fetched once the push channel is open.
    pub async fn connect(
        settings: ClientSettings,
        auth: &dyn AuthProvider,
        transport: Arc<dyn Transport>,
    ) -> Result<(ChatHandle, JoinHandle<()>), ChatError> {
        let identity = auth.current_identity().await?;
        info!("signed in as {} ({})", identity.email, identity.user_id);

        let (queue, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let handle = ChatHandle {
            queue: queue.clone(),
            events: events.clone(),
        };

        let mut engine = Engine {
            session: Session::new(settings.room_id.clone(), identity),
            backoff: Backoff::new(settings.reconnect_initial, settings.reconnect_max),
            settings,
            transport,
            queue: queue.downgrade(),
            events,
            subscription: None,
            generation: 0,
        };
        engine.start_subscription();

        let task = tokio::spawn(engine.run(rx));
        Ok((handle, task))
    }
}

fn post(queue: &mpsc::WeakUnboundedSender<Event>, event: Event) {
    if let Some(queue) = queue.upgrade() {
        let _ = queue.send(event);
    }
}

struct Engine {
    session: Session,
    settings: ClientSettings,
    transport: Arc<dyn Transport>,
    /// Weak so the loop ends once every [`ChatHandle`] is gone.
    queue: mpsc::WeakUnboundedSender<Event>,
    events: broadcast::Sender<ClientEvent>,
    subscription: Option<Subscription>,
    generation: u64,
    backoff: Backoff,
}

impl Engine {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = rx.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        info!("chat session for {} closed", self.session.identity().email);
    }

    fn emit(&self, event: ClientEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Applies one event. Returns false once the loop should stop.
    fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Command(command) => return self.handle_command(command),
            Event::Subscribed { generation, result } => self.on_subscribed(generation, result),
            Event::Pushed { generation, event } => self.on_pushed(generation, event),
            Event::HistoryLoaded(result) => self.on_history(result),
            Event::SubmitFinished { submission, result } => {
                self.on_submit_finished(&submission, result);
            }
            Event::Resubscribe { generation } => {
                if generation == self.generation && self.subscription.is_none() {
                    self.start_subscription();
                }
            }
        }
        true
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Select(target) => {
                self.session.select(target);
                self.emit_target();
            }
            Command::StartNewDirectMessage => {
                self.session.start_new_direct_message();
                self.emit_target();
            }
            Command::SetPendingRecipient(address) => self.session.set_pending_recipient(address),
            Command::SetDraft(draft) => self.session.set_draft(draft),
            Command::Submit => self.submit(),
            Command::Refresh => self.fetch_history(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn emit_target(&self) {
        self.emit(ClientEvent::TargetChanged {
            target: self.session.target().clone(),
        });
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            identity: self.session.identity().clone(),
            target: self.session.target().clone(),
            pending_recipient: self.session.pending_recipient().to_string(),
            draft: self.session.draft().to_string(),
            submitting: self.session.submit_state() == SubmitState::Submitting,
            connected: self.subscription.is_some(),
            messages: self.session.current_message_views(),
            contacts: self.session.contacts().to_vec(),
            store_len: self.session.store().len(),
        }
    }

    fn start_subscription(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let queue = self.queue.clone();
        let sink = PushSink::new(move |event| {
            post(&queue, Event::Pushed { generation, event });
        });

        let transport = Arc::clone(&self.transport);
        let room_id = self.session.room_id().to_string();
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let result = transport.subscribe(&room_id, sink).await;
            post(&queue, Event::Subscribed { generation, result });
        });
    }

    fn on_subscribed(&mut self, generation: u64, result: Result<Subscription, TransportError>) {
        if generation != self.generation {
            // Superseded; dropping the subscription releases it.
            return;
        }
        match result {
            Ok(subscription) => {
                let was_retrying = self.backoff.attempt() > 0;
                self.subscription = Some(subscription);
                self.backoff.reset();
                debug!("push channel {} open", generation);
                if was_retrying {
                    info!("push channel re-established");
                    self.emit(ClientEvent::Reconnected);
                }
                // Anything posted before the channel opened only shows up in history.
                self.fetch_history();
            }
            Err(e) => {
                warn!("subscribe failed: {}", e);
                self.emit(ClientEvent::TransportFailed {
                    error: e.to_string(),
                });
                self.schedule_resubscribe();
            }
        }
    }

    fn on_pushed(&mut self, generation: u64, event: PushEvent) {
        if generation != self.generation {
            debug!("discarding push from stale channel {}", generation);
            return;
        }
        match event {
            PushEvent::Message(message) => self.apply_message(message),
            PushEvent::Error(e) => {
                warn!("push channel failed: {}", e);
                self.subscription = None;
                // Retire this channel so a late subscribe result cannot revive it.
                self.generation += 1;
                self.emit(ClientEvent::Disconnected {
                    error: e.to_string(),
                });
                self.schedule_resubscribe();
            }
        }
    }

    fn schedule_resubscribe(&mut self) {
        let delay = self.backoff.next_delay();
        let generation = self.generation;
        let queue = self.queue.clone();
        info!(
            "resubscribing in {:?} (attempt {})",
            delay,
            self.backoff.attempt()
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            post(&queue, Event::Resubscribe { generation });
        });
    }

    fn apply_message(&mut self, message: Message) {
        let contacts_before = self.session.contacts().clone();
        if !self.session.apply_message(message.clone()) {
            debug!("ignoring duplicate message {}", message.id);
            return;
        }
        let conversation = view::conversation_of(&message, self.session.identity());
        self.emit(ClientEvent::MessageReceived {
            message,
            conversation,
        });
        self.emit_contacts_if_changed(&contacts_before);
    }

    fn emit_contacts_if_changed(&self, before: &ContactSet) {
        if self.session.contacts() != before {
            self.emit(ClientEvent::ContactsChanged {
                contacts: self.session.contacts().to_vec(),
            });
        }
    }

    fn fetch_history(&self) {
        let transport = Arc::clone(&self.transport);
        let room_id = self.session.room_id().to_string();
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let result = transport.fetch_history(&room_id).await;
            post(&queue, Event::HistoryLoaded(result));
        });
    }

    fn on_history(&mut self, result: Result<Vec<Message>, TransportError>) {
        match result {
            Ok(messages) => {
                let contacts_before = self.session.contacts().clone();
                let added = self.session.apply_history(messages);
                debug!("history applied, {} new messages", added);
                self.emit(ClientEvent::HistoryLoaded { added });
                self.emit_contacts_if_changed(&contacts_before);
            }
            Err(e) => {
                error!("failed to fetch history: {}", e);
                self.emit(ClientEvent::TransportFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    fn submit(&mut self) {
        let submission = match self.session.begin_submit() {
            Ok(submission) => submission,
            Err(error) => {
                debug!("submit rejected: {}", error);
                self.emit(ClientEvent::ValidationFailed { error });
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let queue = self.queue.clone();
        let timeout = self.settings.submit_timeout;
        tokio::spawn(async move {
            let call = transport.submit(
                &submission.room_id,
                &submission.content,
                submission.recipient_email.as_deref(),
                &submission.sender_email,
            );
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or(Err(TransportError::Timeout)),
                None => call.await,
            };
            post(&queue, Event::SubmitFinished { submission, result });
        });
    }

    fn on_submit_finished(
        &mut self,
        submission: &Submission,
        result: Result<Message, TransportError>,
    ) {
        let target_before = self.session.target().clone();
        match self.session.finish_submit(submission, result) {
            Ok(message) => {
                debug!("message {} accepted", message.id);
                self.emit(ClientEvent::MessageSent { id: message.id });
                if self.session.target() != &target_before {
                    self.emit_target();
                }
            }
            Err(e) => {
                warn!("failed to send message: {}", e);
                self.emit(ClientEvent::SubmitFailed {
                    error: e.to_string(),
                });
            }
        }
    }
}
