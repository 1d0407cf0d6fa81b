//! Session task and its handle.
//!
//! [`spawn`] moves a [`CardSetSession`] into its own task, which owns the
//! [`SyncPhase`] and a [`Scheduler`] and interprets the phase's actions:
//!
//! ```text
//! SessionHandle ──commands──▶ session task ──▶ CardSetSession ──▶ Transport
//!       ▲                         │
//!       └──── watch(snapshot) ◀───┤
//!             broadcast(events) ◀─┘
//! ```
//!
//! A round runs in a task of its own, so commands keep being handled while
//! it is in flight; edits made meanwhile mark the phase dirty and get a
//! round of their own once it finishes.
//!
//! The task stops when every handle is dropped or on [`SessionHandle::shutdown`].

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use cardset_sync_core::{Action, Event, SessionEvent, SyncPhase};
use cardset_sync_types::{CardSetState, StateUpdate};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

use crate::editor::{CardSetEditor, EditBuilder};
use crate::scheduler::{Scheduler, Tick};
use crate::session::{CardSetSession, ClientError};
use crate::transport::Transport;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 64;

type Reply = oneshot::Sender<Result<CardSetState, ClientError>>;
type Round = JoinHandle<Result<CardSetState, ClientError>>;

enum Command {
    Submit { update: StateUpdate, reply: Reply },
    Edit { build: EditBuilder, reply: Reply },
    Shutdown,
}

/// Handle to a session running in its own task.
///
/// Cheap to clone; every clone talks to the same task.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<CardSetState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// A receiver that is notified whenever the working snapshot changes.
    pub fn watch(&self) -> watch::Receiver<CardSetState> {
        self.snapshots.clone()
    }

    /// Subscribe to session events (synced, failed rounds, halts).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Ask the task to stop. Pending commands sent before this are handled.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    async fn request(
        &self,
        command: Command,
        response: oneshot::Receiver<Result<CardSetState, ClientError>>,
    ) -> Result<CardSetState, ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::SessionClosed)?;
        response.await.map_err(|_| ClientError::SessionClosed)?
    }
}

#[async_trait]
impl CardSetEditor for SessionHandle {
    async fn submit(&self, update: StateUpdate) -> Result<CardSetState, ClientError> {
        let (reply, response) = oneshot::channel();
        self.request(Command::Submit { update, reply }, response)
            .await
    }

    async fn submit_with(&self, build: EditBuilder) -> Result<CardSetState, ClientError> {
        let (reply, response) = oneshot::channel();
        self.request(Command::Edit { build, reply }, response).await
    }

    async fn snapshot(&self) -> CardSetState {
        self.snapshots.borrow().clone()
    }
}

/// Run a session in a new task.
///
/// The first poll fires immediately, so the task pulls the stored snapshot
/// as soon as it starts.
pub fn spawn<T: Transport + 'static>(
    session: CardSetSession<T>,
) -> (SessionHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(CardSetState::new(
        session.config().collection().clone(),
    ));
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let handle = SessionHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        events: event_tx.clone(),
    };
    let task = tokio::spawn(run(Arc::new(session), command_rx, snapshot_tx, event_tx));
    (handle, task)
}

async fn run<T: Transport + 'static>(
    session: Arc<CardSetSession<T>>,
    mut commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<CardSetState>,
    events: broadcast::Sender<SessionEvent>,
) {
    let config = session.config().clone();
    info!(collection = %config.collection(), "session task started");
    snapshots.send_replace(session.working().await);

    let mut scheduler = Scheduler::new(config.poll_interval(), config.debounce());
    let mut phase = SyncPhase::new();
    let mut round: Option<Round> = None;

    loop {
        let event = tokio::select! {
            command = commands.recv() => {
                let (result, reply) = match command {
                    Some(Command::Submit { update, reply }) => {
                        (session.submit(update).await, reply)
                    }
                    Some(Command::Edit { build, reply }) => {
                        (session.submit_with(build).await, reply)
                    }
                    Some(Command::Shutdown) | None => break,
                };
                let edited = match &result {
                    Ok(working) => {
                        snapshots.send_replace(working.clone());
                        true
                    }
                    Err(_) => false,
                };
                // The caller may have given up waiting.
                let _ = reply.send(result);
                if !edited {
                    continue;
                }
                Event::LocalEdit
            }
            tick = scheduler.next() => match tick {
                Tick::Poll => Event::PollTick,
                Tick::Debounce => Event::DebounceElapsed,
            },
            finished = finish(&mut round), if round.is_some() => {
                round = None;
                match finished {
                    Ok(Ok(working)) => {
                        snapshots.send_replace(working);
                        Event::RoundSucceeded
                    }
                    Ok(Err(ClientError::Halted(reason))) => Event::InvariantViolated { reason },
                    Ok(Err(e)) => Event::RoundFailed {
                        error: e.to_string(),
                    },
                    Err(e) => Event::RoundFailed {
                        error: e.to_string(),
                    },
                }
            }
        };

        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let succeeded = event == Event::RoundSucceeded;
            let (next, actions) = phase.on_event(event);
            phase = next;
            for action in actions {
                match action {
                    Action::StartDebounce => scheduler.start_debounce(),
                    Action::CancelDebounce => scheduler.cancel_debounce(),
                    Action::RunRound => {
                        let session = Arc::clone(&session);
                        round = Some(tokio::spawn(async move { session.sync_round().await }));
                    }
                    Action::Emit(event) => {
                        debug!(?event, "session event");
                        // No subscribers is fine.
                        let _ = events.send(event);
                    }
                }
            }
            // Updates past the batch limit go out in the next round.
            if succeeded && phase == SyncPhase::Idle && session.pending_updates().await > 0 {
                pending.push_back(Event::LocalEdit);
            }
        }
    }

    if let Some(round) = round {
        round.abort();
    }
    info!(collection = %config.collection(), "session task stopped");
}

/// Wait for the round in flight. Never resolves when there is none.
async fn finish(round: &mut Option<Round>) -> Result<Result<CardSetState, ClientError>, JoinError> {
    match round {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use crate::transport::MockTransport;
    use cardset_sync_core::replay;
    use cardset_sync_types::{CardId, CollectionId, HandId, OriginalCard, Request};
    use std::time::Duration;

    fn config() -> SessionConfig {
        SessionConfig::new("http://localhost:8080", "set-1")
            .with_poll_interval(Duration::from_secs(3))
            .with_debounce(Duration::from_millis(300))
    }

    fn empty() -> CardSetState {
        CardSetState::new(CollectionId::from("set-1"))
    }

    async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .expect("event within timeout")
            .expect("event channel open")
    }

    #[tokio::test(start_paused = true)]
    async fn task_pulls_on_start() {
        let transport = MockTransport::new();
        let mut remote = empty();
        remote.name = "Shared".into();
        transport.queue_snapshot(remote.clone());

        let (handle, _task) = spawn(CardSetSession::new(config(), transport.clone()));
        let mut events = handle.subscribe();

        assert_eq!(next_event(&mut events).await, SessionEvent::Synced);
        assert_eq!(handle.snapshot().await, remote);
        assert!(matches!(
            transport.sent_requests()[0],
            Request::Submit { ref updates, .. } if updates.is_empty()
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_becomes_one_round() {
        let transport = MockTransport::new();
        transport.queue_snapshot(empty());

        let (handle, _task) = spawn(CardSetSession::new(config(), transport.clone()));
        let mut events = handle.subscribe();
        next_event(&mut events).await;

        let a = StateUpdate::add_card(OriginalCard::new("a", "A"));
        let b = StateUpdate::add_card(OriginalCard::new("b", "B"));
        handle.submit(a.clone()).await.unwrap();
        let working = handle.submit(b.clone()).await.unwrap();
        assert_eq!(working.deck, vec![CardId::from("b"), CardId::from("a")]);

        let remote = replay(&empty(), [&a, &b]).unwrap();
        transport.queue_snapshot(remote.clone());

        assert_eq!(next_event(&mut events).await, SessionEvent::Synced);
        let sent = transport.sent_requests();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[1],
            Request::Submit { updates, .. } if updates == &vec![a, b]
        ));
        assert_eq!(*handle.watch().borrow(), remote);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_returns_while_round_in_flight() {
        let transport = MockTransport::new();
        transport.set_delay(Duration::from_secs(2));
        transport.queue_snapshot(empty());

        let (handle, _task) = spawn(CardSetSession::new(config(), transport.clone()));
        let mut events = handle.subscribe();

        // Let the first poll start its round.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.sent_messages().len(), 1);

        let add = StateUpdate::add_card(OriginalCard::new("a", "A"));
        let working = tokio::time::timeout(Duration::from_millis(100), handle.submit(add.clone()))
            .await
            .expect("submit does not wait for the round")
            .unwrap();
        assert_eq!(working.deck, vec![CardId::from("a")]);
        assert_eq!(handle.snapshot().await.deck, vec![CardId::from("a")]);

        transport.queue_snapshot(replay(&empty(), [&add]).unwrap());

        // The pull finishes first, then the edit made during it gets a round.
        assert_eq!(next_event(&mut events).await, SessionEvent::Synced);
        assert_eq!(handle.snapshot().await.deck, vec![CardId::from("a")]);
        assert_eq!(next_event(&mut events).await, SessionEvent::Synced);
        let sent = transport.sent_requests();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[1],
            Request::Submit { updates, .. } if updates == &vec![add]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn backlog_past_batch_limit_drains_without_new_edits() {
        let transport = MockTransport::new();
        transport.queue_snapshot(empty());
        let session = CardSetSession::new(config().with_max_batch(1), transport.clone());

        let (handle, _task) = spawn(session);
        let mut events = handle.subscribe();
        next_event(&mut events).await;

        let a = StateUpdate::rename_set("a");
        let b = StateUpdate::rename_set("b");
        handle.submit(a.clone()).await.unwrap();
        handle.submit(b.clone()).await.unwrap();
        transport.queue_snapshot(replay(&empty(), [&a]).unwrap());
        transport.queue_snapshot(replay(&empty(), [&a, &b]).unwrap());

        assert_eq!(next_event(&mut events).await, SessionEvent::Synced);
        assert_eq!(next_event(&mut events).await, SessionEvent::Synced);
        let sent = transport.sent_requests();
        assert_eq!(sent.len(), 3);
        assert!(matches!(
            &sent[1],
            Request::Submit { updates, .. } if updates == &vec![a]
        ));
        assert!(matches!(
            &sent[2],
            Request::Submit { updates, .. } if updates == &vec![b]
        ));
        assert_eq!(handle.snapshot().await.name, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_draws_take_different_cards() {
        let transport = MockTransport::new();
        transport.queue_snapshot(empty());
        let (handle, _task) = spawn(CardSetSession::new(config(), transport));
        let mut events = handle.subscribe();
        next_event(&mut events).await;

        for id in ["b", "a"] {
            handle
                .submit_add(OriginalCard::new(id, id).into())
                .await
                .unwrap();
        }

        let hand = HandId::default_hand();
        let (first, second) = tokio::join!(
            handle.draw_top_card(hand.clone()),
            handle.draw_top_card(hand.clone()),
        );
        first.unwrap();
        second.unwrap();

        let state = handle.snapshot().await;
        assert!(state.deck.is_empty());
        assert_eq!(
            state.hand(&hand).unwrap().contents,
            vec![CardId::from("b"), CardId::from("a")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_round_is_reported_and_retried() {
        let transport = MockTransport::new();
        transport.fail_next_request("network down");

        let (handle, _task) = spawn(CardSetSession::new(config(), transport.clone()));
        let mut events = handle.subscribe();

        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::RoundFailed { attempt: 1, .. }
        ));

        transport.queue_snapshot(empty());
        assert_eq!(next_event(&mut events).await, SessionEvent::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_snapshot_halts_task_session() {
        let transport = MockTransport::new();
        let mut broken = empty();
        broken
            .cards
            .insert(CardId::from("x"), OriginalCard::new("x", "X").into());
        transport.queue_snapshot(broken);

        let (handle, _task) = spawn(CardSetSession::new(config(), transport));
        let mut events = handle.subscribe();

        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::Halted { .. }
        ));
        let result = handle.submit(StateUpdate::rename_set("x")).await;
        assert!(matches!(result, Err(ClientError::Halted(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_task() {
        let (handle, task) = spawn(CardSetSession::new(config(), MockTransport::new()));

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let result = handle.submit(StateUpdate::rename_set("x")).await;
        assert!(matches!(result, Err(ClientError::SessionClosed)));
    }
}
