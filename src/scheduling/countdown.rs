use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::delivery::{NotificationDispatcher, ReminderNotification};
use crate::models::countdown::{
    CountdownState, MAX_TARGET_HOURS, MIN_TARGET_HOURS, SECONDS_PER_HOUR,
};
use crate::models::reminder::{ReminderKind, VITAMIN_D_MESSAGE};
use crate::storage::SettingsStore;

use super::{ENGINE_MAILBOX_SIZE, EngineContext, EngineError, poll::PollTask, reconciler};

const KIND: ReminderKind = ReminderKind::VitaminD;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CountdownError {
    #[error("the target cannot change while the countdown is running")]
    Running,

    #[error("target must be between 1 and 10 hours, got {hours}")]
    TargetOutOfRange { hours: u32 },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Countdown as seen right now, with the live remaining time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownStatus {
    pub target_hours: u64,
    pub remaining_seconds: u64,
    pub running: bool,
}

#[derive(Debug)]
enum CountdownEvent {
    Start(oneshot::Sender<()>),
    Pause(oneshot::Sender<()>),
    Reset(oneshot::Sender<()>),
    SetTargetHours(u32, oneshot::Sender<Result<(), CountdownError>>),
    Status(oneshot::Sender<CountdownStatus>),
    Tick,
}

/// Handle to the single-shot outdoor-time countdown.
pub struct CountdownEngine {
    tx: mpsc::Sender<CountdownEvent>,
    task: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl CountdownEngine {
    /// Loads the persisted countdown, catches up on time spent away and
    /// resumes ticking if it is still running.
    pub async fn start(context: EngineContext) -> Self {
        let (tx, rx) = mpsc::channel(ENGINE_MAILBOX_SIZE);
        let (ticks_tx, ticks_rx) = mpsc::channel(1);
        let cancellation_token = CancellationToken::new();

        let actor = CountdownActor::mount(context, ticks_tx).await;
        let task = tokio::spawn(actor.run(rx, ticks_rx, cancellation_token.child_token()));

        Self {
            tx,
            task,
            cancellation_token,
        }
    }

    pub async fn start_timer(&self) -> Result<(), EngineError> {
        self.request(CountdownEvent::Start).await
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.request(CountdownEvent::Pause).await
    }

    pub async fn reset(&self) -> Result<(), EngineError> {
        self.request(CountdownEvent::Reset).await
    }

    pub async fn set_target_hours(&self, hours: u32) -> Result<(), CountdownError> {
        self.request(|reply| CountdownEvent::SetTargetHours(hours, reply)).await?
    }

    pub async fn status(&self) -> Result<CountdownStatus, EngineError> {
        self.request(CountdownEvent::Status).await
    }

    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        let _ = self.task.await;
    }

    async fn request<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<T>) -> CountdownEvent,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(event(reply_tx))
            .await
            .map_err(|_| EngineError::Stopped)?;
        reply_rx.await.map_err(|_| EngineError::Stopped)
    }
}

struct CountdownActor {
    state: CountdownState,
    store: SettingsStore<CountdownState>,
    poll: Option<PollTask>,
    ticks_tx: mpsc::Sender<()>,
    clock: Arc<dyn Clock>,
    dispatcher: NotificationDispatcher,
    tick_interval: Duration,
}

impl CountdownActor {
    async fn mount(context: EngineContext, ticks_tx: mpsc::Sender<()>) -> Self {
        let mut store = SettingsStore::new(context.storage, KIND.storage_key());
        let persisted = store.load().await;

        let mut actor = Self {
            state: reconciler::reconcile(&persisted, context.clock.now()),
            store,
            poll: None,
            ticks_tx,
            clock: context.clock,
            dispatcher: context.dispatcher,
            tick_interval: context.poll_interval,
        };

        if actor.state.completed_while_away {
            log::info!("Countdown finished while away [kind = {}]", KIND);
            actor.complete().await;
        } else if actor.state.running {
            log::info!(
                "Resuming countdown [kind = {}, remaining = {}s]",
                KIND,
                actor.state.remaining_seconds
            );
            actor.start_polling();
        }
        actor.persist().await;

        actor
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<CountdownEvent>,
        mut ticks_rx: mpsc::Receiver<()>,
        cancellation_token: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                Some(()) = ticks_rx.recv() => CountdownEvent::Tick,
            };

            self.handle_event(event, &mut ticks_rx).await;
        }

        self.stop_polling(&mut ticks_rx);
        log::info!("Countdown engine stopped [kind = {}]", KIND);
    }

    async fn handle_event(&mut self, event: CountdownEvent, ticks_rx: &mut mpsc::Receiver<()>) {
        match event {
            CountdownEvent::Start(reply) => {
                if !self.state.running {
                    self.begin(self.clock.now());
                    self.start_polling();
                    self.persist().await;
                }
                let _ = reply.send(());
            }
            CountdownEvent::Pause(reply) => {
                if self.state.running {
                    self.catch_up(ticks_rx).await;
                    if self.state.running {
                        self.state.running = false;
                        self.state.started_at_wall_clock = None;
                        self.stop_polling(ticks_rx);
                        log::info!(
                            "Countdown paused [kind = {}, remaining = {}s]",
                            KIND,
                            self.state.remaining_seconds
                        );
                    }
                    self.persist().await;
                }
                let _ = reply.send(());
            }
            CountdownEvent::Reset(reply) => {
                self.stop_polling(ticks_rx);
                self.state.running = false;
                self.state.remaining_seconds = 0;
                self.state.started_at_wall_clock = None;
                self.state.completed_while_away = false;
                log::info!("Countdown reset [kind = {}]", KIND);
                self.persist().await;
                let _ = reply.send(());
            }
            CountdownEvent::SetTargetHours(hours, reply) => {
                let result = self.set_target_hours(hours);
                if result.is_ok() {
                    self.persist().await;
                }
                let _ = reply.send(result);
            }
            CountdownEvent::Status(reply) => {
                let live = reconciler::reconcile(&self.state, self.clock.now());
                let _ = reply.send(CountdownStatus {
                    target_hours: live.target_hours(),
                    remaining_seconds: live.remaining_seconds,
                    running: live.running,
                });
            }
            CountdownEvent::Tick => {
                if self.state.running {
                    self.catch_up(ticks_rx).await;
                } else {
                    log::debug!("Ignoring tick while stopped [kind = {}]", KIND);
                }
            }
        }
    }

    fn begin(&mut self, now: DateTime<Utc>) {
        if self.state.remaining_seconds == 0 {
            self.state.remaining_seconds = self.state.target_duration_seconds;
        }
        self.state.running = true;
        self.state.started_at_wall_clock = Some(now);
        self.state.completed_while_away = false;

        log::info!(
            "Countdown started [kind = {}, remaining = {}s]",
            KIND,
            self.state.remaining_seconds
        );
    }

    /// Reconciles against the wall clock and finishes the countdown if it ran out.
    async fn catch_up(&mut self, ticks_rx: &mut mpsc::Receiver<()>) {
        self.state = reconciler::reconcile(&self.state, self.clock.now());
        if !self.state.running && self.state.completed_while_away {
            self.stop_polling(ticks_rx);
            self.complete().await;
            self.persist().await;
        }
    }

    async fn complete(&mut self) {
        let notification =
            ReminderNotification::new(KIND, VITAMIN_D_MESSAGE, self.clock.now(), true);
        self.dispatcher.fire(&notification).await;
        self.state.completed_while_away = false;
    }

    fn set_target_hours(&mut self, hours: u32) -> Result<(), CountdownError> {
        if self.state.running {
            return Err(CountdownError::Running);
        }
        if !(MIN_TARGET_HOURS..=MAX_TARGET_HOURS).contains(&hours) {
            return Err(CountdownError::TargetOutOfRange { hours });
        }

        self.state.target_duration_seconds = u64::from(hours) * SECONDS_PER_HOUR;
        log::info!("Countdown target set [kind = {}, hours = {}]", KIND, hours);
        Ok(())
    }

    fn start_polling(&mut self) {
        if self.poll.is_none() {
            self.poll = Some(PollTask::spawn(self.tick_interval, self.ticks_tx.clone(), ()));
        }
    }

    fn stop_polling(&mut self, ticks_rx: &mut mpsc::Receiver<()>) {
        if let Some(poll) = self.poll.take() {
            poll.cancel();
            while ticks_rx.try_recv().is_ok() {}
        }
    }

    async fn persist(&self) {
        self.store.save(&self.state).await;
    }
}
