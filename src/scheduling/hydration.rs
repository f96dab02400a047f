use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::delivery::{NotificationDispatcher, ReminderNotification};
use crate::models::reminder::{Preset, ReminderConfig, ReminderKind};
use crate::storage::SettingsStore;
use crate::sync::{BroadcastMessage, SyncPublisher, SyncSubscriber};

use super::{ENGINE_MAILBOX_SIZE, EngineContext, EngineError, calculator, poll::PollTask};

const KIND: ReminderKind = ReminderKind::Hydration;

/// A validated edit of the reminder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigUpdate {
    IntervalMinutes(i64),
    BusinessHours { start: i64, end: i64 },
    WeekdaysOnly(bool),
    UseNotifications(bool),
    CustomMessage(String),
    Preset(Preset),
}

impl ConfigUpdate {
    /// Whether the edit changes when reminders are due. Message and
    /// notification edits are read at fire time and leave the trigger alone.
    pub fn reschedules(&self) -> bool {
        match self {
            ConfigUpdate::IntervalMinutes(_)
            | ConfigUpdate::BusinessHours { .. }
            | ConfigUpdate::WeekdaysOnly(_)
            | ConfigUpdate::Preset(_) => true,
            ConfigUpdate::UseNotifications(_) | ConfigUpdate::CustomMessage(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationStatus {
    pub config: ReminderConfig,
    pub polling: bool,
}

#[derive(Debug)]
enum HydrationEvent {
    SetEnabled(bool, oneshot::Sender<()>),
    Update(ConfigUpdate, oneshot::Sender<()>),
    Status(oneshot::Sender<HydrationStatus>),
    Tick,
    Peer(BroadcastMessage),
}

/// Handle to a running hydration reminder.
///
/// Dropping the handle closes the mailbox, which also stops the actor and its
/// poll.
pub struct HydrationEngine {
    tx: mpsc::Sender<HydrationEvent>,
    task: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl HydrationEngine {
    /// Loads the persisted configuration and resumes the schedule if enabled.
    pub async fn start(context: EngineContext) -> Self {
        let (tx, rx) = mpsc::channel(ENGINE_MAILBOX_SIZE);
        let (ticks_tx, ticks_rx) = mpsc::channel(1);
        let (publisher, subscriber) = context.sync.open(KIND.sync_topic());
        let cancellation_token = CancellationToken::new();

        let actor = HydrationActor::mount(context, publisher, ticks_tx).await;
        let task = tokio::spawn(actor.run(
            rx,
            ticks_rx,
            subscriber,
            cancellation_token.child_token(),
        ));

        Self {
            tx,
            task,
            cancellation_token,
        }
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.request(|reply| HydrationEvent::SetEnabled(enabled, reply)).await
    }

    pub async fn update(&self, update: ConfigUpdate) -> Result<(), EngineError> {
        self.request(|reply| HydrationEvent::Update(update, reply)).await
    }

    pub async fn status(&self) -> Result<HydrationStatus, EngineError> {
        self.request(HydrationEvent::Status).await
    }

    /// Cancels the poll and waits for the actor to finish.
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        let _ = self.task.await;
    }

    async fn request<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<T>) -> HydrationEvent,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(event(reply_tx))
            .await
            .map_err(|_| EngineError::Stopped)?;
        reply_rx.await.map_err(|_| EngineError::Stopped)
    }
}

struct HydrationActor {
    config: ReminderConfig,
    store: SettingsStore<ReminderConfig>,
    poll: Option<PollTask>,
    ticks_tx: mpsc::Sender<()>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    publisher: SyncPublisher,
    dispatcher: NotificationDispatcher,
    poll_interval: Duration,
}

impl HydrationActor {
    async fn mount(
        context: EngineContext,
        publisher: SyncPublisher,
        ticks_tx: mpsc::Sender<()>,
    ) -> Self {
        let mut store = SettingsStore::new(context.storage, KIND.storage_key());
        let config = store.load().await;

        let mut actor = Self {
            config,
            store,
            poll: None,
            ticks_tx,
            clock: context.clock,
            timezone: context.timezone,
            publisher,
            dispatcher: context.dispatcher,
            poll_interval: context.poll_interval,
        };

        if actor.config.enabled() {
            let stale = actor.config.next_trigger_at();
            actor.recompute(actor.clock.now());
            log::info!(
                "Resuming enabled reminder [kind = {}, persisted = {:?}, next = {:?}]",
                KIND,
                stale,
                actor.config.next_trigger_at()
            );
            actor.start_polling();
            actor.persist().await;
            actor.publish_next();
        }

        actor
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<HydrationEvent>,
        mut ticks_rx: mpsc::Receiver<()>,
        mut peers: SyncSubscriber,
        cancellation_token: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                Some(()) = ticks_rx.recv() => HydrationEvent::Tick,
                Some(message) = peers.recv() => HydrationEvent::Peer(message),
            };

            self.handle_event(event, &mut ticks_rx).await;
        }

        // Unmount keeps the persisted trigger; the next mount recomputes it.
        self.stop_polling(&mut ticks_rx);
        self.config.set_next_trigger_at(None);
        log::info!("Reminder engine stopped [kind = {}]", KIND);
    }

    async fn handle_event(&mut self, event: HydrationEvent, ticks_rx: &mut mpsc::Receiver<()>) {
        match event {
            HydrationEvent::SetEnabled(enabled, reply) => {
                if self.apply_enabled(enabled, ticks_rx) {
                    self.persist().await;
                    self.publisher.publish(BroadcastMessage::SyncEnabled { enabled });
                    if enabled {
                        self.publish_next();
                    }
                }
                let _ = reply.send(());
            }
            HydrationEvent::Update(update, reply) => {
                let reschedules = update.reschedules();
                self.apply_update(update);
                if reschedules && self.config.enabled() {
                    self.recompute(self.clock.now());
                    self.publish_next();
                }
                self.persist().await;
                let _ = reply.send(());
            }
            HydrationEvent::Status(reply) => {
                let _ = reply.send(HydrationStatus {
                    config: self.config.clone(),
                    polling: self.poll.is_some(),
                });
            }
            HydrationEvent::Tick => self.handle_tick().await,
            HydrationEvent::Peer(BroadcastMessage::SyncEnabled { enabled }) => {
                log::debug!("Peer toggled reminder [kind = {}, enabled = {}]", KIND, enabled);
                if self.apply_enabled(enabled, ticks_rx) {
                    self.persist().await;
                    if enabled {
                        self.publish_next();
                    }
                }
            }
            HydrationEvent::Peer(BroadcastMessage::SyncNext { next_trigger_at }) => {
                if !self.config.enabled() {
                    log::debug!(
                        "Ignoring peer trigger while disabled [kind = {}, next = {:?}]",
                        KIND,
                        next_trigger_at
                    );
                    return;
                }
                log::debug!("Peer moved trigger [kind = {}, next = {:?}]", KIND, next_trigger_at);
                self.config.set_next_trigger_at(next_trigger_at);
            }
        }
    }

    async fn handle_tick(&mut self) {
        if !self.config.enabled() {
            log::debug!("Ignoring tick while disabled [kind = {}]", KIND);
            return;
        }

        let now = self.clock.now();
        match self.config.next_trigger_at() {
            None => {
                self.recompute(now);
                self.persist().await;
                self.publish_next();
            }
            Some(due) if now >= due => {
                // The following trigger is in place before anything is dispatched.
                self.recompute(now);

                let notification = ReminderNotification::new(
                    KIND,
                    self.config.message(),
                    now,
                    self.config.use_notifications(),
                );
                self.dispatcher.fire(&notification).await;

                self.persist().await;
                self.publish_next();
            }
            Some(_) => {}
        }
    }

    /// Returns whether anything changed.
    fn apply_enabled(&mut self, enabled: bool, ticks_rx: &mut mpsc::Receiver<()>) -> bool {
        if self.config.enabled() == enabled {
            return false;
        }

        self.config.set_enabled(enabled);
        if enabled {
            self.recompute(self.clock.now());
            self.start_polling();
        } else {
            self.stop_polling(ticks_rx);
        }

        log::info!(
            "Reminder {} [kind = {}, next = {:?}]",
            if enabled { "enabled" } else { "disabled" },
            KIND,
            self.config.next_trigger_at()
        );
        true
    }

    fn apply_update(&mut self, update: ConfigUpdate) {
        log::debug!("Applying configuration update [kind = {}, update = {:?}]", KIND, update);
        match update {
            ConfigUpdate::IntervalMinutes(minutes) => self.config.set_interval_minutes(minutes),
            ConfigUpdate::BusinessHours { start, end } => {
                self.config.set_business_hours(start, end)
            }
            ConfigUpdate::WeekdaysOnly(weekdays_only) => {
                self.config.set_weekdays_only(weekdays_only)
            }
            ConfigUpdate::UseNotifications(use_notifications) => {
                self.config.set_use_notifications(use_notifications)
            }
            ConfigUpdate::CustomMessage(message) => self.config.set_custom_message(message),
            ConfigUpdate::Preset(preset) => self.config.apply_preset(preset),
        }
    }

    fn recompute(&mut self, now: DateTime<Utc>) {
        let local_now = now.with_timezone(&self.timezone);
        let next = calculator::next_trigger(&local_now, &self.config)
            .map(|next| next.with_timezone(&Utc));
        self.config.set_next_trigger_at(next);

        log::debug!(
            "Recomputed trigger [kind = {}, now = {}, next = {:?}]",
            KIND,
            now,
            next
        );
    }

    fn start_polling(&mut self) {
        if self.poll.is_some() {
            return;
        }
        log::info!(
            "Starting poll [kind = {}, interval = {:?}]",
            KIND,
            self.poll_interval
        );
        self.poll = Some(PollTask::spawn(self.poll_interval, self.ticks_tx.clone(), ()));
    }

    fn stop_polling(&mut self, ticks_rx: &mut mpsc::Receiver<()>) {
        if let Some(poll) = self.poll.take() {
            poll.cancel();
            while ticks_rx.try_recv().is_ok() {}
            log::info!("Stopped poll [kind = {}]", KIND);
        }
    }

    async fn persist(&self) {
        self.store.save(&self.config).await;
    }

    fn publish_next(&self) {
        self.publisher.publish(BroadcastMessage::SyncNext {
            next_trigger_at: self.config.next_trigger_at(),
        });
    }
}
