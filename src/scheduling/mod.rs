use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

use crate::clock::Clock;
use crate::delivery::NotificationDispatcher;
use crate::storage::KeyValueStorage;
use crate::sync::SyncHub;

pub mod calculator;
mod countdown;
mod hydration;
mod poll;
pub mod reconciler;

pub use countdown::{CountdownEngine, CountdownError, CountdownStatus};
pub use hydration::{ConfigUpdate, HydrationEngine, HydrationStatus};
pub use poll::PollTask;

pub const HYDRATION_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const COUNTDOWN_TICK_INTERVAL: Duration = Duration::from_secs(1);

const ENGINE_MAILBOX_SIZE: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("the engine has been shut down")]
    Stopped,
}

/// Everything an engine needs from its host.
#[derive(Clone)]
pub struct EngineContext {
    pub storage: Arc<dyn KeyValueStorage>,
    pub clock: Arc<dyn Clock>,
    pub timezone: Tz,
    pub sync: Arc<SyncHub>,
    pub dispatcher: NotificationDispatcher,
    pub poll_interval: Duration,
}
