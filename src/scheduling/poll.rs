use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// Fixed-cadence poll that posts `event` into an engine's mailbox.
///
/// The first tick comes one `period` after spawning. A runtime that falls
/// behind gets a single catch-up tick instead of a burst.
pub struct PollTask {
    task_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl PollTask {
    pub fn spawn<E>(period: Duration, tx: mpsc::Sender<E>, event: E) -> Self
    where
        E: Clone + Send + 'static,
    {
        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.child_token();

        let task_handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = task_cancellation_token.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(event.clone()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            task_handle,
            cancellation_token,
        }
    }

    /// Stops the poll immediately; no tick is sent after this returns.
    pub fn cancel(self) {
        self.cancellation_token.cancel();
        self.task_handle.abort();
    }
}
