//! Periodic tick for animations.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::wlog_debug;

use super::ActorHandle;

const TICK_INTERVAL: Duration = Duration::from_millis(120);

/// One spinner frame elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick(pub u64);

pub struct TickActor {
    tx: mpsc::UnboundedSender<Tick>,
    interval: Duration,
}

impl TickActor {
    pub fn new(tx: mpsc::UnboundedSender<Tick>) -> Self {
        Self {
            tx,
            interval: TICK_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn spawn(self) -> ActorHandle {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        wlog_debug!("TickActor::spawn interval={:?}", self.interval);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            let mut count = 0u64;

            loop {
                tokio::select! {
                    _ = cancel_clone.cancelled() => {
                        wlog_debug!("TickActor cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if self.tx.send(Tick(count)).is_err() {
                            wlog_debug!("TickActor: receiver dropped");
                            break;
                        }
                        count = count.wrapping_add(1);
                    }
                }
            }
        });

        ActorHandle::new(cancel)
    }
}
