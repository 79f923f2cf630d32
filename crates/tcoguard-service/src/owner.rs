//! Exclusive owner of the watchdog device.
//!
//! The heartbeat feeds and the switch monitor force-closes the same device.
//! Both go through this task, which handles requests strictly in arrival
//! order; once a forced close has been processed the device is gone and any
//! later feed is answered with [`HardwareWatchdogError::Closed`].

use serde::Serialize;
use tcoguard_hardware_watchdog::{
    HardwareWatchdogError, HardwareWatchdogResult, WatchdogDevice, WatchdogMetrics, WatchdogStatus,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

const COMMAND_QUEUE_DEPTH: usize = 16;

#[derive(Debug)]
enum OwnerCommand {
    Feed {
        reply: oneshot::Sender<HardwareWatchdogResult<()>>,
    },
    ForceClose {
        reply: oneshot::Sender<()>,
    },
    CloseGracefully {
        reply: oneshot::Sender<HardwareWatchdogResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<OwnerSnapshot>,
    },
}

/// Point-in-time view of the owned device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OwnerSnapshot {
    /// Lifecycle state.
    pub status: WatchdogStatus,
    /// Feed counters.
    pub metrics: WatchdogMetrics,
    /// Timeout reported by the driver, while open.
    pub timeout_secs: Option<u32>,
    /// Time left reported by the driver, while open and supported.
    pub time_left_secs: Option<u32>,
}

/// Cloneable client of the owner task.
#[derive(Debug, Clone)]
pub struct WatchdogHandle {
    tx: mpsc::Sender<OwnerCommand>,
    last_feed: watch::Receiver<Option<Instant>>,
}

struct WatchdogOwner {
    device: Option<Box<dyn WatchdogDevice>>,
    status: WatchdogStatus,
    metrics: WatchdogMetrics,
    last_feed: watch::Sender<Option<Instant>>,
}

/// Spawn the owner task for an already opened and configured `device`.
///
/// `first_feed` is the instant of the feed the caller issued right after
/// opening, if any.
pub fn spawn(
    device: Box<dyn WatchdogDevice>,
    first_feed: Option<Instant>,
) -> (WatchdogHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (last_feed_tx, last_feed_rx) = watch::channel(first_feed);
    let mut metrics = WatchdogMetrics::new();
    if first_feed.is_some() {
        metrics.record_feed(None);
    }
    let owner = WatchdogOwner {
        device: Some(device),
        status: WatchdogStatus::Armed,
        metrics,
        last_feed: last_feed_tx,
    };
    let task = tokio::spawn(owner.run(rx).instrument(info_span!("watchdog_owner")));
    (
        WatchdogHandle {
            tx,
            last_feed: last_feed_rx,
        },
        task,
    )
}

impl WatchdogOwner {
    async fn run(mut self, mut rx: mpsc::Receiver<OwnerCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                OwnerCommand::Feed { reply } => {
                    let result = self.feed();
                    respond(reply, result);
                }
                OwnerCommand::ForceClose { reply } => {
                    self.force_close();
                    respond(reply, ());
                }
                OwnerCommand::CloseGracefully { reply } => {
                    let result = self.close_gracefully();
                    respond(reply, result);
                }
                OwnerCommand::Snapshot { reply } => {
                    respond(reply, self.snapshot());
                }
            }
        }
        if let Some(device) = self.device.take() {
            warn!(
                path = %device.path().display(),
                "Watchdog owner stopped with the device still open; timer stays armed"
            );
            device.close_forcefully();
        }
        debug!("Watchdog owner stopped");
    }

    fn feed(&mut self) -> HardwareWatchdogResult<()> {
        let device = self.device.as_mut().ok_or(HardwareWatchdogError::Closed)?;
        match device.feed() {
            Ok(()) => {
                let now = Instant::now();
                let gap = (*self.last_feed.borrow()).map(|last| now.saturating_duration_since(last));
                self.metrics.record_feed(gap);
                self.last_feed.send_replace(Some(now));
                trace!(feed_count = self.metrics.feed_count, "Watchdog fed");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_failure();
                Err(e)
            }
        }
    }

    fn force_close(&mut self) {
        match self.device.take() {
            Some(device) => {
                device.close_forcefully();
                self.status = WatchdogStatus::ForcedClose;
            }
            None => debug!(status = %self.status, "Forced close requested on a closed device"),
        }
    }

    fn close_gracefully(&mut self) -> HardwareWatchdogResult<()> {
        if self.status == WatchdogStatus::ForcedClose {
            return Err(HardwareWatchdogError::Closed);
        }
        let Some(device) = self.device.take() else {
            return Ok(());
        };
        match device.close_gracefully() {
            Ok(()) => {
                self.status = WatchdogStatus::Disarmed;
                info!("Watchdog disarmed");
                Ok(())
            }
            Err(e) => {
                // The handle is gone without a confirmed disarm token.
                self.status = WatchdogStatus::ForcedClose;
                error!(error = %e, "Watchdog disarm failed; reset pending");
                Err(e)
            }
        }
    }

    fn snapshot(&self) -> OwnerSnapshot {
        let (timeout_secs, time_left_secs) = match &self.device {
            Some(device) => (
                device.timeout().ok(),
                device.time_left().ok().flatten(),
            ),
            None => (None, None),
        };
        OwnerSnapshot {
            status: self.status,
            metrics: self.metrics,
            timeout_secs,
            time_left_secs,
        }
    }
}

fn respond<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        trace!("Watchdog requester went away before the reply");
    }
}

impl WatchdogHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> OwnerCommand,
    ) -> HardwareWatchdogResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_stopped| HardwareWatchdogError::Closed)?;
        response.await.map_err(|_dropped| HardwareWatchdogError::Closed)
    }

    /// Write a keep-alive token.
    ///
    /// # Errors
    ///
    /// Returns `FeedFailure` when the write fails and `Closed` once the
    /// device has been closed either way.
    pub async fn feed(&self) -> HardwareWatchdogResult<()> {
        self.request(|reply| OwnerCommand::Feed { reply }).await?
    }

    /// Close the device without the disarm token. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the owner task is gone.
    pub async fn force_close(&self) -> HardwareWatchdogResult<()> {
        self.request(|reply| OwnerCommand::ForceClose { reply }).await
    }

    /// Write the disarm token and close the device.
    ///
    /// Succeeds without effect if the device was already disarmed.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after a forced close and `DisarmFailed` if the
    /// token could not be written.
    pub async fn close_gracefully(&self) -> HardwareWatchdogResult<()> {
        self.request(|reply| OwnerCommand::CloseGracefully { reply })
            .await?
    }

    /// Current lifecycle state and counters.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the owner task is gone.
    pub async fn snapshot(&self) -> HardwareWatchdogResult<OwnerSnapshot> {
        self.request(|reply| OwnerCommand::Snapshot { reply }).await
    }

    /// Instant of the last successful feed, read without a round trip.
    #[must_use]
    pub fn last_feed(&self) -> Option<Instant> {
        *self.last_feed.borrow()
    }
}
