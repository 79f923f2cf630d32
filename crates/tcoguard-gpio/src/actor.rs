//! Single-owner task serializing all expander traffic.
//!
//! The output registers are shared by both LEDs, and every pin update is a
//! read-modify-write of the whole register. Funnelling every request through
//! one task keeps concurrent updates to different bits from overwriting each
//! other. Bus transactions run inline on the task; each is a few hundred
//! microseconds.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, trace};

use crate::error::{GpioError, GpioResult};
use crate::pca9555::{Level, Pca9555, PinRef};
use crate::port::RegisterPort;

const COMMAND_QUEUE_DEPTH: usize = 32;

#[derive(Debug)]
enum ExpanderCommand {
    ConfigureInput {
        pin: PinRef,
        reply: oneshot::Sender<GpioResult<()>>,
    },
    ConfigureOutput {
        pin: PinRef,
        reply: oneshot::Sender<GpioResult<()>>,
    },
    SetOutput {
        pin: PinRef,
        high: bool,
        reply: oneshot::Sender<GpioResult<()>>,
    },
    ReadLevel {
        pin: PinRef,
        reply: oneshot::Sender<GpioResult<Level>>,
    },
    Release {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the expander owner task.
///
/// Every method fails with [`GpioError::ActorStopped`] once the task has
/// released the bus.
#[derive(Debug, Clone)]
pub struct ExpanderHandle {
    tx: mpsc::Sender<ExpanderCommand>,
}

/// Spawn the owner task for `port`.
///
/// The task exits after [`ExpanderHandle::release`] or once every handle
/// has been dropped; either way the port is dropped, closing the bus.
pub fn spawn<P>(port: P) -> (ExpanderHandle, JoinHandle<()>)
where
    P: RegisterPort + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let task = tokio::spawn(run(Pca9555::new(port), rx).instrument(info_span!("expander")));
    (ExpanderHandle { tx }, task)
}

async fn run<P: RegisterPort>(mut chip: Pca9555<P>, mut rx: mpsc::Receiver<ExpanderCommand>) {
    debug!("Expander owner started");
    while let Some(command) = rx.recv().await {
        match command {
            ExpanderCommand::ConfigureInput { pin, reply } => {
                trace!(%pin, "configure input");
                respond(reply, chip.configure_input(pin));
            }
            ExpanderCommand::ConfigureOutput { pin, reply } => {
                trace!(%pin, "configure output");
                respond(reply, chip.configure_output(pin));
            }
            ExpanderCommand::SetOutput { pin, high, reply } => {
                respond(reply, chip.set_output(pin, high));
            }
            ExpanderCommand::ReadLevel { pin, reply } => {
                respond(reply, chip.read_level(pin));
            }
            ExpanderCommand::Release { reply } => {
                drop(chip);
                info!("Expander bus released");
                respond(reply, ());
                return;
            }
        }
    }
    debug!("All expander handles dropped, releasing bus");
}

fn respond<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        trace!("Expander requester went away before the reply");
    }
}

impl ExpanderHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<GpioResult<T>>) -> ExpanderCommand,
    ) -> GpioResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_closed| GpioError::ActorStopped)?;
        response.await.map_err(|_dropped| GpioError::ActorStopped)?
    }

    /// Make `pin` an input.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` on a bus failure or `ActorStopped` after release.
    pub async fn configure_input(&self, pin: PinRef) -> GpioResult<()> {
        self.request(|reply| ExpanderCommand::ConfigureInput { pin, reply })
            .await
    }

    /// Make `pin` an output.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` on a bus failure or `ActorStopped` after release.
    pub async fn configure_output(&self, pin: PinRef) -> GpioResult<()> {
        self.request(|reply| ExpanderCommand::ConfigureOutput { pin, reply })
            .await
    }

    /// Drive output `pin` high or low.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` on a bus failure or `ActorStopped` after release.
    pub async fn set_output(&self, pin: PinRef, high: bool) -> GpioResult<()> {
        self.request(|reply| ExpanderCommand::SetOutput { pin, high, reply })
            .await
    }

    /// Read the level on `pin`.
    ///
    /// # Errors
    ///
    /// Returns `PortAccess` on a bus failure or `ActorStopped` after release.
    pub async fn read_level(&self, pin: PinRef) -> GpioResult<Level> {
        self.request(|reply| ExpanderCommand::ReadLevel { pin, reply })
            .await
    }

    /// Stop the owner task and close the bus.
    ///
    /// Requests queued ahead of the release are still served.
    ///
    /// # Errors
    ///
    /// Returns `ActorStopped` if the bus was already released.
    pub async fn release(&self) -> GpioResult<()> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(ExpanderCommand::Release { reply })
            .await
            .map_err(|_closed| GpioError::ActorStopped)?;
        response.await.map_err(|_dropped| GpioError::ActorStopped)
    }

    /// Whether the owner task is still accepting requests.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExpander;
    use crate::pca9555::OUTPUT_PORT_1;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn test_requests_reach_chip() -> TestResult {
        let chip = MockExpander::new();
        let (handle, task) = spawn(chip.clone());
        let led = PinRef::new(1, 2)?;

        handle.configure_output(led).await?;
        handle.set_output(led, false).await?;
        assert!(!chip.is_input(led));
        assert!(!chip.output_high(led));

        handle.release().await?;
        task.await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_release_stops_accepting() -> TestResult {
        let (handle, task) = spawn(MockExpander::new());
        handle.release().await?;
        task.await?;

        let pin = PinRef::new(1, 7)?;
        assert!(matches!(
            handle.read_level(pin).await,
            Err(GpioError::ActorStopped)
        ));
        assert!(matches!(handle.release().await, Err(GpioError::ActorStopped)));
        assert!(!handle.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn test_bus_error_is_reported_not_fatal() -> TestResult {
        let chip = MockExpander::new();
        let (handle, task) = spawn(chip.clone());
        let pin = PinRef::new(1, 7)?;

        chip.fail_next(1);
        assert!(matches!(
            handle.read_level(pin).await,
            Err(GpioError::PortAccess { .. })
        ));
        assert_eq!(handle.read_level(pin).await?, Level::High);

        drop(handle);
        task.await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_bit_updates_are_not_lost() -> TestResult {
        let chip = MockExpander::new();
        chip.set_register(OUTPUT_PORT_1, 0x00);
        let (handle, task) = spawn(chip.clone());
        let status = PinRef::new(1, 2)?;
        let heartbeat = PinRef::new(1, 3)?;

        let mut workers = Vec::new();
        for (pin, rounds) in [(status, 50u32), (heartbeat, 51u32)] {
            let handle = handle.clone();
            workers.push(tokio::spawn(async move {
                for round in 0..rounds {
                    handle.set_output(pin, round % 2 == 0).await?;
                    tokio::task::yield_now().await;
                }
                Ok::<(), GpioError>(())
            }));
        }
        for worker in workers {
            worker.await??;
        }

        // Status ends low after an even number of toggles, heartbeat high.
        assert!(!chip.output_high(status));
        assert!(chip.output_high(heartbeat));
        assert_eq!(chip.register(OUTPUT_PORT_1), heartbeat.mask());

        handle.release().await?;
        task.await?;
        Ok(())
    }
}
