//! One-shot completion signals for asynchronous device work
//!
//! A [`Completion`] is handed out when a transfer or kernel launch is issued
//! and is consumed exactly once by [`Completion::wait`]. The device side
//! resolves it through the paired [`Signal`].
//!
//! Some devices only make progress when polled (WebGPU invokes its
//! completion callbacks from `Device::poll`). Such devices attach a driver
//! closure that `wait` runs before blocking on the signal.

use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

use crate::error::{Error, Result};

type Driver = Box<dyn FnOnce() -> Result<()> + Send>;

/// Sending half of a completion, resolved by the device.
pub struct Signal {
    sender: SyncSender<Result<()>>,
}

impl Signal {
    /// Resolve the paired [`Completion`].
    ///
    /// Resolving a completion that was already dropped is not an error: the
    /// waiter gave up on the result.
    pub fn complete(self, result: Result<()>) {
        // `self` is consumed, so the single slot is always free.
        let _ = self.sender.try_send(result);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").finish_non_exhaustive()
    }
}

/// One-shot handle for an in-flight device operation.
#[must_use = "a completion must be waited on before the device work it tracks is used"]
pub struct Completion {
    receiver: Receiver<Result<()>>,
    driver: Option<Driver>,
    lost: Error,
}

/// Create a linked signal/completion pair.
///
/// `lost` is reported by `wait` if the signal is dropped without resolving.
pub fn signal(lost: Error) -> (Signal, Completion) {
    let (sender, receiver) = sync_channel(1);
    (
        Signal { sender },
        Completion {
            receiver,
            driver: None,
            lost,
        },
    )
}

impl Completion {
    /// An already resolved completion.
    pub fn ready(result: Result<()>) -> Self {
        let (sender, receiver) = sync_channel(1);
        // Capacity 1 and a live receiver: cannot fail.
        let _ = sender.try_send(result);
        Self {
            receiver,
            driver: None,
            lost: Error::NotInitialized { op: "completion" },
        }
    }

    /// Attach a driver that is run once before blocking on the signal.
    pub fn with_driver<F>(mut self, driver: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.driver = Some(Box::new(driver));
        self
    }

    /// Block until the operation resolves.
    ///
    /// There is no timeout: a stalled device stalls the caller.
    pub fn wait(self) -> Result<()> {
        let Self {
            receiver,
            driver,
            lost,
        } = self;

        let driven = match driver {
            Some(drive) => drive(),
            None => Ok(()),
        };

        let signalled = receiver.recv().unwrap_or(Err(lost));
        driven.and(signalled)
    }

    /// Wait for two independent operations.
    ///
    /// Both are always waited on, even when the first fails, so no work
    /// issued by the caller is still running when this returns. The first
    /// error (in argument order) is reported.
    pub fn join(first: Completion, second: Completion) -> Result<()> {
        let a = first.wait();
        let b = second.wait();
        a.and(b)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("driven", &self.driver.is_some())
            .finish_non_exhaustive()
    }
}
