//! Delivery of asynchronous permission confirmations back onto the primary context.

use flume::{Receiver, Sender};
use tracing::warn;
use uuid::Uuid;

/// A permission update for `player` that was reported as deferred has now taken effect.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PermissionConfirmed {
    pub player: Uuid,
}

/// Permission workers send on a [`ConfirmationSender`]; the primary context drains the channel.
#[derive(Clone, Debug)]
pub struct ConfirmationChannel {
    tx: Sender<PermissionConfirmed>,
    rx: Receiver<PermissionConfirmed>,
}

impl Default for ConfirmationChannel {
    fn default() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }
}

impl ConfirmationChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sender(&self) -> ConfirmationSender {
        ConfirmationSender(self.tx.clone())
    }

    /// Takes every confirmation received so far without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<PermissionConfirmed> {
        self.rx.try_iter().collect()
    }
}

/// Handle given to permission workers. Safe to use from any thread.
#[derive(Clone, Debug)]
pub struct ConfirmationSender(Sender<PermissionConfirmed>);

impl ConfirmationSender {
    pub fn confirm(&self, player: Uuid) {
        if let Err(e) = self.0.send(PermissionConfirmed { player }) {
            warn!("failed to deliver permission confirmation for {player}: {e}");
        }
    }
}
