/// Snapshot based transactions over a disk image
///
/// A transaction copies the whole image buffer when it begins. If the
/// mutation fails (or the transaction is dropped without being committed)
/// the copy is swapped back in, so a failed operation never leaves a
/// partially written image behind.

use crate::error::Result;
use crate::image::DiskImage;
use log::{debug, warn};

/// Transaction lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction in progress
    Idle,
    /// Buffer copied, nothing written yet
    Snapshotted,
    /// The image has been handed out for mutation
    Mutating,
    /// Changes kept, snapshot discarded
    Committed,
    /// Snapshot restored
    RolledBack,
}

/// Owned backup of an image buffer
#[derive(Debug)]
struct Snapshot {
    data: Vec<u8>,
    changed: bool,
}

/// An in-flight transaction holding the only mutable borrow of the image
#[derive(Debug)]
pub struct Transaction<'a> {
    image: &'a mut DiskImage,
    snapshot: Option<Snapshot>,
}

impl<'a> Transaction<'a> {
    /// Snapshot the image and start a transaction
    ///
    /// # Panics
    ///
    /// Transactions do not nest: beginning one on an image that already has
    /// one in progress is a programming error.
    pub fn begin(image: &'a mut DiskImage) -> Self {
        assert_eq!(
            image.transaction,
            TransactionState::Idle,
            "transaction already in progress on this image"
        );
        image.transaction = TransactionState::Snapshotted;

        let snapshot = Snapshot {
            data: image.data.clone(),
            changed: image.changed,
        };
        debug!("transaction snapshot of {} bytes", snapshot.data.len());

        Self {
            image,
            snapshot: Some(snapshot),
        }
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.image.transaction
    }

    /// Mutable access to the image for the duration of the transaction
    pub fn image(&mut self) -> &mut DiskImage {
        self.image.transaction = TransactionState::Mutating;
        self.image
    }

    /// Keep the changes and discard the snapshot
    pub fn commit(mut self) {
        self.snapshot = None;
        self.image.transaction = TransactionState::Committed;
        debug!("transaction committed");
    }

    /// Restore the snapshot verbatim
    pub fn rollback(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.image.data = snapshot.data;
            self.image.changed = snapshot.changed;
            warn!("transaction rolled back");
        }
        self.image.transaction = TransactionState::RolledBack;
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`
    pub fn run<T, F>(image: &mut DiskImage, f: F) -> Result<T>
    where
        F: FnOnce(&mut DiskImage) -> Result<T>,
    {
        let mut transaction = Transaction::begin(image);
        match f(transaction.image()) {
            Ok(value) => {
                transaction.commit();
                Ok(value)
            }
            Err(e) => {
                warn!("operation failed: {}", e);
                transaction.rollback();
                Err(e)
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if matches!(
            self.image.transaction,
            TransactionState::Snapshotted | TransactionState::Mutating
        ) {
            self.restore();
        }
        self.image.transaction = TransactionState::Idle;
    }
}
