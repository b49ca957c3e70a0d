//! Writer thread
//!
//! Single consumer of the write channel. Messages are applied one by one,
//! in the order they were sent, each in a fresh transaction of its own.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{FineError, Result};
use crate::storage::Storage;
use super::WriteMessage;

/// Sending end of the write channel
///
/// Every connection worker holds its own clone. The writer thread stops
/// once all clones are dropped and the queue is drained.
#[derive(Clone)]
pub struct WriterHandle {
    sender: Sender<WriteMessage>,
}

impl WriterHandle {
    /// Queue a mutation
    pub fn send(&self, message: WriteMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| FineError::WriterUnavailable)
    }

    /// Number of messages waiting to be applied
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

/// Totals reported by the writer thread when it stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub applied: u64,
    pub failed: u64,
}

/// The writer thread's state
pub struct Writer {
    storage: Storage,
    receiver: Receiver<WriteMessage>,
    stats: WriterStats,
}

impl Writer {
    /// Start the writer thread
    pub fn spawn(storage: Storage) -> Result<(WriterHandle, JoinHandle<WriterStats>)> {
        let (sender, receiver) = channel::unbounded();
        let writer = Writer {
            storage,
            receiver,
            stats: WriterStats::default(),
        };

        let thread = thread::Builder::new()
            .name("finedb-writer".to_string())
            .spawn(move || writer.run())?;

        Ok((WriterHandle { sender }, thread))
    }

    fn run(mut self) -> WriterStats {
        tracing::debug!("Writer thread started");

        while let Ok(message) = self.receiver.recv() {
            self.apply(message);
        }

        tracing::info!(
            "Writer thread stopped: {} applied, {} failed",
            self.stats.applied,
            self.stats.failed
        );
        self.stats
    }

    /// Apply one message; failures are logged, never reported back
    fn apply(&mut self, message: WriteMessage) {
        let action = message.action();
        let result = match &message {
            WriteMessage::Put {
                dbname,
                key,
                value,
                create_only,
            } => self
                .storage
                .put(None, dbname.as_deref(), key, value, *create_only),
            WriteMessage::Del { dbname, key } => self.storage.del(None, dbname.as_deref(), key),
            WriteMessage::Drop { dbname } => self.storage.drop_db(None, dbname),
        };

        match result {
            Ok(()) => {
                self.stats.applied += 1;
                tracing::trace!("Applied {:?} on {:?}", action, message.dbname());
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!("Unable to apply {:?} on {:?}: {}", action, message.dbname(), e);
            }
        }
    }
}
