//! Read-write transaction with serialized sub-database handle resolution

use lmdb::{Database, DatabaseFlags, RwTransaction, Transaction as _};
use parking_lot::{Mutex, MutexGuard};

use crate::error::Result;

/// A read-write transaction on the storage environment
///
/// Handles opened or created inside a write transaction stay private to it
/// until commit, and the engine frees them on abort. While such handles may
/// exist, no other thread may resolve a handle, so the transaction takes the
/// environment's handle lock on its first resolution and keeps it until it
/// ends.
pub struct Transaction<'a> {
    // Declared before `handles`: the transaction ends before the lock is
    // released.
    pub(super) txn: RwTransaction<'a>,
    handles: Option<MutexGuard<'a, ()>>,
    lock: &'a Mutex<()>,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(txn: RwTransaction<'a>, lock: &'a Mutex<()>) -> Self {
        Self {
            txn,
            handles: None,
            lock,
        }
    }

    pub(super) fn commit(self) -> Result<()> {
        let Transaction { txn, handles, .. } = self;
        let result = txn.commit();
        drop(handles);
        Ok(result?)
    }

    pub(super) fn abort(self) {
        let Transaction { txn, handles, .. } = self;
        txn.abort();
        drop(handles);
    }

    /// Open an existing sub-database; `None` if it was never created
    pub(super) fn open_db(&mut self, dbname: Option<&str>) -> Result<Option<Database>> {
        self.hold_handles();

        // SAFETY: handle resolution is serialized by the handle lock, held
        // until this transaction ends.
        match unsafe { self.txn.open_db(dbname) } {
            Ok(db) => Ok(Some(db)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Open a sub-database, creating it if needed
    pub(super) fn create_db(&mut self, dbname: Option<&str>) -> Result<Database> {
        self.hold_handles();

        // SAFETY: as in `open_db`
        Ok(unsafe { self.txn.create_db(dbname, DatabaseFlags::empty())? })
    }

    /// Delete a sub-database and free its handle slot
    pub(super) fn delete_db(&mut self, db: Database) -> Result<()> {
        self.hold_handles();

        // SAFETY: the handle lock is held, and no cursor on `db` is open in
        // this transaction.
        Ok(unsafe { self.txn.drop_db(db)? })
    }

    fn hold_handles(&mut self) {
        if self.handles.is_none() {
            let lock = self.lock;
            self.handles = Some(lock.lock());
        }
    }
}
