//! LMDB-backed storage
//!
//! Every operation accepts an optional caller transaction. Without one, the
//! operation runs in its own single-operation transaction, committed on
//! success and aborted on failure.
//!
//! The engine forbids opening sub-database handles from concurrent
//! transactions. Storage keeps one handle lock per environment: write
//! transactions hold it from their first resolution until they end, and
//! reads resolve their handle under it in a short read-only transaction
//! whose commit publishes the handle to later transactions. The lock is
//! always taken after the engine's writer lock, never before.

use std::fs;
use std::ops::ControlFlow;
use std::sync::Arc;

use lmdb::{Cursor, Database, Environment, Transaction as _, WriteFlags};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{FineError, Result};

use super::transaction::Transaction;

/// Map sizes are rounded up to a multiple of this (covers 4K-64K pages)
const MAP_SIZE_ALIGN: usize = 64 * 1024;

/// Handle on the storage environment
///
/// Cheap to clone; all clones share one environment. Sub-database handles
/// are resolved on each call and never cached.
#[derive(Clone)]
pub struct Storage {
    env: Arc<Environment>,
    handles: Arc<Mutex<()>>,
}

impl Storage {
    /// Open (or create) the environment in `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let env = Environment::new()
            .set_map_size(config.map_size.next_multiple_of(MAP_SIZE_ALIGN))
            .set_max_readers(config.effective_max_readers())
            .set_max_dbs(config.max_dbs)
            .open(&config.data_dir)?;

        tracing::debug!(
            "Opened environment at {} (map size {}, {} sub-databases)",
            config.data_dir.display(),
            config.map_size,
            config.max_dbs
        );

        Ok(Self {
            env: Arc::new(env),
            handles: Arc::new(Mutex::new(())),
        })
    }

    /// Close the environment once every clone is gone
    pub fn close(self) {
        tracing::debug!("Closing environment");
        drop(self.env);
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begin a read-write transaction
    ///
    /// The engine allows one write transaction at a time; this blocks while
    /// another one is open.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        let txn = self.env.begin_rw_txn()?;
        Ok(Transaction::new(txn, &self.handles))
    }

    pub fn commit(txn: Transaction<'_>) -> Result<()> {
        txn.commit()
    }

    pub fn rollback(txn: Transaction<'_>) {
        txn.abort();
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Write a key, creating the sub-database if needed
    ///
    /// With `create_only`, an existing key fails with `KeyExists`.
    pub fn put(
        &self,
        txn: Option<&mut Transaction<'_>>,
        dbname: Option<&str>,
        key: &[u8],
        value: &[u8],
        create_only: bool,
    ) -> Result<()> {
        let flags = if create_only {
            WriteFlags::NO_OVERWRITE
        } else {
            WriteFlags::empty()
        };

        self.write_with(txn, |txn| {
            let db = txn.create_db(dbname)?;
            txn.txn.put(db, &key, &value, flags)?;
            Ok(())
        })
    }

    /// Remove a key; an absent key fails with `KeyNotFound`
    pub fn del(&self, txn: Option<&mut Transaction<'_>>, dbname: Option<&str>, key: &[u8]) -> Result<()> {
        self.write_with(txn, |txn| {
            let db = require(dbname, txn.open_db(dbname)?)?;
            txn.txn.del(db, &key, None)?;
            Ok(())
        })
    }

    /// Read a key
    pub fn get(&self, txn: Option<&mut Transaction<'_>>, dbname: Option<&str>, key: &[u8]) -> Result<Vec<u8>> {
        match txn {
            Some(txn) => {
                let db = require(dbname, txn.open_db(dbname)?)?;
                read_value(&txn.txn, db, key)
            }
            None => {
                let db = require(dbname, self.open_published(dbname)?)?;
                let txn = self.env.begin_ro_txn()?;
                read_value(&txn, db, key)
            }
        }
    }

    /// Walk a sub-database in key order
    ///
    /// `callback` sees every key/value pair until it returns `Break`. A
    /// sub-database that does not exist is walked as empty.
    pub fn list<F>(&self, txn: Option<&mut Transaction<'_>>, dbname: Option<&str>, callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<ControlFlow<()>>,
    {
        match txn {
            Some(txn) => match txn.open_db(dbname)? {
                Some(db) => walk(&txn.txn, db, callback),
                None => Ok(()),
            },
            None => match self.open_published(dbname)? {
                Some(db) => {
                    let txn = self.env.begin_ro_txn()?;
                    walk(&txn, db, callback)
                }
                None => Ok(()),
            },
        }
    }

    /// Delete a named sub-database with all its keys
    ///
    /// The name no longer counts toward the sub-database limit once the
    /// deletion commits.
    pub fn drop_db(&self, txn: Option<&mut Transaction<'_>>, dbname: &str) -> Result<()> {
        self.write_with(txn, |txn| {
            let db = require(Some(dbname), txn.open_db(Some(dbname))?)?;
            txn.delete_db(db)
        })
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Resolve a handle for use by read-only transactions begun afterwards
    fn open_published(&self, dbname: Option<&str>) -> Result<Option<Database>> {
        let _handles = self.handles.lock();
        let txn = self.env.begin_ro_txn()?;

        // SAFETY: handle resolution is serialized by the handle lock
        let db = match unsafe { txn.open_db(dbname) } {
            Ok(db) => db,
            Err(lmdb::Error::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(Some(db))
    }

    fn write_with<T>(
        &self,
        txn: Option<&mut Transaction<'_>>,
        op: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        match txn {
            Some(txn) => op(txn),
            None => {
                // Dropped (aborted) if `op` fails
                let mut txn = self.begin()?;
                let out = op(&mut txn)?;
                txn.commit()?;
                Ok(out)
            }
        }
    }
}

fn require(dbname: Option<&str>, db: Option<Database>) -> Result<Database> {
    db.ok_or_else(|| FineError::DatabaseNotFound(dbname.unwrap_or("<default>").to_string()))
}

fn read_value<T: lmdb::Transaction>(txn: &T, db: Database, key: &[u8]) -> Result<Vec<u8>> {
    Ok(txn.get(db, &key)?.to_vec())
}

fn walk<T, F>(txn: &T, db: Database, mut callback: F) -> Result<()>
where
    T: lmdb::Transaction,
    F: FnMut(&[u8], &[u8]) -> Result<ControlFlow<()>>,
{
    let mut cursor = txn.open_ro_cursor(db)?;
    for entry in cursor.iter_start() {
        let (key, value) = entry?;
        if callback(key, value)?.is_break() {
            break;
        }
    }
    Ok(())
}
