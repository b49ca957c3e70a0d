//! Command handlers
//!
//! One method per command. Storage and compression failures are answered
//! with a status code and the connection stays open; only I/O failures (and
//! a lost writer thread) are returned as errors, which ends the connection.

use std::io::{Read, Write};
use std::ops::ControlFlow;

use bytes::Bytes;

use crate::compression;
use crate::error::Result;
use crate::protocol::{write_list_end, write_list_entry, write_response, RequestOptions, Status};
use crate::storage::Storage;
use crate::writer::WriteMessage;

use super::connection::{Connection, Session};

/// Write semantics of a PUT-family command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PutMode {
    /// Insert or overwrite
    Upsert,
    /// Fail if the key exists
    CreateOnly,
    /// Fail if the key does not exist (always synchronous)
    UpdateOnly,
}

impl<'a, R: Read, W: Write> Connection<'a, R, W> {
    pub(crate) fn ping(&mut self) -> Result<()> {
        self.respond(Status::Ok)
    }

    pub(crate) fn setdb(&mut self) -> Result<()> {
        let name = self.reader.read_dbname()?;

        if name.is_empty() {
            self.session.dbname = None;
            return self.respond(Status::Ok);
        }

        match String::from_utf8(name.to_vec()) {
            Ok(name) => {
                tracing::debug!("{} selected sub-database {:?}", self.peer_addr(), name);
                self.session.dbname = Some(name);
                self.respond(Status::Ok)
            }
            Err(_) => self.respond(Status::BadName),
        }
    }

    pub(crate) fn get(&mut self, options: RequestOptions) -> Result<()> {
        let key = self.reader.read_key()?;

        let Session {
            dbname,
            transaction,
            ..
        } = &mut self.session;
        let stored = match self
            .storage
            .get(transaction.as_mut(), dbname.as_deref(), &key)
        {
            Ok(stored) => stored,
            Err(e) => return self.respond_result("GET", Err(e)),
        };

        // Values are stored compressed
        let payload = if options.compressed {
            stored
        } else {
            match compression::uncompress(&stored) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Unable to uncompress value for {}: {}", self.peer_addr(), e);
                    return self.respond(Status::Server);
                }
            }
        };

        write_response(
            &mut self.output,
            Status::Ok,
            options.serialized,
            options.compressed,
            Some(&payload),
        )
    }

    pub(crate) fn put(&mut self, options: RequestOptions, sync: bool, mode: PutMode) -> Result<()> {
        let key = self.reader.read_key()?;
        let value = self.reader.read_value()?;

        let value = if options.compressed {
            value
        } else {
            match compression::compress(&value) {
                Ok(compressed) => Bytes::from(compressed),
                Err(e) => {
                    tracing::warn!("Unable to compress value for {}: {}", self.peer_addr(), e);
                    return self.respond(Status::Server);
                }
            }
        };

        if !sync {
            self.respond(Status::Ok)?;
            return self.session.writer.send(WriteMessage::Put {
                dbname: self.session.dbname.clone(),
                key,
                value,
                create_only: mode == PutMode::CreateOnly,
            });
        }

        let result = match mode {
            PutMode::UpdateOnly => self.update_existing(&key, &value),
            PutMode::Upsert | PutMode::CreateOnly => {
                let Session {
                    dbname,
                    transaction,
                    ..
                } = &mut self.session;
                self.storage.put(
                    transaction.as_mut(),
                    dbname.as_deref(),
                    &key,
                    &value,
                    mode == PutMode::CreateOnly,
                )
            }
        };
        self.respond_result("PUT", result)
    }

    /// Overwrite a key only if it already exists, checked and written in
    /// one transaction
    fn update_existing(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let storage = self.storage;
        let Session {
            dbname,
            transaction,
            ..
        } = &mut self.session;
        let dbname = dbname.as_deref();

        if let Some(txn) = transaction.as_mut() {
            storage.get(Some(&mut *txn), dbname, key)?;
            return storage.put(Some(txn), dbname, key, value, false);
        }

        let mut txn = storage.begin()?;
        storage.get(Some(&mut txn), dbname, key)?;
        storage.put(Some(&mut txn), dbname, key, value, false)?;
        Storage::commit(txn)
    }

    pub(crate) fn del(&mut self, sync: bool) -> Result<()> {
        let key = self.reader.read_key()?;

        if !sync {
            self.respond(Status::Ok)?;
            return self.session.writer.send(WriteMessage::Del {
                dbname: self.session.dbname.clone(),
                key,
            });
        }

        let Session {
            dbname,
            transaction,
            ..
        } = &mut self.session;
        let result = self
            .storage
            .del(transaction.as_mut(), dbname.as_deref(), &key);
        self.respond_result("DEL", result)
    }

    /// OK first, then one `[len][key]` entry per key, then a zero byte
    pub(crate) fn list(&mut self) -> Result<()> {
        self.respond(Status::Ok)?;

        let Connection {
            storage,
            session,
            output,
            ..
        } = &mut *self;
        storage.list(
            session.transaction.as_mut(),
            session.dbname.as_deref(),
            |key, _value| {
                write_list_entry(&mut *output, key)?;
                Ok(ControlFlow::Continue(()))
            },
        )?;

        write_list_end(&mut self.output)
    }

    pub(crate) fn drop_db(&mut self, sync: bool) -> Result<()> {
        let Some(name) = self.session.dbname.clone() else {
            tracing::debug!("DROP without a selected sub-database from {}", self.peer_addr());
            return self.respond(Status::BadName);
        };

        if !sync {
            self.respond(Status::Ok)?;
            return self.session.writer.send(WriteMessage::Drop { dbname: name });
        }

        let result = self
            .storage
            .drop_db(self.session.transaction.as_mut(), &name);
        self.respond_result("DROP", result)
    }

    /// Open a transaction, discarding any previous one
    pub(crate) fn start(&mut self) -> Result<()> {
        if self.session.rollback() {
            tracing::debug!("START rolled back the previous transaction of {}", self.peer_addr());
        }

        match self.storage.begin() {
            Ok(txn) => {
                self.session.transaction = Some(txn);
                self.respond(Status::Ok)
            }
            Err(e) => {
                tracing::warn!("Unable to open transaction for {}: {}", self.peer_addr(), e);
                self.respond(Status::Transaction)
            }
        }
    }

    /// Roll back the open transaction
    pub(crate) fn stop(&mut self) -> Result<()> {
        if self.session.rollback() {
            self.respond(Status::Ok)
        } else {
            self.respond(Status::Transaction)
        }
    }

    pub(crate) fn commit(&mut self) -> Result<()> {
        let Some(txn) = self.session.transaction.take() else {
            return self.respond(Status::Transaction);
        };

        match Storage::commit(txn) {
            Ok(()) => self.respond(Status::Ok),
            Err(e) => {
                tracing::warn!("Unable to commit transaction of {}: {}", self.peer_addr(), e);
                self.respond(Status::Transaction)
            }
        }
    }
}
