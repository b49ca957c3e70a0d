//! Connection Handler
//!
//! Handles individual client connections: per-connection session state and
//! the request loop.

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::error::{FineError, Result};
use crate::protocol::{decode_control_byte, write_response, CommandId, FrameReader, Status};
use crate::storage::{Storage, Transaction};
use crate::writer::WriterHandle;

use super::handlers::PutMode;

/// State attached to one client connection
pub struct Session<'a> {
    /// Selected sub-database (`None` = default database)
    pub(crate) dbname: Option<String>,

    /// Open transaction, if any
    pub(crate) transaction: Option<Transaction<'a>>,

    /// Channel to the writer thread
    pub(crate) writer: WriterHandle,
}

impl<'a> Session<'a> {
    pub fn new(writer: WriterHandle) -> Self {
        Self {
            dbname: None,
            transaction: None,
            writer,
        }
    }

    pub fn dbname(&self) -> Option<&str> {
        self.dbname.as_deref()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Roll back the open transaction, if any
    pub fn rollback(&mut self) -> bool {
        match self.transaction.take() {
            Some(txn) => {
                Storage::rollback(txn);
                true
            }
            None => false,
        }
    }
}

/// Handles a single client connection
pub struct Connection<'a, R, W> {
    /// Incoming request bytes
    pub(crate) reader: FrameReader<R>,

    /// Outgoing responses
    pub(crate) output: W,

    /// Reference to the storage environment
    pub(crate) storage: &'a Storage,

    /// Session state
    pub(crate) session: Session<'a>,

    /// Peer address for logging
    peer_addr: String,
}

impl<'a> Connection<'a, TcpStream, TcpStream> {
    /// Create a handler for an accepted socket
    ///
    /// Timeouts must already be configured on `stream`.
    pub fn from_stream(stream: TcpStream, storage: &'a Storage, writer: WriterHandle) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        Ok(Self::new(read_stream, stream, storage, writer, peer_addr))
    }
}

impl<'a, R: Read, W: Write> Connection<'a, R, W> {
    pub fn new(
        reader: R,
        output: W,
        storage: &'a Storage,
        writer: WriterHandle,
        peer_addr: impl Into<String>,
    ) -> Self {
        Self {
            reader: FrameReader::new(reader),
            output,
            storage,
            session: Session::new(writer),
            peer_addr: peer_addr.into(),
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub fn session(&self) -> &Session<'a> {
        &self.session
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns `Ok` when the client disconnects or times out, and an error
    /// when the connection had to be dropped for any other reason.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            match self.serve_request() {
                Ok(()) => continue,
                Err(e) if e.is_disconnect() => {
                    tracing::debug!("Client {} disconnected: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read, dispatch and answer one request
    pub fn serve_request(&mut self) -> Result<()> {
        let control = self.reader.read_u8()?;

        let (command, options) = match decode_control_byte(control) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!("Bad command byte 0x{:02x} from {}", control, self.peer_addr);
                self.respond(Status::Protocol)?;
                return Err(e);
            }
        };

        let sync = options.sync || self.session.in_transaction();
        tracing::debug!(
            "Request from {}: {:?} (txn: {}, sync: {}, compressed: {}, s2s: {})",
            self.peer_addr,
            command,
            self.session.in_transaction(),
            sync,
            options.compressed,
            options.server_to_server
        );

        match command {
            CommandId::Ping => self.ping(),
            CommandId::SetDb => self.setdb(),
            CommandId::Get => self.get(options),
            CommandId::Put => self.put(options, sync, PutMode::Upsert),
            CommandId::Add => self.put(options, sync, PutMode::CreateOnly),
            CommandId::Update => self.put(options, true, PutMode::UpdateOnly),
            CommandId::Del => self.del(sync),
            CommandId::List => self.list(),
            CommandId::Drop => self.drop_db(sync),
            CommandId::Start => self.start(),
            CommandId::Stop => self.stop(),
            CommandId::Commit => self.commit(),
            CommandId::Admin | CommandId::Extra => {
                self.respond(Status::Protocol)?;
                Err(FineError::Protocol(format!("Unsupported command: {:?}", command)))
            }
        }
    }

    /// End the session: roll back any open transaction
    pub fn close(mut self) {
        if self.session.rollback() {
            tracing::debug!("Rolled back open transaction of {}", self.peer_addr);
        }
        tracing::debug!("End of connection from {}", self.peer_addr);
    }

    /// Send a bare status byte
    pub(crate) fn respond(&mut self, status: Status) -> Result<()> {
        write_response(&mut self.output, status, false, false, None)
    }

    /// Answer OK, or the status mapped from a failed storage call
    pub(crate) fn respond_result(&mut self, operation: &str, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => self.respond(Status::Ok),
            Err(e) => {
                let status = e.status();
                if status == Status::Server {
                    tracing::warn!("{} failed for {}: {}", operation, self.peer_addr, e);
                } else {
                    tracing::debug!("{} refused for {}: {}", operation, self.peer_addr, e);
                }
                self.respond(status)
            }
        }
    }
}
