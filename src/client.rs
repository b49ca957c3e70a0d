//! Blocking client
//!
//! Speaks the wire protocol over one TCP connection. Every call waits for
//! the server's answer; a non-OK status comes back as
//! `FineError::Rejected`.
//!
//! When the connection is lost outside a transaction, the client reconnects,
//! checks the server with a PING, selects its sub-database again and retries
//! the request once. Inside a transaction the error is returned as is: the
//! server has already rolled the transaction back.

use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::compression;
use crate::error::{FineError, Result};
use crate::protocol::{encode_request, FrameReader, Request, RequestOptions, ResponseHeader, Status};

/// Default socket timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for the rest of a LIST entry whose length starts with a
/// zero byte before taking that byte as the end of the stream
const LIST_END_GRACE: Duration = Duration::from_millis(200);

/// A connection to a FineDB server
pub struct Client {
    addr: SocketAddr,
    reader: FrameReader<TcpStream>,
    stream: TcpStream,

    /// Ask the server to apply writes before answering
    sync: bool,

    /// Compress values on this side and ask for compressed values back
    compress: bool,

    dbname: Option<String>,
    in_transaction: bool,
    timeout: Duration,
}

impl Client {
    /// Connect to a server
    ///
    /// Writes are synchronous and values uncompressed until configured
    /// otherwise.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
            FineError::Config("server address did not resolve".to_string())
        })?;
        let (reader, stream) = open(addr, DEFAULT_TIMEOUT)?;

        Ok(Self {
            addr,
            reader,
            stream,
            sync: true,
            compress: false,
            dbname: None,
            in_transaction: false,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Choose between acknowledged-after-commit (`true`) and fire-and-forget
    /// (`false`) writes
    pub fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }

    pub fn set_compression(&mut self, compress: bool) {
        self.compress = compress;
    }

    /// Set the socket timeouts (applies to later reconnections too)
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        self.timeout = timeout;
        Ok(())
    }

    pub fn dbname(&self) -> Option<&str> {
        self.dbname.as_deref()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub fn ping(&mut self) -> Result<()> {
        self.call(&Request::Ping, RequestOptions::default(), Self::read_ack)
    }

    /// Select a sub-database (`None` or `""` = default database)
    pub fn setdb(&mut self, name: Option<&str>) -> Result<()> {
        let name = name.filter(|name| !name.is_empty()).map(str::to_string);
        let request = Request::SetDb { name: name.clone() };
        self.call(&request, RequestOptions::default(), Self::read_ack)?;
        self.dbname = name;
        Ok(())
    }

    /// Read a value; `None` when the key (or the sub-database) does not exist
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let request = Request::Get { key: key.to_vec() };
        let options = RequestOptions {
            compressed: self.compress,
            ..RequestOptions::default()
        };

        match self.call(&request, options, Self::read_payload) {
            Ok((header, payload)) if header.compressed => {
                Ok(Some(compression::uncompress(&payload)?))
            }
            Ok((_, payload)) => Ok(Some(payload)),
            Err(FineError::Rejected(Status::BadName)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert or overwrite a key
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let (value, options) = self.write_payload(value)?;
        let request = Request::Put {
            key: key.to_vec(),
            value,
        };
        self.call(&request, options, Self::read_ack)
    }

    /// Insert a key that must not exist yet
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let (value, options) = self.write_payload(value)?;
        let request = Request::Add {
            key: key.to_vec(),
            value,
        };
        self.call(&request, options, Self::read_ack)
    }

    /// Overwrite a key that must already exist (always synchronous)
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let (value, options) = self.write_payload(value)?;
        let request = Request::Update {
            key: key.to_vec(),
            value,
        };
        self.call(&request, options, Self::read_ack)
    }

    pub fn del(&mut self, key: &[u8]) -> Result<()> {
        let request = Request::Del { key: key.to_vec() };
        self.call(&request, self.write_options(), Self::read_ack)
    }

    /// Keys of the selected sub-database, in key order
    pub fn list(&mut self) -> Result<Vec<Vec<u8>>> {
        self.call(&Request::List, RequestOptions::default(), Self::read_list)
    }

    /// Delete the selected sub-database with all its keys
    pub fn drop_db(&mut self) -> Result<()> {
        self.call(&Request::Drop, self.write_options(), Self::read_ack)
    }

    /// Open a transaction; every command is synchronous until it ends
    pub fn start(&mut self) -> Result<()> {
        self.call(&Request::Start, RequestOptions::default(), Self::read_ack)?;
        self.in_transaction = true;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        let result = self.call(&Request::Commit, RequestOptions::default(), Self::read_ack);
        self.in_transaction = false;
        result
    }

    pub fn rollback(&mut self) -> Result<()> {
        let result = self.call(&Request::Stop, RequestOptions::default(), Self::read_ack);
        self.in_transaction = false;
        result
    }

    // =========================================================================
    // Exchange
    // =========================================================================

    fn write_options(&self) -> RequestOptions {
        RequestOptions {
            sync: self.sync,
            ..RequestOptions::default()
        }
    }

    fn write_payload(&self, value: &[u8]) -> Result<(Vec<u8>, RequestOptions)> {
        let mut options = self.write_options();
        if self.compress {
            options.compressed = true;
            return Ok((compression::compress(value)?, options));
        }
        Ok((value.to_vec(), options))
    }

    /// Send a request and read its answer, retrying once on a new connection
    fn call<T>(
        &mut self,
        request: &Request,
        options: RequestOptions,
        read: fn(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let frame = encode_request(request, options)?;

        match self.exchange(&frame, read) {
            Err(e) if e.is_disconnect() => {
                if self.in_transaction {
                    self.in_transaction = false;
                    return Err(e);
                }
                tracing::debug!("Connection to {} lost ({}), reconnecting", self.addr, e);
                self.reconnect()?;
                self.exchange(&frame, read)
            }
            other => other,
        }
    }

    fn exchange<T>(&mut self, frame: &[u8], read: fn(&mut Self) -> Result<T>) -> Result<T> {
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        read(self)
    }

    fn reconnect(&mut self) -> Result<()> {
        let (reader, stream) = open(self.addr, self.timeout)?;
        self.reader = reader;
        self.stream = stream;

        let ping = encode_request(&Request::Ping, RequestOptions::default())?;
        self.exchange(&ping, Self::read_ack)?;

        if let Some(name) = self.dbname.clone() {
            let setdb = encode_request(&Request::SetDb { name: Some(name) }, RequestOptions::default())?;
            self.exchange(&setdb, Self::read_ack)?;
        }
        Ok(())
    }

    fn read_header(&mut self) -> Result<ResponseHeader> {
        let header = ResponseHeader::decode(self.reader.read_u8()?)?;
        if !header.status.is_ok() {
            return Err(FineError::Rejected(header.status));
        }
        Ok(header)
    }

    fn read_ack(&mut self) -> Result<()> {
        self.read_header().map(|_| ())
    }

    fn read_payload(&mut self) -> Result<(ResponseHeader, Vec<u8>)> {
        let header = self.read_header()?;
        let payload = self.reader.read_value()?;
        Ok((header, payload.to_vec()))
    }

    fn read_list(&mut self) -> Result<Vec<Vec<u8>>> {
        self.read_header()?;

        let mut keys = Vec::new();
        loop {
            let high = self.reader.read_u8()?;
            if high == 0 && !self.more_list_data()? {
                return Ok(keys);
            }
            let low = self.reader.read_u8()?;
            let len = u16::from_be_bytes([high, low]) as usize;
            keys.push(self.reader.read_bytes(len)?.to_vec());
        }
    }

    /// Whether a zero byte just read from a LIST stream is followed by more
    /// data (a key length below 256) rather than ending the stream
    ///
    /// Nothing follows the end marker, and a key is never empty.
    fn more_list_data(&mut self) -> Result<bool> {
        if self.reader.buffered() > 0 {
            return Ok(true);
        }

        self.reader.get_ref().set_read_timeout(Some(LIST_END_GRACE))?;
        let probe = self.reader.fill(1);
        self.reader.get_ref().set_read_timeout(Some(self.timeout))?;

        match probe {
            Ok(()) => Ok(true),
            Err(e) if e.is_disconnect() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn open(addr: SocketAddr, timeout: Duration) -> Result<(FrameReader<TcpStream>, TcpStream)> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    let reader = FrameReader::new(stream.try_clone()?);
    Ok((reader, stream))
}
