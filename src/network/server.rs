//! TCP Server
//!
//! Accepts connections and hands them to the worker pool through the
//! admission queue.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel;

use crate::config::Config;
use crate::error::{FineError, Result};
use crate::storage::Storage;
use crate::writer::{Writer, WriterHandle, WriterStats};

use super::worker;

/// Everything a worker needs, shared by the whole pool
pub struct ServerContext {
    pub config: Config,
    pub storage: Storage,
    pub writer: WriterHandle,
}

/// Stops a running server from another thread
#[derive(Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        // Unblock the accept call
        let _ = TcpStream::connect(self.wake_addr);
    }

    pub fn is_shutdown(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// TCP server for FineDB
pub struct Server {
    config: Config,
    listener: TcpListener,
    storage: Storage,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Open the storage environment and bind the listening socket
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = Storage::open(&config)?;
        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;

        let shutdown = ShutdownHandle {
            stop: Arc::new(AtomicBool::new(false)),
            wake_addr: wake_addr(local_addr),
        };

        Ok(Self {
            config,
            listener,
            storage,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Start the server (blocking until shut down)
    ///
    /// On shutdown, workers finish their current connection, the writer
    /// thread drains its queue and the environment is closed. Returns the
    /// writer thread's totals.
    pub fn run(self) -> Result<WriterStats> {
        let Server {
            config,
            listener,
            storage,
            shutdown,
        } = self;

        let (writer, writer_thread) = Writer::spawn(storage.clone())?;
        let context = Arc::new(ServerContext {
            config,
            storage,
            writer,
        });

        let (admission, queue) = channel::unbounded::<TcpStream>();
        let workers = worker::spawn_workers(&context, &queue)?;
        drop(queue);

        tracing::info!(
            "Listening on {} with {} workers",
            listener.local_addr()?,
            workers.len()
        );

        for stream in listener.incoming() {
            if shutdown.is_shutdown() {
                break;
            }
            match stream {
                Ok(stream) => {
                    tracing::trace!("Accepted connection from {:?}", stream.peer_addr());
                    if admission.send(stream).is_err() {
                        tracing::error!("No worker left to serve connections");
                        break;
                    }
                }
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        tracing::info!("Shutting down");
        drop(admission);
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("A connection worker panicked");
            }
        }

        let ServerContext {
            storage, writer, ..
        } = Arc::try_unwrap(context)
            .map_err(|_| FineError::Storage("server context still in use".to_string()))?;
        drop(writer);

        let stats = writer_thread
            .join()
            .map_err(|_| FineError::WriterUnavailable)?;
        storage.close();

        Ok(stats)
    }
}

/// Address to connect to in order to wake a listener bound to `addr`
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
