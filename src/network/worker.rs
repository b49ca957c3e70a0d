//! Connection workers
//!
//! A fixed pool of threads competing for accepted sockets on the admission
//! queue. Each worker serves one connection at a time, from accept to close.

use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;

use crate::error::Result;
use crate::writer::WriterHandle;

use super::connection::Connection;
use super::server::ServerContext;

/// Start `context.config.workers` workers on the admission queue
pub(crate) fn spawn_workers(
    context: &Arc<ServerContext>,
    admission: &Receiver<TcpStream>,
) -> Result<Vec<JoinHandle<()>>> {
    (0..context.config.workers)
        .map(|id| {
            let context = Arc::clone(context);
            let admission = admission.clone();
            let thread = thread::Builder::new()
                .name(format!("finedb-worker-{}", id))
                .spawn(move || worker_loop(id, context, admission))?;
            Ok(thread)
        })
        .collect()
}

fn worker_loop(id: usize, context: Arc<ServerContext>, admission: Receiver<TcpStream>) {
    let writer = context.writer.clone();
    tracing::trace!("Worker {} waiting for connections", id);

    while let Ok(stream) = admission.recv() {
        serve(&context, &writer, stream);
    }

    tracing::trace!("Worker {} stopped", id);
}

fn serve(context: &ServerContext, writer: &WriterHandle, stream: TcpStream) {
    let config = &context.config;
    if let Err(e) = stream
        .set_read_timeout(Some(config.read_timeout()))
        .and_then(|()| stream.set_write_timeout(Some(config.write_timeout())))
    {
        tracing::warn!("Unable to configure connection timeouts: {}", e);
        return;
    }

    let mut connection = match Connection::from_stream(stream, &context.storage, writer.clone()) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Unable to set up connection: {}", e);
            return;
        }
    };

    if let Err(e) = connection.handle() {
        tracing::warn!("Closing connection from {}: {}", connection.peer_addr(), e);
    }
    connection.close();
}
