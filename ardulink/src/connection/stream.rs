use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    runtime::Handle,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, warn};

use super::{Connection, Inbound};
use crate::error::ConnectionError;

const READ_BUFFER_SIZE: usize = 1024;

/// A [`Connection`] over any tokio byte stream (serial port, TCP socket,
/// in-memory duplex).
///
/// A reader task starts pulling bytes once the owning link attaches its
/// inbound sink; writes are queued to a writer task so they never block.
pub struct StreamConnection {
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    attach: Mutex<Option<oneshot::Sender<Inbound>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl StreamConnection {
    /// Spawns the I/O tasks on the current tokio runtime.
    pub fn spawn<R, W>(reader: R, writer: W) -> Result<Self, ConnectionError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|e| ConnectionError::NoRuntime(e.to_string()))?;
        Ok(Self::spawn_on(&handle, reader, writer))
    }

    pub fn spawn_on<R, W>(handle: &Handle, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (attach_tx, attach_rx) = oneshot::channel();

        let reader = handle.spawn(read_loop(reader, attach_rx));
        handle.spawn(write_loop(writer, outbound_rx));

        Self {
            outbound: Mutex::new(Some(outbound_tx)),
            attach: Mutex::new(Some(attach_tx)),
            reader: Mutex::new(Some(reader)),
            closed: AtomicBool::new(false),
        }
    }
}

async fn read_loop<R>(mut reader: R, attach: oneshot::Receiver<Inbound>)
where
    R: AsyncRead + Unpin,
{
    let Ok(inbound) = attach.await else {
        return;
    };

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("stream closed by peer");
                break;
            }
            Ok(n) => {
                if !inbound.deliver(&buffer[..n]) {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "reading from stream failed");
                break;
            }
        }
    }
}

async fn write_loop<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = outbound.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            warn!(error = %e, "writing to stream failed");
            return;
        }
        if let Err(e) = writer.flush().await {
            warn!(error = %e, "flushing stream failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

impl Connection for StreamConnection {
    fn write(&self, bytes: &[u8]) -> Result<(), ConnectionError> {
        let outbound = self.outbound.lock();
        let sender = outbound.as_ref().ok_or(ConnectionError::Closed)?;
        sender
            .send(bytes.to_vec())
            .map_err(|_| ConnectionError::Closed)
    }

    fn attach(&self, inbound: Inbound) {
        if let Some(attach) = self.attach.lock().take() {
            // The reader task is gone if this fails; nothing left to feed.
            let _ = attach.send(inbound);
        }
    }

    fn close(&self) -> Result<(), ConnectionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        // Dropping the sender lets the writer drain and shut the stream down.
        self.outbound.lock().take();
        self.attach.lock().take();
        Ok(())
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
