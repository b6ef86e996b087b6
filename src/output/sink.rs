// Tue Jan 13 2026 - Alex

use crate::output::{frame, OutboundMessage};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Header encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Frame section of {0} bytes exceeds the 4 GiB limit")]
    FrameTooLarge(usize),
    #[error("Could not open sink {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// Receives outbound messages. Sending never fails from the caller's point
/// of view; sinks log their own transport errors.
pub trait MessageSink: Send + Sync {
    fn send(&self, message: OutboundMessage);
}

/// Writes framed messages to a file or socket.
///
/// Targets: `unix:<path>` connects to a Unix socket, `tcp:<host:port>` to a
/// TCP listener, anything else is a file path (truncated on open).
pub struct StreamSink {
    target: String,
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    broken: AtomicBool,
}

impl StreamSink {
    pub fn open(target: &str) -> Result<Self, SinkError> {
        let open_err = |source| SinkError::Open {
            target: target.to_string(),
            source,
        };

        let writer: Box<dyn Write + Send> = if let Some(path) = target.strip_prefix("unix:") {
            Box::new(UnixStream::connect(path).map_err(open_err)?)
        } else if let Some(addr) = target.strip_prefix("tcp:") {
            let stream = TcpStream::connect(addr).map_err(open_err)?;
            stream.set_nodelay(true).map_err(open_err)?;
            Box::new(stream)
        } else {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(target)
                .map_err(open_err)?;
            Box::new(file)
        };

        log::info!("streaming dumps to {}", target);
        Ok(Self::from_writer(target, writer))
    }

    pub fn from_writer(target: &str, writer: Box<dyn Write + Send>) -> Self {
        Self {
            target: target.to_string(),
            writer: Mutex::new(BufWriter::new(writer)),
            broken: AtomicBool::new(false),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn write(&self, message: &OutboundMessage) -> Result<(), SinkError> {
        let frame = frame::encode(message)?;
        let mut writer = self.writer.lock();
        writer.write_all(&frame)?;
        if message.is_terminal() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl MessageSink for StreamSink {
    fn send(&self, message: OutboundMessage) {
        // A failed write may have left half a frame behind; nothing after it
        // could be decoded.
        if self.broken.load(Ordering::Relaxed) {
            return;
        }
        if let Err(err) = self.write(&message) {
            if !self.broken.swap(true, Ordering::Relaxed) {
                log::error!("writing to {} failed, dropping further output: {}", self.target, err);
            }
        }
    }
}

impl Drop for StreamSink {
    fn drop(&mut self) {
        if !self.broken.load(Ordering::Relaxed) {
            let _ = self.writer.lock().flush();
        }
    }
}
