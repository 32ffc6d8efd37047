//! Physical serial connection.
//!
//! A [`SerialLink`] owns the open port: a blocking reader thread splits the
//! byte stream into newline-framed telegrams and pushes them onto a tokio
//! channel consumed by the single processing loop. Outbound writes go through
//! the cloneable [`LinkHandle`], whose async mutex guarantees that one
//! command's write burst is never interleaved with another's.

use spraygate_types::GatewayError;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Read timeout for the blocking reader thread. Short enough that shutdown
/// is noticed promptly.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Events produced by the reader thread.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// One complete inbound line, trimmed of the frame terminator.
    Line(String),
    /// The link died (read error or port disappearance).
    Closed { reason: String },
}

/// Cloneable writer handle. The port slot is empty while the link is down;
/// writes in that window fail with [`GatewayError::Link`].
#[derive(Clone, Default)]
pub struct LinkHandle {
    port: Arc<Mutex<Option<Box<dyn serialport::SerialPort>>>>,
}

impl LinkHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line (newline appended) to the controller.
    pub async fn write_line(&self, line: &str) -> Result<(), GatewayError> {
        let mut guard = self.port.lock().await;
        Self::write_to(&mut guard, line)
    }

    /// Write a sequence of lines as one uninterruptible burst: the port lock
    /// is held until every line has been written, so a multi-line
    /// configuration push can never interleave with another command.
    pub async fn write_lines<I, S>(&self, lines: I) -> Result<(), GatewayError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = self.port.lock().await;
        for line in lines {
            Self::write_to(&mut guard, line.as_ref())?;
        }
        Ok(())
    }

    /// True when a port is currently attached.
    pub async fn is_attached(&self) -> bool {
        self.port.lock().await.is_some()
    }

    async fn attach(&self, port: Box<dyn serialport::SerialPort>) {
        *self.port.lock().await = Some(port);
    }

    /// Drop the attached port (link loss). Subsequent writes fail fast.
    pub async fn detach(&self) {
        *self.port.lock().await = None;
    }

    fn write_to(
        guard: &mut Option<Box<dyn serialport::SerialPort>>,
        line: &str,
    ) -> Result<(), GatewayError> {
        let port = guard
            .as_mut()
            .ok_or_else(|| GatewayError::Link("serial link is down".to_string()))?;
        debug!(%line, "tx");
        port.write_all(line.as_bytes())
            .and_then(|_| port.write_all(b"\n"))
            .and_then(|_| port.flush())
            .map_err(|e| GatewayError::Link(format!("serial write failed: {e}")))
    }
}

/// An open serial connection plus its reader thread.
pub struct SerialLink {
    path: String,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Open `path` at `baud`, attach the writer side to `handle`, and spawn
    /// the reader thread feeding `events`.
    pub async fn open(
        path: &str,
        baud: u32,
        handle: &LinkHandle,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Self, GatewayError> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|e| GatewayError::Link(format!("failed to open {path}: {e}")))?;

        let reader_port = port
            .try_clone()
            .map_err(|e| GatewayError::Link(format!("failed to clone {path}: {e}")))?;

        handle.attach(port).await;

        let shutdown = Arc::new(AtomicBool::new(false));
        let reader = std::thread::spawn({
            let shutdown = Arc::clone(&shutdown);
            let path = path.to_string();
            move || read_loop(reader_port, events, shutdown, path)
        });

        info!(path, baud, "serial link open");
        Ok(Self {
            path: path.to_string(),
            shutdown,
            reader: Some(reader),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stop the reader thread and wait for it to exit.
    pub fn close(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Blocking reader loop: accumulate bytes, emit one [`LinkEvent::Line`] per
/// newline. Read timeouts are normal; any other error ends the loop with a
/// [`LinkEvent::Closed`].
fn read_loop(
    mut port: Box<dyn serialport::SerialPort>,
    events: mpsc::UnboundedSender<LinkEvent>,
    shutdown: Arc<AtomicBool>,
    path: String,
) {
    let mut buffer: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 256];

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!(path, "reader thread shutting down");
            return;
        }
        match port.read(&mut chunk) {
            Ok(0) => {}
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                drain_lines(&mut buffer, &events);
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(path, error = %e, "serial read failed");
                let _ = events.send(LinkEvent::Closed {
                    reason: format!("serial read failed: {e}"),
                });
                return;
            }
        }
    }
}

/// Emit every complete line currently in `buffer`, leaving any trailing
/// partial line in place. Carriage returns are stripped with the frame.
fn drain_lines(buffer: &mut Vec<u8>, events: &mpsc::UnboundedSender<LinkEvent>) {
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let frame: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&frame)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        if !line.is_empty() {
            let _ = events.send(LinkEvent::Line(line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_lines(rx: &mut mpsc::UnboundedReceiver<LinkEvent>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LinkEvent::Line(line) = event {
                lines.push(line);
            }
        }
        lines
    }

    #[test]
    fn drain_lines_splits_complete_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut buffer = b"Temperature:20.0\nPosition:1,2\nPartial".to_vec();
        drain_lines(&mut buffer, &tx);
        assert_eq!(collect_lines(&mut rx), vec!["Temperature:20.0", "Position:1,2"]);
        assert_eq!(buffer, b"Partial");
    }

    #[test]
    fn drain_lines_strips_carriage_returns() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut buffer = b"State changed: HOMED\r\n".to_vec();
        drain_lines(&mut buffer, &tx);
        assert_eq!(collect_lines(&mut rx), vec!["State changed: HOMED"]);
    }

    #[test]
    fn drain_lines_skips_blank_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut buffer = b"\n\r\nSTART\n".to_vec();
        drain_lines(&mut buffer, &tx);
        assert_eq!(collect_lines(&mut rx), vec!["START"]);
    }

    #[test]
    fn drain_lines_reassembles_split_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut buffer = b"Posi".to_vec();
        drain_lines(&mut buffer, &tx);
        assert!(collect_lines(&mut rx).is_empty());

        buffer.extend_from_slice(b"tion:3.5,4.5\n");
        drain_lines(&mut buffer, &tx);
        assert_eq!(collect_lines(&mut rx), vec!["Position:3.5,4.5"]);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn detached_handle_rejects_writes() {
        let handle = LinkHandle::new();
        assert!(!handle.is_attached().await);
        let err = handle.write_line("START").await.unwrap_err();
        assert!(matches!(err, GatewayError::Link(_)));
    }

    #[tokio::test]
    async fn detached_handle_rejects_bursts() {
        let handle = LinkHandle::new();
        let err = handle
            .write_lines(["SET_GRID 9 6", "SET_ENABLED_SIDES FRONT=1"])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Link(_)));
    }
}
