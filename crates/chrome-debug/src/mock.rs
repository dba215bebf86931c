//! In-memory transport for exercising the dispatch engine without a browser.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::time::Duration;

use serde_json::Value;

use crate::transport::FrameReader;
use crate::transport::FrameWriter;
use crate::transport::TransportError;

const SENT_TIMEOUT: Duration = Duration::from_secs(1);

/// A mock transport whose remote side is driven by the test.
///
/// # Example
///
/// ```
/// use chrome_debug::{ClientConfig, Command, MockTransport, SyncDebugger};
/// use serde_json::json;
///
/// let (reader, writer, remote) = MockTransport::pair();
/// let debugger = SyncDebugger::over(reader, writer, ClientConfig::default()).unwrap();
///
/// let handle = std::thread::spawn(move || {
///     let frame = remote.sent().unwrap();
///     assert!(frame.contains("\"id\":1"));
///     remote.push_json(json!({"id": 1, "result": {}}));
/// });
///
/// let result = debugger.send(Command::new("Page.enable")).unwrap();
/// assert_eq!(result.id, 1);
/// handle.join().unwrap();
/// ```
pub struct MockTransport;

impl MockTransport {
    /// Returns connected reader/writer halves plus the remote-side handle.
    pub fn pair() -> (MockReader, MockWriter, MockRemote) {
        let (inbound_tx, inbound_rx) = mpsc::channel();
        let (outbound_tx, outbound_rx) = mpsc::channel();
        let fail_writes = Arc::new(AtomicBool::new(false));

        (
            MockReader { frames: inbound_rx },
            MockWriter {
                frames: outbound_tx,
                fail_writes: Arc::clone(&fail_writes),
            },
            MockRemote {
                inbound: Mutex::new(Some(inbound_tx)),
                outbound: outbound_rx,
                fail_writes,
            },
        )
    }
}

pub struct MockReader {
    frames: Receiver<Vec<u8>>,
}

impl FrameReader for MockReader {
    fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        self.frames.recv().map_err(|_| TransportError::Closed)
    }
}

pub struct MockWriter {
    frames: Sender<String>,
    fail_writes: Arc<AtomicBool>,
}

impl FrameWriter for MockWriter {
    fn write_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated write failure",
            )));
        }
        self.frames
            .send(frame.to_owned())
            .map_err(|_| TransportError::Closed)
    }
}

/// The remote side of a mock connection: observes what the client sent and
/// pushes inbound frames back.
pub struct MockRemote {
    inbound: Mutex<Option<Sender<Vec<u8>>>>,
    outbound: Receiver<String>,
    fail_writes: Arc<AtomicBool>,
}

impl MockRemote {
    /// Pushes one raw inbound frame to the client.
    pub fn push(&self, frame: &str) {
        let guard = self.inbound.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = guard.as_ref() {
            let _ = sender.send(frame.as_bytes().to_vec());
        }
    }

    /// Pushes one inbound frame built from a JSON value.
    pub fn push_json(&self, frame: Value) {
        self.push(&frame.to_string());
    }

    /// Returns the next frame the client wrote, or `None` after a short wait.
    pub fn sent(&self) -> Option<String> {
        self.outbound.recv_timeout(SENT_TIMEOUT).ok()
    }

    /// Makes every subsequent client write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Closes the inbound side; the client's dispatch loop sees end of stream.
    pub fn close(&self) {
        let mut guard = self.inbound.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}
