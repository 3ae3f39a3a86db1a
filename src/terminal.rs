use crossterm::tty::IsTty;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

type Sink = Box<dyn Write + Send>;

/// Shared, lock-guarded output sink.
///
/// The spinner task and the response streamer both write through the same
/// `Console`, so a redraw can never land inside a rendered block.
#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Sink>>,
    interactive: bool,
}

impl Console {
    pub fn stdout() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(io::stdout()))),
            interactive: io::stdout().is_tty(),
        }
    }

    /// In-memory console for tests; everything written is readable from the buffer.
    pub fn capture() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let console = Self {
            sink: Arc::new(Mutex::new(Box::new(buffer.clone()))),
            interactive: false,
        };
        (console, buffer)
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn write_str(&self, text: &str) {
        let mut sink = self.lock();
        if let Err(error) = sink.write_all(text.as_bytes()).and_then(|_| sink.flush()) {
            tracing::debug!(%error, "console write failed");
        }
    }

    pub fn line(&self, text: &str) {
        self.write_str(&format!("{text}\n"));
    }

    fn lock(&self) -> MutexGuard<'_, Sink> {
        self.sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
