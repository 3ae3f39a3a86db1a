use crate::terminal::Console;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const FRAMES: [char; 8] = ['⣾', '⣽', '⣻', '⢿', '⡿', '⣟', '⣯', '⣷'];
const HOT_PINK: &str = "\x1b[38;5;205m";
const RESET: &str = "\x1b[0m";
const CLEAR_LINE: &str = "\r \r";

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal activity indicator with idempotent start/stop.
///
/// At most one animation task runs per spinner. `stop` waits for the task to
/// clear its glyph, so output written after `stop` returns is never interleaved
/// with a redraw.
#[derive(Clone)]
pub struct Spinner {
    inner: Option<Arc<SpinnerInner>>,
}

struct SpinnerInner {
    console: Console,
    interval: Duration,
    task: Mutex<Option<SpinTask>>,
}

struct SpinTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Spinner {
    pub fn new(console: Console) -> Self {
        Self::with_interval(console, DEFAULT_INTERVAL)
    }

    pub fn with_interval(console: Console, interval: Duration) -> Self {
        Self {
            inner: Some(Arc::new(SpinnerInner {
                console,
                interval,
                task: Mutex::new(None),
            })),
        }
    }

    /// A spinner whose start/stop do nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub async fn start(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        let mut task = inner.task.lock().await;
        if task.is_some() {
            return;
        }

        // A cancelled token cannot be reused, so every spin gets its own.
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(spin(
            inner.console.clone(),
            inner.interval,
            cancel.clone(),
        ));
        *task = Some(SpinTask { cancel, handle });
    }

    pub async fn stop(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        let mut task = inner.task.lock().await;
        if let Some(SpinTask { cancel, handle }) = task.take() {
            cancel.cancel();
            if let Err(error) = handle.await {
                tracing::debug!(%error, "spinner task ended abnormally");
            }
        }
    }

    pub async fn is_spinning(&self) -> bool {
        match &self.inner {
            Some(inner) => inner.task.lock().await.is_some(),
            None => false,
        }
    }
}

async fn spin(console: Console, interval: Duration, cancel: CancellationToken) {
    let mut frame = 0;
    loop {
        console.write_str(&format!("\r{HOT_PINK}{}{RESET}", FRAMES[frame]));
        frame = (frame + 1) % FRAMES.len();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    console.write_str(CLEAR_LINE);
}
