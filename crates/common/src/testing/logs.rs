//! Log capture for assertions on emitted tracing events
//!
//! [`CapturedLogs::capture`] installs a thread-local `fmt` subscriber that
//! writes plain text into memory. It stays active until the value is
//! dropped, so hold it for the whole test body. Events emitted on other
//! threads are not captured; use a current-thread runtime for async tests.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// In-memory log sink scoped to the current thread
pub struct CapturedLogs {
    buffer: SharedBuffer,
    _guard: DefaultGuard,
}

impl CapturedLogs {
    /// Start capturing every event at `TRACE` level and above
    #[must_use]
    pub fn capture() -> Self {
        let buffer = SharedBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .with_max_level(Level::TRACE)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);

        Self { buffer, _guard: guard }
    }

    /// Everything written so far
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.0.lock()).into_owned()
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }

    /// Lines emitted at exactly `level`
    #[must_use]
    pub fn lines_at(&self, level: Level) -> Vec<String> {
        let label = level.to_string();
        self.contents()
            .lines()
            .filter(|line| line.trim_start().starts_with(&label))
            .map(str::to_owned)
            .collect()
    }

    /// Number of lines emitted at exactly `level`
    #[must_use]
    pub fn count_at(&self, level: Level) -> usize {
        self.lines_at(level).len()
    }
}

impl std::fmt::Debug for CapturedLogs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedLogs").finish_non_exhaustive()
    }
}
