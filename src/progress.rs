//! Progress reporting during construction.
//!
//! Loaders report human-readable status text (for a splash screen, a log, a
//! status bar) through a [`Progress`] observer. Reports are informational
//! only: they return nothing and cannot fail.

/// Receiver of progress messages.
pub trait Progress: Send + Sync {
    /// Report a status message.
    fn report(&self, text: &str);
}

impl<F> Progress for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, text: &str) {
        self(text)
    }
}

/// No-op progress reporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn report(&self, _text: &str) {}
}

/// Forwards progress messages to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn report(&self, text: &str) {
        log::info!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_closure_progress() {
        let seen = Mutex::new(Vec::new());
        let progress = |text: &str| seen.lock().push(text.to_string());
        progress.report("one");
        progress.report("two");
        assert_eq!(*seen.lock(), vec!["one", "two"]);
    }

    #[test]
    fn test_silent_progress() {
        let progress: &dyn Progress = &SilentProgress;
        progress.report("ignored");
    }

    #[test]
    fn test_log_progress() {
        // No logger is installed, so this only has to not panic.
        let progress: Arc<dyn Progress> = Arc::new(LogProgress);
        progress.report("Loading components...");
        progress.report("");
    }
}
