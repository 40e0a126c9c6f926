//! Spoken output of replay results.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while announcing text.
#[derive(Error, Debug)]
pub enum AnnounceError {
    #[error("Speech output is not ready")]
    NotReady,

    #[error("Announcement failed: {0}")]
    Failed(String),
}

pub type AnnounceResult<T> = Result<T, AnnounceError>;

/// Queues text for speech. `announce` appends and returns without waiting
/// for the text to be spoken.
pub trait Announcer: Send + Sync {
    fn is_ready(&self) -> bool;

    fn announce(&self, text: &str) -> AnnounceResult<()>;
}

impl<T: Announcer + ?Sized> Announcer for Arc<T> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn announce(&self, text: &str) -> AnnounceResult<()> {
        (**self).announce(text)
    }
}

/// Mock announcer for tests and dry runs.
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Collects announced text.
    #[derive(Debug)]
    pub struct MockAnnouncer {
        ready: AtomicBool,
        spoken: Mutex<Vec<String>>,
    }

    impl MockAnnouncer {
        pub fn new() -> Self {
            Self {
                ready: AtomicBool::new(true),
                spoken: Mutex::new(Vec::new()),
            }
        }

        /// An announcer whose speech engine never initialized.
        pub fn not_ready() -> Self {
            let announcer = Self::new();
            announcer.set_ready(false);
            announcer
        }

        pub fn set_ready(&self, ready: bool) {
            self.ready.store(ready, Ordering::SeqCst);
        }

        pub fn spoken(&self) -> Vec<String> {
            self.spoken.lock().clone()
        }
    }

    impl Default for MockAnnouncer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Announcer for MockAnnouncer {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn announce(&self, text: &str) -> AnnounceResult<()> {
            if !self.is_ready() {
                return Err(AnnounceError::NotReady);
            }
            self.spoken.lock().push(text.to_string());
            Ok(())
        }
    }
}
