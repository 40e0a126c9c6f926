//! Synthesized input delivered to the foreground interface.
//!
//! The replay worker calls the injector synchronously from its own thread.
//! Platform backends implement [`InputInjector`]; tests and dry runs use
//! [`mock::MockInjector`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock;

/// Errors that can occur while injecting input.
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("Input injection unavailable: {0}")]
    Unavailable(String),

    #[error("Injection failed: {0}")]
    Failed(String),
}

pub type InjectResult<T> = Result<T, InjectError>;

/// A press immediately followed by a release at one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapGesture {
    pub x: f32,
    pub y: f32,
    /// Logical time the gesture started, i.e. when it was recorded.
    pub down_time_ms: i64,
    /// Physical delivery time.
    pub event_time_ms: i64,
}

impl TapGesture {
    /// Tap stamped with `down_time_ms` as its origin and now as delivery.
    pub fn new(x: f32, y: f32, down_time_ms: i64) -> Self {
        Self {
            x,
            y,
            down_time_ms,
            event_time_ms: clock::uptime_millis(),
        }
    }
}

/// Directional navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationKey {
    Up,
    Down,
    /// Activates the focused element.
    Center,
}

impl fmt::Display for NavigationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Center => write!(f, "center"),
        }
    }
}

/// Delivers synthesized gestures and key presses.
pub trait InputInjector: Send + Sync {
    fn inject_tap(&self, tap: &TapGesture) -> InjectResult<()>;

    /// Press and release `key`.
    fn inject_key(&self, key: NavigationKey) -> InjectResult<()>;
}

impl<T: InputInjector + ?Sized> InputInjector for Arc<T> {
    fn inject_tap(&self, tap: &TapGesture) -> InjectResult<()> {
        (**self).inject_tap(tap)
    }

    fn inject_key(&self, key: NavigationKey) -> InjectResult<()> {
        (**self).inject_key(key)
    }
}

// ============================================================================
// Mock Implementation
// ============================================================================

/// Mock injector for tests and dry runs.
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// One delivered input.
    #[derive(Debug, Clone, PartialEq)]
    pub enum InjectedInput {
        Tap(TapGesture),
        Key(NavigationKey),
    }

    type KeyHandler = Box<dyn Fn(NavigationKey) + Send + Sync>;

    /// Records every input instead of delivering it.
    pub struct MockInjector {
        inputs: Mutex<VecDeque<InjectedInput>>,
        max_log_size: usize,
        on_key: Option<KeyHandler>,
        unavailable: bool,
    }

    impl MockInjector {
        pub fn new() -> Self {
            Self {
                inputs: Mutex::new(VecDeque::new()),
                max_log_size: 1000,
                on_key: None,
                unavailable: false,
            }
        }

        /// Run `handler` after each key press is logged, e.g. to simulate
        /// the selection notifications a real list would emit.
        pub fn with_key_handler<F>(mut self, handler: F) -> Self
        where
            F: Fn(NavigationKey) + Send + Sync + 'static,
        {
            self.on_key = Some(Box::new(handler));
            self
        }

        /// Make every injection fail.
        pub fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::new()
            }
        }

        pub fn inputs(&self) -> Vec<InjectedInput> {
            self.inputs.lock().iter().cloned().collect()
        }

        pub fn taps(&self) -> Vec<TapGesture> {
            self.inputs
                .lock()
                .iter()
                .filter_map(|input| match input {
                    InjectedInput::Tap(tap) => Some(*tap),
                    InjectedInput::Key(_) => None,
                })
                .collect()
        }

        pub fn keys(&self) -> Vec<NavigationKey> {
            self.inputs
                .lock()
                .iter()
                .filter_map(|input| match input {
                    InjectedInput::Key(key) => Some(*key),
                    InjectedInput::Tap(_) => None,
                })
                .collect()
        }

        pub fn clear_log(&self) {
            self.inputs.lock().clear();
        }

        fn log(&self, input: InjectedInput) -> InjectResult<()> {
            if self.unavailable {
                return Err(InjectError::Unavailable("mock injector disabled".to_string()));
            }
            let mut inputs = self.inputs.lock();
            if inputs.len() >= self.max_log_size {
                inputs.pop_front();
            }
            inputs.push_back(input);
            Ok(())
        }
    }

    impl Default for MockInjector {
        fn default() -> Self {
            Self::new()
        }
    }

    impl InputInjector for MockInjector {
        fn inject_tap(&self, tap: &TapGesture) -> InjectResult<()> {
            self.log(InjectedInput::Tap(*tap))
        }

        fn inject_key(&self, key: NavigationKey) -> InjectResult<()> {
            self.log(InjectedInput::Key(key))?;
            if let Some(handler) = &self.on_key {
                handler(key);
            }
            Ok(())
        }
    }
}
