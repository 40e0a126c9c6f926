//! Shared state between the notification path and the replay worker.
//!
//! Two slots, each behind its own lock:
//!
//! - the foreground root, replaced whenever a window-change notification
//!   comes from a different window
//! - the latest selection notification, handed to the replay worker with a
//!   clear-then-wait protocol
//!
//! Writers never block beyond the lock hold. Only the newest value is kept.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::event::SelectionEvent;
use crate::tree::NodeHandle;

#[derive(Debug, Default)]
struct RootSlot {
    node: Option<NodeHandle>,
    window_id: Option<i64>,
}

#[derive(Debug, Default)]
struct SelectionSlot {
    latest: Option<SelectionEvent>,
    /// Bumped on every publish.
    generation: u64,
}

/// Marks the point a reader cleared the selection channel. Only values
/// published after it satisfy a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct SelectionTicket(u64);

/// Foreground root and selection channel shared across threads.
#[derive(Debug, Default)]
pub struct StateBridge {
    root: Mutex<RootSlot>,
    selection: Mutex<SelectionSlot>,
    selection_changed: Condvar,
}

impl StateBridge {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Root reference
    // ------------------------------------------------------------------

    /// Adopt `root` as the foreground root if none is cached or it belongs
    /// to a different window. Returns whether the cached root changed; the
    /// previous handle is released.
    pub fn update_root(&self, root: NodeHandle) -> bool {
        let window_id = root.window_id();
        let mut slot = self.root.lock();
        if slot.node.is_some() && slot.window_id == Some(window_id) {
            trace!("Window {} already current", window_id);
            return false;
        }
        debug!("Active window changed to {}", window_id);
        slot.node = Some(root);
        slot.window_id = Some(window_id);
        true
    }

    /// Current foreground root, if one was ever seen.
    pub fn root(&self) -> Option<NodeHandle> {
        self.root.lock().node.clone()
    }

    pub fn clear_root(&self) {
        let mut slot = self.root.lock();
        slot.node = None;
        slot.window_id = None;
    }

    // ------------------------------------------------------------------
    // Selection channel
    // ------------------------------------------------------------------

    /// Replace the latest selection and wake any waiter.
    pub fn publish_selection(&self, event: SelectionEvent) {
        let mut slot = self.selection.lock();
        slot.latest = Some(event);
        slot.generation = slot.generation.wrapping_add(1);
        trace!("Selection published (generation {})", slot.generation);
        self.selection_changed.notify_all();
    }

    /// Discard the current selection and return a ticket for the next one.
    /// Call this before the navigation step whose result you want.
    pub fn clear_selection(&self) -> SelectionTicket {
        let mut slot = self.selection.lock();
        slot.latest = None;
        SelectionTicket(slot.generation)
    }

    /// Block until a selection is published after `ticket` was taken, then
    /// hold for `settle` and return the newest value.
    ///
    /// Returns `None` if nothing arrives within `timeout`.
    pub fn wait_for_selection(
        &self,
        ticket: SelectionTicket,
        timeout: Duration,
        settle: Duration,
    ) -> Option<SelectionEvent> {
        let deadline = Instant::now() + timeout;
        {
            let mut slot = self.selection.lock();
            while slot.generation == ticket.0 {
                if self
                    .selection_changed
                    .wait_until(&mut slot, deadline)
                    .timed_out()
                    && slot.generation == ticket.0
                {
                    debug!("Timed out waiting for a selection after {:?}", timeout);
                    return None;
                }
            }
        }

        if !settle.is_zero() {
            std::thread::sleep(settle);
        }
        self.selection.lock().latest.clone()
    }

    /// Latest selection without waiting.
    pub fn latest_selection(&self) -> Option<SelectionEvent> {
        self.selection.lock().latest.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::geometry::Rect;
    use crate::snapshot::{SnapshotSpec, SnapshotTree};
    use std::sync::Arc;

    fn selection(id: u64, text: &str) -> SelectionEvent {
        SelectionEvent {
            kind: EventKind::Selected,
            source_id: Some(id),
            text: vec![text.to_string()],
            content_label: None,
            event_time: 0,
        }
    }

    fn window(window_id: i64, app: &str) -> SnapshotTree {
        SnapshotTree::build(window_id, app, SnapshotSpec::new("Frame", Rect::new(0, 0, 10, 10)))
    }

    #[test]
    fn test_root_replaced_only_on_window_change() {
        let bridge = StateBridge::new();
        assert!(bridge.root().is_none());

        let first = window(1, "first");
        let same_window = window(1, "second");
        let other = window(2, "other");

        assert!(bridge.update_root(first.root()));
        assert!(!bridge.update_root(same_window.root()));
        assert_eq!(bridge.root().unwrap().app_identifier(), Some("first"));

        assert!(bridge.update_root(other.root()));
        assert_eq!(bridge.root().unwrap().window_id(), 2);

        bridge.clear_root();
        assert!(bridge.root().is_none());
        assert!(bridge.update_root(same_window.root()));
    }

    #[test]
    fn test_wait_ignores_value_from_before_clear() {
        let bridge = StateBridge::new();
        bridge.publish_selection(selection(1, "stale"));

        let ticket = bridge.clear_selection();
        assert!(bridge.latest_selection().is_none());
        let waited = bridge.wait_for_selection(ticket, Duration::from_millis(50), Duration::ZERO);
        assert!(waited.is_none());
    }

    #[test]
    fn test_wait_returns_value_published_after_clear() {
        let bridge = Arc::new(StateBridge::new());
        bridge.publish_selection(selection(1, "stale"));
        let ticket = bridge.clear_selection();

        let writer = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                bridge.publish_selection(selection(2, "fresh"));
            })
        };

        let waited = bridge
            .wait_for_selection(ticket, Duration::from_secs(5), Duration::ZERO)
            .unwrap();
        assert_eq!(waited.primary_text(), Some("fresh"));
        writer.join().unwrap();
    }

    #[test]
    fn test_settle_picks_up_trailing_value() {
        let bridge = Arc::new(StateBridge::new());
        let ticket = bridge.clear_selection();
        bridge.publish_selection(selection(1, "first"));

        let writer = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                bridge.publish_selection(selection(2, "trailing"));
            })
        };

        let waited = bridge
            .wait_for_selection(ticket, Duration::from_secs(5), Duration::from_millis(200))
            .unwrap();
        assert_eq!(waited.source_id, Some(2));
        writer.join().unwrap();
    }
}
