//! Interaction notifications delivered by the platform.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::tree::{NodeHandle, NodeId};

/// Kind of interaction notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Clicked,
    LongClicked,
    Selected,
    Focused,
    TextChanged,
    Scrolled,
    WindowStateChanged,
    HoverEnter,
    HoverExit,
    Other,
}

impl EventKind {
    /// Notifications that may mean a different window is now in front.
    pub fn changes_active_window(&self) -> bool {
        matches!(self, Self::WindowStateChanged | Self::HoverEnter | Self::HoverExit)
    }

    /// Notifications produced when list navigation moves the selection.
    pub fn is_selection_update(&self) -> bool {
        matches!(self, Self::Selected | Self::Scrolled)
    }
}

/// Snapshot of an ancestor attached to a notification, typically the
/// container of the element that fired it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorRecord {
    pub class_name: String,
    #[serde(default)]
    pub text: Vec<String>,
}

impl AncestorRecord {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            text: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text.push(text.into());
        self
    }

    /// First text entry, if it is non-empty.
    pub fn primary_text(&self) -> Option<&str> {
        primary(&self.text)
    }
}

fn primary(text: &[String]) -> Option<&str> {
    text.first().map(String::as_str).filter(|t| !t.is_empty())
}

/// One interaction notification.
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    pub kind: EventKind,
    pub text: Vec<String>,
    pub content_label: Option<String>,
    /// Element that fired the notification.
    pub source: Option<NodeHandle>,
    /// Monotonic time of the notification, in milliseconds.
    pub event_time: i64,
    pub records: Vec<AncestorRecord>,
}

impl CaptureEvent {
    pub fn new(kind: EventKind, event_time: i64) -> Self {
        Self {
            kind,
            text: Vec::new(),
            content_label: None,
            source: None,
            event_time,
            records: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text.push(text.into());
        self
    }

    pub fn with_content_label(mut self, label: impl Into<String>) -> Self {
        self.content_label = Some(label.into());
        self
    }

    pub fn with_source(mut self, source: NodeHandle) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_record(mut self, record: AncestorRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Notification describing `node`: its text and content label are
    /// copied onto the event and it becomes the source.
    pub fn from_node(kind: EventKind, event_time: i64, node: NodeHandle) -> Self {
        let mut event = Self::new(kind, event_time);
        event.text = node.text().map(|t| vec![t.to_string()]).unwrap_or_default();
        event.content_label = node.content_label().map(str::to_string);
        event.source = Some(node);
        event
    }

    pub fn primary_text(&self) -> Option<&str> {
        primary(&self.text)
    }

    /// Window the source element belongs to.
    pub fn window_id(&self) -> Option<i64> {
        self.source.as_ref().map(|s| s.window_id())
    }

    /// Root of the source element's window, found by walking up the
    /// parent chain.
    pub fn window_root(&self) -> Option<NodeHandle> {
        let mut current = Arc::clone(self.source.as_ref()?);
        while let Some(parent) = current.parent() {
            current = parent;
        }
        Some(current)
    }
}

/// The part of a selection notification the replay engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub kind: EventKind,
    pub source_id: Option<NodeId>,
    pub text: Vec<String>,
    pub content_label: Option<String>,
    pub event_time: i64,
}

impl SelectionEvent {
    pub fn from_capture(event: &CaptureEvent) -> Self {
        Self {
            kind: event.kind,
            source_id: event.source.as_ref().map(|s| s.node_id()),
            text: event.text.clone(),
            content_label: event.content_label.clone(),
            event_time: event.event_time,
        }
    }

    pub fn primary_text(&self) -> Option<&str> {
        primary(&self.text)
    }

    pub fn content_label(&self) -> Option<&str> {
        self.content_label.as_deref().filter(|l| !l.is_empty())
    }

    /// Whether both notifications describe the same element. Falls back to
    /// comparing readable content when either side has no source.
    pub fn same_item(&self, other: &SelectionEvent) -> bool {
        match (self.source_id, other.source_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.primary_text() == other.primary_text() && self.content_label() == other.content_label(),
        }
    }

    /// Whether the selected item shows exactly the recorded text and label.
    ///
    /// Presence has to agree on both sides: a recorded label never matches
    /// an unlabeled item and vice versa.
    pub fn matches_labels(&self, text: Option<&str>, content_label: Option<&str>) -> bool {
        let text = text.filter(|t| !t.is_empty());
        let content_label = content_label.filter(|l| !l.is_empty());

        if self.primary_text().is_some() != text.is_some() {
            return false;
        }
        if self.content_label().is_some() != content_label.is_some() {
            return false;
        }
        text.map_or(true, |t| self.primary_text() == Some(t))
            && content_label.map_or(true, |l| self.content_label() == Some(l))
    }
}
