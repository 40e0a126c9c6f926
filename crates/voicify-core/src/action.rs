//! Recorded demonstration data model.
//!
//! A [`Demonstration`] is an ordered list of [`PlaybackAction`]s plus the
//! screen regions ([`OutputSelection`]s) read aloud once the actions have
//! been replayed. These are plain values; the catalog owns them and the
//! replay engine only ever borrows one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{Point, Rect};

// ============================================================================
// PlaybackAction
// ============================================================================

/// Kind of interaction a [`PlaybackAction`] reproduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A click / activation of an element.
    #[default]
    Activation,
}

impl ActionKind {
    /// Stable name used by the persisted schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activation => "activation",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "activation" => Some(Self::Activation),
            _ => None,
        }
    }
}

/// Widget context detected at record time that changes how the action is
/// located during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialCase {
    #[default]
    Normal,
    /// The element sits next to a toggle switch. The recorded text is the
    /// switch row's label, not the element's own text.
    ToggleWidget,
    /// The element is an item of a list container.
    ListItem,
}

impl SpecialCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::ToggleWidget => "toggle_widget",
            Self::ListItem => "list_item",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(Self::Normal),
            "toggle_widget" => Some(Self::ToggleWidget),
            "list_item" => Some(Self::ListItem),
            _ => None,
        }
    }
}

/// Drop empty strings so "absent" has a single representation.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// One recorded interaction step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackAction {
    pub kind: ActionKind,
    /// Primary text of the element (or of its toggle row).
    pub text: Option<String>,
    pub content_label: Option<String>,
    /// Center of the element's bounds when it was recorded.
    pub position: Option<Point>,
    /// Monotonic timestamp of the original interaction, in milliseconds.
    pub recorded_at: Option<i64>,
    pub special_case: SpecialCase,
}

impl PlaybackAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = non_empty(Some(text.into()));
        self
    }

    pub fn with_content_label(mut self, label: impl Into<String>) -> Self {
        self.content_label = non_empty(Some(label.into()));
        self
    }

    pub fn with_position(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_recorded_at(mut self, millis: i64) -> Self {
        self.recorded_at = Some(millis);
        self
    }

    pub fn with_special_case(mut self, special_case: SpecialCase) -> Self {
        self.special_case = special_case;
        self
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_content_label(&self) -> bool {
        self.content_label.as_deref().is_some_and(|l| !l.is_empty())
    }

    /// Recorded position, if it lies on screen.
    pub fn valid_position(&self) -> Option<Point> {
        self.position.filter(|p| p.x >= 0 && p.y >= 0)
    }

    /// Whether the recorded point lies in the top band of the screen that
    /// holds persistent system chrome.
    pub fn is_in_static_region(&self, static_region_height: i32) -> bool {
        self.valid_position()
            .is_some_and(|p| p.y <= static_region_height)
    }

    /// Whether replay should tap the recorded point directly instead of
    /// searching the tree: the point must be known, and the element either
    /// had nothing readable or sat in the static region.
    pub fn should_use_raw_coordinates(&self, static_region_height: i32) -> bool {
        if self.valid_position().is_none() {
            return false;
        }
        if !self.has_text() && !self.has_content_label() {
            return true;
        }
        self.is_in_static_region(static_region_height)
    }

    /// Time between `previous` and this action, when both were stamped.
    /// Out-of-order stamps yield zero.
    pub fn delay_since(&self, previous: &PlaybackAction) -> Option<Duration> {
        let (now, before) = (self.recorded_at?, previous.recorded_at?);
        let millis = u64::try_from(now.saturating_sub(before)).unwrap_or(0);
        Some(Duration::from_millis(millis))
    }
}

// ============================================================================
// OutputSelection
// ============================================================================

/// A screen region whose contents are announced after replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputSelection {
    rect: Rect,
}

impl OutputSelection {
    /// Selection spanning two corners of a drag, in any order.
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            rect: Rect::from_corners(start, end),
        }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self {
            rect: rect.normalized(),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }
}

// ============================================================================
// Demonstration
// ============================================================================

/// A named, replayable command scoped to one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demonstration {
    pub id: Uuid,
    /// Phrase matched against voice transcripts.
    pub command: String,
    /// Application that was in the foreground when recording started.
    pub app_identifier: String,
    pub actions: Vec<PlaybackAction>,
    pub output_selections: Vec<OutputSelection>,
    pub created_at: DateTime<Utc>,
    /// Distance to the phrase of the most recent catalog lookup.
    #[serde(skip)]
    pub match_distance: Option<usize>,
}

impl Demonstration {
    /// Empty demonstration bound to `app_identifier`; named at save time.
    pub fn new(app_identifier: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: String::new(),
            app_identifier: app_identifier.into(),
            actions: Vec::new(),
            output_selections: Vec::new(),
            created_at: Utc::now(),
            match_distance: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_action(mut self, action: PlaybackAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_output_selection(mut self, selection: OutputSelection) -> Self {
        self.output_selections.push(selection);
        self
    }

    pub fn push_action(&mut self, action: PlaybackAction) {
        self.actions.push(action);
    }

    pub fn push_output_selection(&mut self, selection: OutputSelection) {
        self.output_selections.push(selection);
    }

    /// The most recently appended action.
    pub fn last_action(&self) -> Option<&PlaybackAction> {
        self.actions.last()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.output_selections.is_empty()
    }
}

impl PartialEq for Demonstration {
    // `match_distance` is lookup state, not content.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.command == other.command
            && self.app_identifier == other.app_identifier
            && self.actions == other.actions
            && self.output_selections == other.output_selections
            && self.created_at == other.created_at
    }
}
