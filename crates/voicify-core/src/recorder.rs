//! Turns activation notifications into [`PlaybackAction`]s.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::{ActionKind, PlaybackAction, SpecialCase};
use crate::config::WidgetConfig;
use crate::event::{CaptureEvent, EventKind};

/// Why a notification could not be turned into an action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Event kind {0:?} is not recorded")]
    NotActionable(EventKind),

    #[error("Toggle widget has no readable label")]
    UnlabeledToggle,
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Classifies and normalizes captured activations.
///
/// Runs on the notification path, so it only reads the event and the
/// source element's bounds.
#[derive(Debug, Clone, Default)]
pub struct ActionRecorder {
    widgets: WidgetConfig,
}

impl ActionRecorder {
    pub fn new(widgets: WidgetConfig) -> Self {
        Self { widgets }
    }

    /// Only activations are recorded. Hover, focus and scroll noise is
    /// discarded here.
    pub fn is_actionable(&self, event: &CaptureEvent) -> bool {
        event.kind == EventKind::Clicked
    }

    /// Build an action from an activation.
    ///
    /// The first ancestor record decides the special case: a toggle row
    /// contributes its own text (and must have some), a list container
    /// only tags the action.
    pub fn obtain(&self, event: &CaptureEvent) -> ExtractionResult<PlaybackAction> {
        if !self.is_actionable(event) {
            debug!("Discarded {:?} event", event.kind);
            return Err(ExtractionError::NotActionable(event.kind));
        }

        let mut action = PlaybackAction::new(ActionKind::Activation).with_recorded_at(event.event_time);
        if let Some(text) = event.primary_text() {
            action = action.with_text(text);
        }
        if let Some(label) = &event.content_label {
            action = action.with_content_label(label.as_str());
        }

        match &event.source {
            Some(source) => action = action.with_position(source.bounds().center()),
            None => warn!("Activation has no source element; position unknown"),
        }

        if let Some(record) = event.records.first() {
            if record.class_name == self.widgets.toggle_class {
                let text = record.primary_text().ok_or_else(|| {
                    warn!("Toggle record has no text, dropping action");
                    ExtractionError::UnlabeledToggle
                })?;
                debug!("Toggle widget activation labeled {:?}", text);
                action = action
                    .with_text(text)
                    .with_special_case(SpecialCase::ToggleWidget);
            } else if record.class_name == self.widgets.list_class {
                debug!("List item activation");
                action = action.with_special_case(SpecialCase::ListItem);
            }
        }

        info!(
            "Recorded {:?} text={:?} label={:?} at {:?}",
            action.special_case, action.text, action.content_label, action.position
        );
        Ok(action)
    }
}
