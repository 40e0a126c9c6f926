//! Replays a [`Demonstration`] against the live interface.
//!
//! Each action is located with a fixed chain of strategies, stopping at the
//! first that works:
//!
//! 1. raw coordinates, for unlabeled elements and the static top band
//! 2. list navigation, for items of a list container
//! 3. matching the recorded text
//! 4. matching the recorded content label
//!
//! Replay stops at the first action no strategy can place. After a settle
//! delay the recorded output regions are read out, whether or not the
//! actions succeeded.

use std::fmt;
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::action::{Demonstration, OutputSelection, PlaybackAction, SpecialCase};
use crate::announce::{AnnounceError, Announcer};
use crate::bridge::{SelectionTicket, StateBridge};
use crate::clock;
use crate::config::{ReplayConfig, WidgetConfig};
use crate::event::SelectionEvent;
use crate::geometry::{Point, Rect};
use crate::injection::{InputInjector, NavigationKey, TapGesture};
use crate::tree::{self, NodeHandle};

// ============================================================================
// Report
// ============================================================================

/// A technique for locating a recorded action's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    RawCoordinates,
    ListItem,
    LabelText,
    ContentLabel,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RawCoordinates => "raw coordinates",
            Self::ListItem => "list item",
            Self::LabelText => "label text",
            Self::ContentLabel => "content label",
        };
        f.write_str(name)
    }
}

/// How one action was replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub index: usize,
    /// Strategies tried, in order.
    pub attempted: Vec<Strategy>,
    pub succeeded: Option<Strategy>,
}

/// Why the action phase stopped early.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReplayFailure {
    #[error("No foreground window at action {index}")]
    NoForegroundContext { index: usize },

    #[error("Could not locate the target of action {index}")]
    LocationFailure { index: usize },
}

/// Why the output phase stopped early.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutputFailure {
    #[error("Speech output is not ready")]
    Unavailable,

    #[error("Announcement failed: {0}")]
    AnnounceFailed(String),
}

/// Result of replaying one demonstration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub actions: Vec<ActionOutcome>,
    pub action_failure: Option<ReplayFailure>,
    /// Strings handed to the announcer, in order.
    pub announced: Vec<String>,
    pub output_failure: Option<OutputFailure>,
}

impl ReplayReport {
    pub fn actions_succeeded(&self) -> bool {
        self.action_failure.is_none()
    }

    pub fn output_succeeded(&self) -> bool {
        self.output_failure.is_none()
    }

    /// Both phases succeeded.
    pub fn success(&self) -> bool {
        self.actions_succeeded() && self.output_succeeded()
    }
}

// ============================================================================
// Toggle location
// ============================================================================

/// Finds the toggle widget that belongs to a label.
pub trait ToggleLocator: Send + Sync {
    fn locate(&self, label: &NodeHandle, toggle_class: &str) -> Option<NodeHandle>;
}

/// Climbs a fixed number of levels from the label to its row and picks the
/// first child of that row with the toggle class. Matches the common
/// settings layout where the label and switch are cousins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiblingToggleLocator {
    pub ancestor_depth: usize,
}

impl Default for SiblingToggleLocator {
    fn default() -> Self {
        Self { ancestor_depth: 2 }
    }
}

impl ToggleLocator for SiblingToggleLocator {
    fn locate(&self, label: &NodeHandle, toggle_class: &str) -> Option<NodeHandle> {
        let row = tree::ancestor(label, self.ancestor_depth)?;
        row.children()
            .into_iter()
            .find(|child| child.class_name() == toggle_class)
    }
}

// ============================================================================
// ReplayEngine
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum LabelSource {
    Text,
    ContentLabel,
}

/// Executes demonstrations. Runs on the replay worker thread and blocks
/// for pacing, selection waits and the output settle delay.
pub struct ReplayEngine {
    bridge: Arc<StateBridge>,
    injector: Arc<dyn InputInjector>,
    announcer: Arc<dyn Announcer>,
    config: ReplayConfig,
    widgets: WidgetConfig,
    toggle_locator: Arc<dyn ToggleLocator>,
}

impl ReplayEngine {
    pub fn new(
        bridge: Arc<StateBridge>,
        injector: Arc<dyn InputInjector>,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        let config = ReplayConfig::default();
        let toggle_locator = Arc::new(SiblingToggleLocator {
            ancestor_depth: config.toggle_ancestor_depth,
        });
        Self {
            bridge,
            injector,
            announcer,
            config,
            widgets: WidgetConfig::default(),
            toggle_locator,
        }
    }

    /// Replace the timing configuration. The default toggle locator follows
    /// the configured ancestor depth.
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.toggle_locator = Arc::new(SiblingToggleLocator {
            ancestor_depth: config.toggle_ancestor_depth,
        });
        self.config = config;
        self
    }

    pub fn with_widgets(mut self, widgets: WidgetConfig) -> Self {
        self.widgets = widgets;
        self
    }

    pub fn with_toggle_locator(mut self, locator: Arc<dyn ToggleLocator>) -> Self {
        self.toggle_locator = locator;
        self
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Replay every action, wait for the interface to settle, then announce
    /// the output regions.
    pub fn play(&self, demonstration: &Demonstration) -> ReplayReport {
        info!(
            "Replaying {:?} ({} action(s), {} output region(s))",
            demonstration.command,
            demonstration.actions.len(),
            demonstration.output_selections.len()
        );

        let mut report = ReplayReport::default();
        report.action_failure = self
            .perform_actions(&demonstration.actions, &mut report.actions)
            .err();

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            debug!("Waiting {:?} before reading output", settle);
            thread::sleep(settle);
        }

        if let Err(failure) = self.announce_output(&demonstration.output_selections, &mut report.announced) {
            error!("Output aborted: {}", failure);
            report.output_failure = Some(failure);
        }

        info!(
            "Replay of {:?} finished: actions {}, output {}",
            demonstration.command,
            if report.actions_succeeded() { "ok" } else { "failed" },
            if report.output_succeeded() { "ok" } else { "failed" }
        );
        report
    }

    fn perform_actions(
        &self,
        actions: &[PlaybackAction],
        outcomes: &mut Vec<ActionOutcome>,
    ) -> Result<(), ReplayFailure> {
        let mut previous: Option<&PlaybackAction> = None;

        for (index, action) in actions.iter().enumerate() {
            if let Some(delay) = previous.and_then(|prev| action.delay_since(prev)) {
                let delay = delay.min(self.config.max_action_delay());
                if !delay.is_zero() {
                    info!("Waiting {:?} before action {}", delay, index);
                    thread::sleep(delay);
                }
            }

            let Some(root) = self.bridge.root() else {
                error!("No active window, aborting replay at action {}", index);
                return Err(ReplayFailure::NoForegroundContext { index });
            };

            let outcome = self.perform_action(index, action, &root);
            let located = outcome.succeeded.is_some();
            outcomes.push(outcome);

            if !located {
                warn!("Aborting replay, no strategy located action {}: {:?}", index, action);
                return Err(ReplayFailure::LocationFailure { index });
            }
            previous = Some(action);
        }

        Ok(())
    }

    fn perform_action(&self, index: usize, action: &PlaybackAction, root: &NodeHandle) -> ActionOutcome {
        let mut outcome = ActionOutcome {
            index,
            attempted: Vec::new(),
            succeeded: None,
        };

        let mut attempt = |strategy: Strategy, run: &dyn Fn() -> bool| {
            if outcome.succeeded.is_some() {
                return;
            }
            debug!("Action {}: trying {}", index, strategy);
            outcome.attempted.push(strategy);
            if run() {
                info!("Action {}: located by {}", index, strategy);
                outcome.succeeded = Some(strategy);
            }
        };

        if action.should_use_raw_coordinates(self.config.static_region_height) {
            if let Some(point) = action.valid_position() {
                attempt(Strategy::RawCoordinates, &|| {
                    self.tap(point.x as f32, point.y as f32, action.recorded_at)
                });
            }
        }

        if action.special_case == SpecialCase::ListItem {
            attempt(Strategy::ListItem, &|| self.click_list_item(action, root));
        }

        if let Some(text) = action.text.as_deref() {
            attempt(Strategy::LabelText, &|| {
                self.click_label(root, text, LabelSource::Text, action)
            });
        }

        if let Some(label) = action.content_label.as_deref() {
            attempt(Strategy::ContentLabel, &|| {
                self.click_label(root, label, LabelSource::ContentLabel, action)
            });
        }

        outcome
    }

    // ------------------------------------------------------------------
    // Strategies
    // ------------------------------------------------------------------

    fn tap(&self, x: f32, y: f32, recorded_at: Option<i64>) -> bool {
        let down_time = recorded_at.unwrap_or_else(clock::uptime_millis);
        let tap = TapGesture::new(x, y, down_time);
        debug!("Tapping at ({}, {})", x, y);
        match self.injector.inject_tap(&tap) {
            Ok(()) => true,
            Err(e) => {
                warn!("Tap at ({}, {}) failed: {}", x, y, e);
                false
            }
        }
    }

    fn press(&self, key: NavigationKey) -> bool {
        match self.injector.inject_key(key) {
            Ok(()) => true,
            Err(e) => {
                warn!("Key {} failed: {}", key, e);
                false
            }
        }
    }

    /// Walk the list under the recorded point with the navigation keys
    /// until the selected item shows the recorded text and label.
    fn click_list_item(&self, action: &PlaybackAction, root: &NodeHandle) -> bool {
        let regions = action.valid_position().map(|p| vec![Rect::from_point(p)]);
        if regions.is_none() {
            warn!("No recorded position for list item, using any list on screen");
        }

        let list_class = self.widgets.list_class.as_str();
        let Some(list) = tree::collect_nodes(root, regions.as_deref(), |n| n.class_name() == list_class)
            .into_iter()
            .next()
        else {
            warn!("No list found at {:?}", action.position);
            return false;
        };

        // Focus only; activating the list itself would pick an item.
        if !list.focus() {
            warn!("Could not focus list {:?}", list);
            return false;
        }

        // Down then Up lands on the first item whatever was selected before.
        // Wait for each key's own notification.
        let ticket = self.bridge.clear_selection();
        if !self.press(NavigationKey::Down) || self.wait_for_selection(ticket).is_none() {
            return false;
        }
        let ticket = self.bridge.clear_selection();
        if !self.press(NavigationKey::Up) {
            return false;
        }
        let Some(mut current) = self.wait_for_selection(ticket) else {
            return false;
        };

        let text = action.text.as_deref();
        let label = action.content_label.as_deref();
        let mut previous: Option<SelectionEvent> = None;

        for _ in 0..self.config.max_list_items {
            if previous.as_ref().is_some_and(|p| p.same_item(&current)) {
                debug!("Selection stopped moving, item not in list");
                return false;
            }

            debug!("Selected list item {:?} / {:?}", current.primary_text(), current.content_label());
            if current.matches_labels(text, label) {
                return self.press(NavigationKey::Center);
            }

            let ticket = self.bridge.clear_selection();
            if !self.press(NavigationKey::Down) {
                return false;
            }
            previous = Some(current);
            current = match self.wait_for_selection(ticket) {
                Some(next) => next,
                None => return false,
            };
        }

        warn!(
            "Gave up after {} list item(s) without finding {:?}",
            self.config.max_list_items, text
        );
        false
    }

    fn wait_for_selection(&self, ticket: SelectionTicket) -> Option<SelectionEvent> {
        let selection = self.bridge.wait_for_selection(
            ticket,
            self.config.selection_timeout(),
            self.config.selection_settle(),
        );
        if selection.is_none() {
            warn!(
                "No selection notification within {:?}",
                self.config.selection_timeout()
            );
        }
        selection
    }

    /// Find the element showing `needle` closest to the recorded point and
    /// activate it (or its toggle).
    fn click_label(&self, root: &NodeHandle, needle: &str, source: LabelSource, action: &PlaybackAction) -> bool {
        let found = match source {
            LabelSource::Text => tree::find_by_text(root, needle),
            LabelSource::ContentLabel => tree::find_by_content_label(root, needle),
        };

        let Some(mut target) = closest_to(found, action.valid_position()) else {
            debug!("No element shows {:?}", needle);
            return false;
        };

        if action.special_case == SpecialCase::ToggleWidget {
            match self.toggle_locator.locate(&target, &self.widgets.toggle_class) {
                Some(toggle) => {
                    debug!("Found toggle for {:?}", needle);
                    target = toggle;
                }
                None => {
                    warn!("No toggle next to {:?}", needle);
                    return false;
                }
            }
        }

        self.activate(&target, action.recorded_at)
    }

    /// Focus and press Center; fall back to tapping the element's center
    /// when it cannot take focus.
    fn activate(&self, target: &NodeHandle, recorded_at: Option<i64>) -> bool {
        if target.focus() {
            debug!("Focused {:?}, activating with center key", target);
            if self.press(NavigationKey::Center) {
                return true;
            }
        } else {
            debug!("Focus failed on {:?}", target);
        }

        let (x, y) = target.bounds().exact_center();
        info!("Falling back to injected tap on {:?}", target);
        self.tap(x, y, recorded_at)
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    fn announce_output(&self, selections: &[OutputSelection], announced: &mut Vec<String>) -> Result<(), OutputFailure> {
        if selections.is_empty() {
            return Ok(());
        }
        if !self.announcer.is_ready() {
            return Err(OutputFailure::Unavailable);
        }
        let Some(root) = self.bridge.root() else {
            warn!("No active window, nothing to read");
            return Ok(());
        };

        let regions: Vec<Rect> = selections.iter().map(OutputSelection::rect).collect();
        let nodes = tree::collect_nodes(&root, Some(&regions), |node| node.has_readable_content());

        for node in nodes {
            let text = spoken_text(node.content_label(), node.text());
            info!("Reading: {}", text);
            self.announcer.announce(&text).map_err(|e| match e {
                AnnounceError::NotReady => OutputFailure::Unavailable,
                other => OutputFailure::AnnounceFailed(other.to_string()),
            })?;
            announced.push(text);
        }
        Ok(())
    }
}

/// Content label then text, each closed with a period.
fn spoken_text(content_label: Option<&str>, text: Option<&str>) -> String {
    let mut spoken = String::new();
    for part in [content_label, text].into_iter().flatten() {
        if !part.is_empty() {
            spoken.push_str(part);
            spoken.push('.');
        }
    }
    spoken
}

/// Candidate whose center is nearest `point`; the first candidate when the
/// point is unknown. Ties keep the earlier candidate.
fn closest_to(candidates: Vec<NodeHandle>, point: Option<Point>) -> Option<NodeHandle> {
    let Some(point) = point else {
        return candidates.into_iter().next();
    };

    let mut best: Option<(i64, NodeHandle)> = None;
    for candidate in candidates {
        let distance = candidate.bounds().center().distance_squared(point);
        if best.as_ref().map_or(true, |(lowest, _)| distance < *lowest) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, node)| node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::announce::mock::MockAnnouncer;
    use crate::event::EventKind;
    use crate::injection::mock::{InjectedInput, MockInjector};
    use crate::snapshot::{SnapshotSpec, SnapshotTree};
    use crate::tree::{NodeId, UiNode};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    const LIST: &str = "android.widget.ListView";
    const SWITCH: &str = "android.widget.Switch";

    struct Harness {
        bridge: Arc<StateBridge>,
        injector: Arc<MockInjector>,
        announcer: Arc<MockAnnouncer>,
        engine: ReplayEngine,
    }

    fn fast_config() -> ReplayConfig {
        ReplayConfig {
            selection_timeout_ms: 200,
            ..ReplayConfig::default().without_waits()
        }
    }

    fn harness_with(injector: MockInjector, bridge: Arc<StateBridge>) -> Harness {
        let injector = Arc::new(injector);
        let announcer = Arc::new(MockAnnouncer::new());
        let engine = ReplayEngine::new(Arc::clone(&bridge), injector.clone(), announcer.clone())
            .with_config(fast_config());
        Harness {
            bridge,
            injector,
            announcer,
            engine,
        }
    }

    fn harness() -> Harness {
        harness_with(MockInjector::new(), Arc::new(StateBridge::new()))
    }

    fn click() -> PlaybackAction {
        PlaybackAction::new(ActionKind::Activation)
    }

    fn demo(actions: Vec<PlaybackAction>) -> Demonstration {
        let mut demo = Demonstration::new("com.example.app").with_command("test");
        demo.actions = actions;
        demo
    }

    fn button(text: &str, bounds: Rect) -> SnapshotSpec {
        SnapshotSpec::new("android.widget.Button", bounds).with_text(text)
    }

    fn screen(children: Vec<SnapshotSpec>) -> SnapshotTree {
        let mut root = SnapshotSpec::new("android.widget.FrameLayout", Rect::new(0, 0, 1080, 1920));
        for child in children {
            root = root.with_child(child);
        }
        SnapshotTree::build(1, "com.example.app", root)
    }

    /// Root whose subtree must never be searched.
    #[derive(Debug, Default)]
    struct TrapRoot {
        child_reads: AtomicUsize,
    }

    impl UiNode for TrapRoot {
        fn node_id(&self) -> NodeId {
            1
        }
        fn window_id(&self) -> i64 {
            1
        }
        fn app_identifier(&self) -> Option<&str> {
            Some("com.example.app")
        }
        fn class_name(&self) -> &str {
            "android.widget.FrameLayout"
        }
        fn text(&self) -> Option<&str> {
            None
        }
        fn content_label(&self) -> Option<&str> {
            None
        }
        fn bounds(&self) -> Rect {
            Rect::new(0, 0, 1080, 1920)
        }
        fn children(&self) -> Vec<NodeHandle> {
            self.child_reads.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
        fn parent(&self) -> Option<NodeHandle> {
            None
        }
        fn focus(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_unlabeled_action_uses_only_raw_coordinates() {
        let h = harness();
        let root = Arc::new(TrapRoot::default());
        h.bridge.update_root(root.clone());

        let report = h.engine.play(&demo(vec![click()
            .with_position(Point::new(10, 500))
            .with_recorded_at(42)]));

        assert!(report.success());
        assert_eq!(report.actions[0].attempted, vec![Strategy::RawCoordinates]);
        assert_eq!(root.child_reads.load(Ordering::SeqCst), 0);

        let taps = h.injector.taps();
        assert_eq!(taps.len(), 1);
        assert_eq!((taps[0].x, taps[0].y), (10.0, 500.0));
        assert_eq!(taps[0].down_time_ms, 42);
    }

    #[test]
    fn test_labeled_action_outside_static_region_searches_text() {
        let h = harness();
        let tree = screen(vec![button("Save", Rect::new(600, 1200, 800, 1300))]);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("Save")
            .with_position(Point::new(200, 300))]));

        assert!(report.success());
        assert_eq!(report.actions[0].attempted, vec![Strategy::LabelText]);
        assert_eq!(report.actions[0].succeeded, Some(Strategy::LabelText));
        let save = tree.find_text("Save").unwrap();
        assert_eq!(tree.focus_requests(), vec![save.node_id()]);
        assert_eq!(h.injector.inputs(), vec![InjectedInput::Key(NavigationKey::Center)]);
    }

    #[test]
    fn test_labeled_action_in_static_region_taps() {
        let h = harness();
        let tree = screen(vec![button("Back", Rect::new(0, 0, 60, 60))]);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("Back")
            .with_position(Point::new(30, 30))]));

        assert_eq!(report.actions[0].attempted, vec![Strategy::RawCoordinates]);
        assert!(tree.focus_requests().is_empty());
    }

    #[test]
    fn test_label_picks_closest_match() {
        let h = harness();
        let tree = screen(vec![
            button("Reply", Rect::new(0, 100, 200, 200)),
            button("Reply", Rect::new(0, 1600, 200, 1700)),
        ]);
        h.bridge.update_root(tree.root());

        h.engine.play(&demo(vec![click()
            .with_text("reply")
            .with_position(Point::new(100, 1500))]));

        let bottom = tree.root().children()[1].node_id();
        assert_eq!(tree.focus_requests(), vec![bottom]);
    }

    #[test]
    fn test_label_without_position_picks_first() {
        let h = harness();
        let tree = screen(vec![
            button("Reply", Rect::new(0, 100, 200, 200)),
            button("Reply", Rect::new(0, 1600, 200, 1700)),
        ]);
        h.bridge.update_root(tree.root());

        h.engine.play(&demo(vec![click().with_text("Reply")]));

        let top = tree.root().children()[0].node_id();
        assert_eq!(tree.focus_requests(), vec![top]);
    }

    #[test]
    fn test_unfocusable_target_gets_tap_at_center() {
        let h = harness();
        let tree = screen(vec![button("Send", Rect::new(100, 400, 301, 501)).with_focusable(false)]);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("Send")
            .with_position(Point::new(200, 450))
            .with_recorded_at(7)]));

        assert!(report.success());
        let taps = h.injector.taps();
        assert_eq!((taps[0].x, taps[0].y), (200.5, 450.5));
        assert_eq!(taps[0].down_time_ms, 7);
        assert!(h.injector.keys().is_empty());
    }

    fn toggle_row(label: &str, with_switch: bool) -> SnapshotTree {
        let mut row = SnapshotSpec::new("android.widget.LinearLayout", Rect::new(0, 400, 1080, 500)).with_child(
            SnapshotSpec::new("android.widget.RelativeLayout", Rect::new(0, 400, 800, 500))
                .with_child(SnapshotSpec::new("android.widget.TextView", Rect::new(0, 400, 800, 500)).with_text(label)),
        );
        if with_switch {
            row = row.with_child(SnapshotSpec::new(SWITCH, Rect::new(800, 400, 1080, 500)));
        }
        screen(vec![row])
    }

    #[test]
    fn test_toggle_targets_sibling_switch() {
        let h = harness();
        let tree = toggle_row("Bluetooth", true);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("Bluetooth")
            .with_position(Point::new(940, 450))
            .with_special_case(SpecialCase::ToggleWidget)]));

        assert!(report.success());
        let switch = tree::collect_nodes(&tree.root(), None, |n| n.class_name() == SWITCH).remove(0);
        assert_eq!(tree.focus_requests(), vec![switch.node_id()]);
    }

    #[test]
    fn test_toggle_without_switch_fails() {
        let h = harness();
        let tree = toggle_row("Bluetooth", false);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("Bluetooth")
            .with_position(Point::new(940, 450))
            .with_special_case(SpecialCase::ToggleWidget)]));

        assert_eq!(report.action_failure, Some(ReplayFailure::LocationFailure { index: 0 }));
        assert!(h.injector.inputs().is_empty());
    }

    #[test]
    fn test_custom_toggle_locator() {
        struct FirstSwitch;
        impl ToggleLocator for FirstSwitch {
            fn locate(&self, label: &NodeHandle, toggle_class: &str) -> Option<NodeHandle> {
                let root = tree::ancestor(label, 3)?;
                tree::collect_nodes(&root, None, |n| n.class_name() == toggle_class)
                    .into_iter()
                    .next()
            }
        }

        let bridge = Arc::new(StateBridge::new());
        let mut h = harness_with(MockInjector::new(), bridge);
        h.engine = h.engine.with_toggle_locator(Arc::new(FirstSwitch));
        let tree = toggle_row("Wi-Fi", true);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("Wi-Fi")
            .with_special_case(SpecialCase::ToggleWidget)]));
        assert!(report.success());
    }

    #[test]
    fn test_content_label_is_last_resort() {
        let h = harness();
        let tree = screen(vec![SnapshotSpec::new("android.widget.ImageButton", Rect::new(900, 100, 1000, 200))
            .with_content_label("Compose")]);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("New message")
            .with_content_label("Compose")
            .with_position(Point::new(950, 150))]));

        assert!(report.success());
        assert_eq!(
            report.actions[0].attempted,
            vec![Strategy::LabelText, Strategy::ContentLabel]
        );
        assert_eq!(report.actions[0].succeeded, Some(Strategy::ContentLabel));
    }

    #[test]
    fn test_no_root_aborts_actions_but_reports() {
        let h = harness();
        let mut demonstration = demo(vec![click().with_position(Point::new(1, 1))]);
        demonstration.push_output_selection(OutputSelection::from_rect(Rect::new(0, 0, 10, 10)));

        let report = h.engine.play(&demonstration);
        assert_eq!(
            report.action_failure,
            Some(ReplayFailure::NoForegroundContext { index: 0 })
        );
        assert!(report.actions.is_empty());
        assert!(report.output_succeeded());
        assert!(!report.success());
    }

    #[test]
    fn test_failed_action_skips_the_rest() {
        let h = harness();
        let tree = screen(vec![button("OK", Rect::new(0, 500, 100, 600))]);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![
            click().with_text("Missing").with_position(Point::new(500, 500)),
            click().with_text("OK").with_position(Point::new(50, 550)),
        ]));

        assert_eq!(report.action_failure, Some(ReplayFailure::LocationFailure { index: 0 }));
        assert_eq!(report.actions.len(), 1);
        assert!(h.injector.inputs().is_empty());
    }

    #[test]
    fn test_pacing_follows_recorded_gap() {
        let bridge = Arc::new(StateBridge::new());
        let mut h = harness_with(MockInjector::new(), bridge);
        h.engine = h.engine.with_config(ReplayConfig {
            max_action_delay_ms: 10_000,
            ..fast_config()
        });
        h.bridge.update_root(Arc::new(TrapRoot::default()));

        let started = Instant::now();
        let report = h.engine.play(&demo(vec![
            click().with_position(Point::new(1, 1)).with_recorded_at(1_000),
            click().with_position(Point::new(2, 2)).with_recorded_at(1_150),
        ]));
        assert!(report.success());
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_pacing_is_clamped() {
        let bridge = Arc::new(StateBridge::new());
        let mut h = harness_with(MockInjector::new(), bridge);
        h.engine = h.engine.with_config(ReplayConfig {
            max_action_delay_ms: 20,
            ..fast_config()
        });
        h.bridge.update_root(Arc::new(TrapRoot::default()));

        let started = Instant::now();
        h.engine.play(&demo(vec![
            click().with_position(Point::new(1, 1)).with_recorded_at(0),
            click().with_position(Point::new(2, 2)).with_recorded_at(3_600_000),
        ]));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(h.injector.taps().len(), 2);
    }

    /// A list of items navigated with the directional keys. Each move
    /// publishes a selection notification, like a real list view.
    fn list_injector(bridge: &Arc<StateBridge>, items: &[&str]) -> MockInjector {
        let items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        let position = Mutex::new(0usize);
        let bridge = Arc::clone(bridge);
        MockInjector::new().with_key_handler(move |key| {
            let mut position = position.lock();
            match key {
                NavigationKey::Down => *position = (*position + 1).min(items.len() - 1),
                NavigationKey::Up => *position = position.saturating_sub(1),
                NavigationKey::Center => return,
            }
            bridge.publish_selection(SelectionEvent {
                kind: EventKind::Selected,
                source_id: Some(100 + *position as NodeId),
                text: vec![items[*position].clone()],
                content_label: None,
                event_time: 0,
            });
        })
    }

    fn list_screen() -> SnapshotTree {
        screen(vec![SnapshotSpec::new(LIST, Rect::new(0, 200, 1080, 1800))
            .with_child(SnapshotSpec::new("android.widget.TextView", Rect::new(0, 200, 1080, 300)).with_text("Display"))])
    }

    #[test]
    fn test_list_item_navigates_to_match() {
        let bridge = Arc::new(StateBridge::new());
        let h = harness_with(list_injector(&bridge, &["Display", "Sound", "Storage"]), bridge);
        let tree = list_screen();
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("Storage")
            .with_position(Point::new(540, 700))
            .with_special_case(SpecialCase::ListItem)]));

        assert!(report.success());
        assert_eq!(report.actions[0].attempted, vec![Strategy::ListItem]);
        assert_eq!(
            h.injector.keys(),
            vec![
                NavigationKey::Down,
                NavigationKey::Up,
                NavigationKey::Down,
                NavigationKey::Down,
                NavigationKey::Center,
            ]
        );
    }

    #[test]
    fn test_list_item_waits_for_slow_up_notification() {
        let bridge = Arc::new(StateBridge::new());
        let items: Arc<Vec<String>> = Arc::new(vec!["Display".to_string(), "Sound".to_string()]);
        let position = Arc::new(Mutex::new(0usize));
        let centered_on: Arc<Mutex<Option<usize>>> = Arc::new(Mutex::new(None));

        let publish = {
            let bridge = Arc::clone(&bridge);
            let items = Arc::clone(&items);
            move |index: usize| {
                bridge.publish_selection(SelectionEvent {
                    kind: EventKind::Selected,
                    source_id: Some(100 + index as NodeId),
                    text: vec![items[index].clone()],
                    content_label: None,
                    event_time: 0,
                })
            }
        };
        let injector = {
            let position = Arc::clone(&position);
            let centered_on = Arc::clone(&centered_on);
            MockInjector::new().with_key_handler(move |key| match key {
                NavigationKey::Down => {
                    let mut position = position.lock();
                    *position = (*position + 1).min(items.len() - 1);
                    publish(*position);
                }
                NavigationKey::Up => {
                    *position.lock() = 0;
                    let publish = publish.clone();
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_millis(150));
                        publish(0);
                    });
                }
                NavigationKey::Center => *centered_on.lock() = Some(*position.lock()),
            })
        };

        let injector = Arc::new(injector);
        let engine = ReplayEngine::new(Arc::clone(&bridge), injector.clone(), Arc::new(MockAnnouncer::new()))
            .with_config(ReplayConfig {
                selection_settle_ms: 100,
                selection_timeout_ms: 2000,
                ..ReplayConfig::default().without_waits()
            });
        let tree = list_screen();
        bridge.update_root(tree.root());

        let report = engine.play(&demo(vec![click()
            .with_text("Display")
            .with_position(Point::new(540, 700))
            .with_special_case(SpecialCase::ListItem)]));

        assert!(report.success());
        assert_eq!(*centered_on.lock(), Some(0));
        assert_eq!(
            injector.keys(),
            vec![NavigationKey::Down, NavigationKey::Up, NavigationKey::Center]
        );
    }

    #[test]
    fn test_list_item_missing_stops_at_end() {
        let bridge = Arc::new(StateBridge::new());
        let h = harness_with(list_injector(&bridge, &["Display", "Sound"]), bridge);
        let tree = list_screen();
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_text("Network")
            .with_position(Point::new(540, 700))
            .with_special_case(SpecialCase::ListItem)]));

        assert_eq!(
            report.actions[0].attempted,
            vec![Strategy::ListItem, Strategy::LabelText]
        );
        assert!(!report.success());
        assert!(!h.injector.keys().contains(&NavigationKey::Center));
    }

    #[test]
    fn test_list_item_times_out_without_notifications() {
        let h = harness();
        let tree = list_screen();
        h.bridge.update_root(tree.root());

        let started = Instant::now();
        let report = h.engine.play(&demo(vec![click()
            .with_position(Point::new(540, 700))
            .with_special_case(SpecialCase::ListItem)
            .with_content_label("Storage settings")]));

        assert_eq!(report.action_failure, Some(ReplayFailure::LocationFailure { index: 0 }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_list_item_requires_list_at_point() {
        let h = harness();
        let tree = list_screen();
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(vec![click()
            .with_position(Point::new(540, 1900))
            .with_special_case(SpecialCase::ListItem)
            .with_content_label("Storage settings")]));

        assert_eq!(
            report.actions[0].attempted,
            vec![Strategy::ListItem, Strategy::ContentLabel]
        );
        assert!(h.injector.keys().is_empty());
    }

    #[test]
    fn test_output_reads_nodes_in_selections() {
        let h = harness();
        let tree = screen(vec![
            SnapshotSpec::new("android.widget.TextView", Rect::new(0, 100, 500, 200))
                .with_text("72°F")
                .with_content_label("Temperature"),
            SnapshotSpec::new("android.widget.TextView", Rect::new(0, 200, 500, 300)).with_text("Sunny"),
            SnapshotSpec::new("android.widget.TextView", Rect::new(0, 1500, 500, 1600)).with_text("Ad"),
        ]);
        h.bridge.update_root(tree.root());

        let mut demonstration = demo(Vec::new());
        demonstration.push_output_selection(OutputSelection::new(Point::new(0, 100), Point::new(600, 300)));

        let report = h.engine.play(&demonstration);
        assert!(report.success());
        assert_eq!(report.announced, vec!["Temperature.72°F.", "Sunny."]);
        assert_eq!(h.announcer.spoken(), report.announced);
    }

    #[test]
    fn test_output_without_selections_announces_nothing() {
        let h = harness();
        h.announcer.set_ready(false);
        let tree = screen(vec![button("Hello", Rect::new(0, 0, 100, 100))]);
        h.bridge.update_root(tree.root());

        let report = h.engine.play(&demo(Vec::new()));
        assert!(report.success());
        assert!(report.announced.is_empty());
    }

    #[test]
    fn test_output_unavailable_keeps_action_result() {
        let h = harness();
        h.announcer.set_ready(false);
        let tree = screen(vec![button("Hello", Rect::new(0, 500, 100, 600))]);
        h.bridge.update_root(tree.root());

        let mut demonstration = demo(vec![click().with_text("Hello").with_position(Point::new(50, 550))]);
        demonstration.push_output_selection(OutputSelection::from_rect(Rect::new(0, 500, 100, 600)));

        let report = h.engine.play(&demonstration);
        assert!(report.actions_succeeded());
        assert_eq!(report.output_failure, Some(OutputFailure::Unavailable));
        assert!(!report.success());
    }

    #[test]
    fn test_spoken_text() {
        assert_eq!(spoken_text(Some("Battery"), Some("80%")), "Battery.80%.");
        assert_eq!(spoken_text(None, Some("80%")), "80%.");
        assert_eq!(spoken_text(Some(""), Some("80%")), "80%.");
    }
}
