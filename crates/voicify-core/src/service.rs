//! The voicify service: recording sessions, voice command resolution and
//! replay dispatch.
//!
//! The platform glue feeds every interaction notification to
//! [`VoicifyService::on_event`] and forwards user intents (start/stop
//! recording, a transcript) to the matching methods. User-visible
//! reporting leaves through the [`ServiceEvent`] channel.

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::action::{Demonstration, OutputSelection};
use crate::announce::Announcer;
use crate::bridge::StateBridge;
use crate::catalog::DemonstrationCatalog;
use crate::config::VoicifyConfig;
use crate::event::{CaptureEvent, SelectionEvent};
use crate::injection::InputInjector;
use crate::recorder::ActionRecorder;
use crate::replay::{ReplayEngine, ReplayReport};
use crate::store::{CatalogError, CatalogStore};

/// What the service is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Idle,
    Recording,
    /// Recording ended; waiting for a name and optional output regions.
    Saving,
    Playing,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Saving => "saving",
            Self::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Errors returned to the caller of a service operation.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No foreground window is known yet")]
    NoForegroundContext,

    #[error("Foreground window does not report its application")]
    UnknownApplication,

    #[error("Cannot {action} while {state}")]
    Busy {
        action: &'static str,
        state: ServiceState,
    },

    #[error("No recording in progress")]
    NotRecording,

    #[error("Command name cannot be empty")]
    EmptyCommand,

    #[error("No command matches {transcript:?}")]
    NoMatch { transcript: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Could not start replay worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Replay worker panicked")]
    ReplayPanicked,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Notifications for the user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    RecordingStarted { app_identifier: String },
    /// An activation could not be recorded. Sent once per session.
    RecordingWarning { message: String },
    CommandSaved { app_identifier: String, command: String },
    /// Saving replaced an existing command with the same name.
    CommandReplaced { app_identifier: String, command: String },
    SaveFailed { message: String },
    NoMatch { transcript: String },
    PlaybackStarted { command: String, distance: usize },
    PlaybackComplete { command: String, success: bool },
}

/// Demonstration being recorded, plus duplicate filtering state.
#[derive(Debug)]
struct RecordingSession {
    demonstration: Demonstration,
    last_action_time: Option<i64>,
    warned: bool,
}

impl RecordingSession {
    fn new(app_identifier: &str) -> Self {
        Self {
            demonstration: Demonstration::new(app_identifier),
            last_action_time: None,
            warned: false,
        }
    }

    /// Activations within `min_gap_ms` of the previous one are echoes of
    /// the same human action.
    fn is_unique(&self, event_time: i64, min_gap_ms: u64) -> bool {
        match self.last_action_time {
            None => true,
            Some(last) => event_time.saturating_sub(last) > i64::try_from(min_gap_ms).unwrap_or(i64::MAX),
        }
    }
}

#[derive(Debug)]
struct Session {
    state: ServiceState,
    recording: Option<RecordingSession>,
    /// Bumped each time a replay starts.
    playback: u64,
}

struct ServiceInner {
    session: Mutex<Session>,
    catalog: RwLock<DemonstrationCatalog>,
    store: Option<CatalogStore>,
    recorder: ActionRecorder,
    bridge: Arc<StateBridge>,
    engine: Arc<ReplayEngine>,
    config: VoicifyConfig,
    events: mpsc::UnboundedSender<ServiceEvent>,
}

impl ServiceInner {
    fn emit(&self, event: ServiceEvent) {
        if self.events.send(event).is_err() {
            debug!("No listener for service events");
        }
    }

    fn persist(&self) -> ServiceResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let catalog = self.catalog.read();
        store.save(&catalog).map_err(|e| {
            error!("Saving catalog failed: {}", e);
            self.emit(ServiceEvent::SaveFailed {
                message: e.to_string(),
            });
            ServiceError::from(e)
        })
    }
}

/// Returns the service to idle when a replay worker exits, even by panic.
///
/// Only the replay that started last may reset the state.
struct PlaybackGuard {
    inner: Arc<ServiceInner>,
    playback: u64,
    released: bool,
}

impl PlaybackGuard {
    /// Mark the session as playing and take ownership of that playback.
    fn begin(inner: &Arc<ServiceInner>, session: &mut Session) -> Self {
        session.state = ServiceState::Playing;
        session.playback = session.playback.wrapping_add(1);
        Self {
            inner: Arc::clone(inner),
            playback: session.playback,
            released: false,
        }
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        let mut session = self.inner.session.lock();
        if session.state == ServiceState::Playing && session.playback == self.playback {
            session.state = ServiceState::Idle;
        } else {
            debug!("Playback {} already superseded", self.playback);
        }
    }
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// A replay running on its worker thread.
#[derive(Debug)]
pub struct ReplayHandle {
    command: String,
    distance: usize,
    worker: JoinHandle<ReplayReport>,
}

impl ReplayHandle {
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Edit distance between the transcript and the chosen command.
    pub fn match_distance(&self) -> usize {
        self.distance
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the replay to finish.
    pub fn join(self) -> ServiceResult<ReplayReport> {
        self.worker.join().map_err(|_| ServiceError::ReplayPanicked)
    }
}

/// Orchestrates recording, catalog updates and replay.
#[derive(Clone)]
pub struct VoicifyService {
    inner: Arc<ServiceInner>,
}

impl VoicifyService {
    /// Service persisting to the configured catalog path. The catalog is
    /// loaded immediately; a missing or corrupt file starts empty.
    pub fn new(
        config: VoicifyConfig,
        injector: Arc<dyn InputInjector>,
        announcer: Arc<dyn Announcer>,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceEvent>) {
        let store = config.catalog_path().map(CatalogStore::new);
        if store.is_none() {
            warn!("No data directory available, catalog will not be persisted");
        }
        Self::build(config, store, injector, announcer)
    }

    /// Service that never touches disk.
    pub fn in_memory(
        config: VoicifyConfig,
        injector: Arc<dyn InputInjector>,
        announcer: Arc<dyn Announcer>,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceEvent>) {
        Self::build(config, None, injector, announcer)
    }

    fn build(
        config: VoicifyConfig,
        store: Option<CatalogStore>,
        injector: Arc<dyn InputInjector>,
        announcer: Arc<dyn Announcer>,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceEvent>) {
        let catalog = store.as_ref().map(CatalogStore::load).unwrap_or_default();
        let bridge = Arc::new(StateBridge::new());
        let engine = ReplayEngine::new(Arc::clone(&bridge), injector, announcer)
            .with_config(config.replay.clone())
            .with_widgets(config.widgets.clone());
        let (events, receiver) = mpsc::unbounded_channel();

        let inner = ServiceInner {
            session: Mutex::new(Session {
                state: ServiceState::Idle,
                recording: None,
                playback: 0,
            }),
            catalog: RwLock::new(catalog),
            store,
            recorder: ActionRecorder::new(config.widgets.clone()),
            bridge,
            engine: Arc::new(engine),
            config,
            events,
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    pub fn state(&self) -> ServiceState {
        self.inner.session.lock().state
    }

    pub fn bridge(&self) -> &Arc<StateBridge> {
        &self.inner.bridge
    }

    /// Run `f` against the catalog under a read lock.
    pub fn with_catalog<R>(&self, f: impl FnOnce(&DemonstrationCatalog) -> R) -> R {
        f(&self.inner.catalog.read())
    }

    /// Copy of the demonstration currently being recorded or saved.
    pub fn draft(&self) -> Option<Demonstration> {
        self.inner
            .session
            .lock()
            .recording
            .as_ref()
            .map(|r| r.demonstration.clone())
    }

    // ------------------------------------------------------------------
    // Notification path
    // ------------------------------------------------------------------

    /// Handle one interaction notification. Never blocks beyond short lock
    /// holds.
    pub fn on_event(&self, event: &CaptureEvent) {
        let inner = &self.inner;
        let playing = {
            let mut session = inner.session.lock();
            if session.state == ServiceState::Recording && inner.recorder.is_actionable(event) {
                if let Some(recording) = session.recording.as_mut() {
                    self.record(recording, event);
                }
            }
            session.state == ServiceState::Playing
        };

        if event.kind.changes_active_window() {
            match event.window_root() {
                Some(root) => {
                    inner.bridge.update_root(root);
                }
                None => debug!("Window change without a source element"),
            }
        }

        if playing && event.kind.is_selection_update() {
            inner.bridge.publish_selection(SelectionEvent::from_capture(event));
        }
    }

    fn record(&self, recording: &mut RecordingSession, event: &CaptureEvent) {
        let min_gap = self.inner.config.recording.min_action_gap_ms;
        if !recording.is_unique(event.event_time, min_gap) {
            debug!("Dropping duplicate activation at {}", event.event_time);
            return;
        }
        recording.last_action_time = Some(event.event_time);

        match self.inner.recorder.obtain(event) {
            Ok(action) => recording.demonstration.push_action(action),
            Err(e) => {
                warn!("Could not record activation: {}", e);
                if !recording.warned {
                    recording.warned = true;
                    self.inner.emit(ServiceEvent::RecordingWarning {
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Begin recording in the foreground application.
    pub fn start_recording(&self) -> ServiceResult<()> {
        let root = self
            .inner
            .bridge
            .root()
            .ok_or(ServiceError::NoForegroundContext)?;
        let app = root
            .app_identifier()
            .ok_or(ServiceError::UnknownApplication)?
            .to_string();

        let mut session = self.inner.session.lock();
        match session.state {
            ServiceState::Saving | ServiceState::Playing => {
                return Err(ServiceError::Busy {
                    action: "start recording",
                    state: session.state,
                });
            }
            ServiceState::Recording => warn!("Restarting recording, discarding previous draft"),
            ServiceState::Idle => {}
        }

        info!("Started recording in {}", app);
        session.state = ServiceState::Recording;
        session.recording = Some(RecordingSession::new(&app));
        drop(session);

        self.inner.emit(ServiceEvent::RecordingStarted { app_identifier: app });
        Ok(())
    }

    /// Stop capturing actions and wait for a name.
    pub fn end_recording(&self) -> ServiceResult<()> {
        let mut session = self.inner.session.lock();
        if session.state != ServiceState::Recording {
            return Err(ServiceError::NotRecording);
        }
        let actions = session
            .recording
            .as_ref()
            .map_or(0, |r| r.demonstration.actions.len());
        info!("Ended recording with {} action(s)", actions);
        session.state = ServiceState::Saving;
        Ok(())
    }

    /// Add a region to read aloud after replay.
    pub fn add_output_selection(&self, selection: OutputSelection) -> ServiceResult<()> {
        if self.inner.bridge.root().is_none() {
            return Err(ServiceError::NoForegroundContext);
        }
        let mut session = self.inner.session.lock();
        let recording = session.recording.as_mut().ok_or(ServiceError::NotRecording)?;
        debug!("Added output selection {:?}", selection.rect());
        recording.demonstration.push_output_selection(selection);
        Ok(())
    }

    /// Name the draft, add it to the catalog and persist the catalog.
    ///
    /// Returns whether an existing command was replaced. The service is
    /// idle afterwards even if persisting failed; the in-memory catalog
    /// keeps the new command.
    pub fn save_recording(&self, command: &str) -> ServiceResult<bool> {
        let command = command.trim();
        if command.is_empty() {
            return Err(ServiceError::EmptyCommand);
        }

        let recording = {
            let mut session = self.inner.session.lock();
            if !matches!(session.state, ServiceState::Recording | ServiceState::Saving) {
                return Err(ServiceError::NotRecording);
            }
            let recording = session.recording.take().ok_or(ServiceError::NotRecording)?;
            session.state = ServiceState::Idle;
            recording
        };

        let demonstration = recording.demonstration.with_command(command);
        let app_identifier = demonstration.app_identifier.clone();
        info!("Saving command {:?} for {}", command, app_identifier);

        let replaced = self.inner.catalog.write().add(demonstration);
        let event = if replaced {
            ServiceEvent::CommandReplaced {
                app_identifier,
                command: command.to_string(),
            }
        } else {
            ServiceEvent::CommandSaved {
                app_identifier,
                command: command.to_string(),
            }
        };
        self.inner.emit(event);

        self.inner.persist()?;
        Ok(replaced)
    }

    /// Discard the draft.
    pub fn cancel_recording(&self) {
        let mut session = self.inner.session.lock();
        if matches!(session.state, ServiceState::Recording | ServiceState::Saving) {
            info!("Recording cancelled");
            session.state = ServiceState::Idle;
        }
        session.recording = None;
    }

    // ------------------------------------------------------------------
    // Voice commands
    // ------------------------------------------------------------------

    /// Resolve a transcript in the foreground app and start replaying the
    /// closest command on a worker thread.
    pub fn handle_voice_command(&self, transcript: &str) -> ServiceResult<ReplayHandle> {
        let inner = &self.inner;
        let mut session = inner.session.lock();
        if session.state != ServiceState::Idle {
            return Err(ServiceError::Busy {
                action: "replay a command",
                state: session.state,
            });
        }

        let root = inner.bridge.root().ok_or(ServiceError::NoForegroundContext)?;
        let app = root.app_identifier().ok_or(ServiceError::UnknownApplication)?;
        info!("Heard {:?} in {}", transcript, app);

        let threshold = inner.config.matching.distance_threshold;
        let found = inner
            .catalog
            .read()
            .find_best_match(transcript, app)
            .filter(|d| d.match_distance.is_some_and(|distance| distance <= threshold));

        let Some(demonstration) = found else {
            info!("No good match for {:?}", transcript);
            inner.emit(ServiceEvent::NoMatch {
                transcript: transcript.to_string(),
            });
            return Err(ServiceError::NoMatch {
                transcript: transcript.to_string(),
            });
        };

        let command = demonstration.command.clone();
        let distance = demonstration.match_distance.unwrap_or_default();
        info!("Doing demo {:?} (distance {})", command, distance);

        let mut guard = PlaybackGuard::begin(inner, &mut session);
        drop(session);

        let worker_command = command.clone();
        let spawned = std::thread::Builder::new()
            .name("voicify-replay".to_string())
            .spawn(move || {
                let report = guard.inner.engine.play(&demonstration);
                let success = report.success();
                if success {
                    info!("Demonstration {:?} ended successfully", worker_command);
                } else {
                    warn!("Demonstration {:?} ended with issues", worker_command);
                }
                guard.release();
                guard.inner.emit(ServiceEvent::PlaybackComplete {
                    command: worker_command,
                    success,
                });
                report
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                // The closure, and with it the guard, was dropped: state is idle again.
                error!("Could not spawn replay worker: {}", e);
                return Err(e.into());
            }
        };

        inner.emit(ServiceEvent::PlaybackStarted {
            command: command.clone(),
            distance,
        });
        Ok(ReplayHandle {
            command,
            distance,
            worker,
        })
    }

    // ------------------------------------------------------------------
    // Catalog administration
    // ------------------------------------------------------------------

    /// Delete one command and persist. Returns whether it existed.
    pub fn remove_command(&self, app_identifier: &str, command: &str) -> ServiceResult<bool> {
        let removed = self.inner.catalog.write().remove(app_identifier, command).is_some();
        if removed {
            info!("Removed command {:?} for {}", command, app_identifier);
            self.inner.persist()?;
        }
        Ok(removed)
    }

    /// Delete every command and persist.
    pub fn clear_catalog(&self) -> ServiceResult<()> {
        self.inner.catalog.write().clear();
        info!("Cleared catalog");
        self.inner.persist()
    }
}
