//! # Voicify Core
//!
//! Teach a voice command by demonstration, then replay it by speaking.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       VoicifyService                         │
//! │                                                              │
//! │  notifications ──► ActionRecorder ──► draft Demonstration    │
//! │        │                                     │               │
//! │        ▼                                     ▼               │
//! │   StateBridge ◄──── ReplayEngine ◄── DemonstrationCatalog    │
//! │  (root, selection)    │       │              │               │
//! │                       ▼       ▼              ▼               │
//! │              InputInjector  Announcer   CatalogStore         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The platform supplies the live interface tree ([`tree::UiNode`]), input
//! injection ([`injection::InputInjector`]) and speech output
//! ([`announce::Announcer`]). Everything else lives here.

pub mod action;
pub mod announce;
pub mod bridge;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod edit_distance;
pub mod event;
pub mod geometry;
pub mod injection;
pub mod recorder;
pub mod replay;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod tree;

pub use action::{ActionKind, Demonstration, OutputSelection, PlaybackAction, SpecialCase};
pub use announce::{AnnounceError, Announcer};
pub use bridge::StateBridge;
pub use catalog::DemonstrationCatalog;
pub use config::{ConfigError, VoicifyConfig};
pub use event::{AncestorRecord, CaptureEvent, EventKind, SelectionEvent};
pub use geometry::{Point, Rect};
pub use injection::{InjectError, InputInjector, NavigationKey, TapGesture};
pub use recorder::{ActionRecorder, ExtractionError};
pub use replay::{ReplayEngine, ReplayReport, Strategy};
pub use service::{ReplayHandle, ServiceError, ServiceEvent, ServiceState, VoicifyService};
pub use snapshot::{SnapshotFile, SnapshotSpec, SnapshotTree};
pub use store::{CatalogError, CatalogStore};
pub use tree::{NodeHandle, UiNode};
