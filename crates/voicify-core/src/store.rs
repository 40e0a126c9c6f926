//! Catalog persistence.
//!
//! The catalog is stored as one versioned JSON document. Every entry is a
//! flat record of primitive fields; absent values use `-1` or an empty
//! string so the file layout does not follow in-memory types.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::action::{ActionKind, Demonstration, OutputSelection, PlaybackAction, SpecialCase};
use crate::catalog::DemonstrationCatalog;
use crate::geometry::{Point, Rect};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Sentinel for unknown numeric fields.
const UNSET: i64 = -1;

/// Errors that can occur while reading or writing the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unsupported catalog version {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid catalog entry: {0}")]
    InvalidEntry(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

// ============================================================================
// Schema
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<DemonstrationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemonstrationRecord {
    pub id: Uuid,
    pub app_identifier: String,
    pub command: String,
    pub created_at: DateTime<Utc>,
    /// Last lookup distance. Written for completeness, stale on reload.
    pub match_distance: i64,
    pub actions: Vec<ActionRecord>,
    pub output_selections: Vec<SelectionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub kind: String,
    pub text: String,
    pub content_label: String,
    pub x: i64,
    pub y: i64,
    pub recorded_at: i64,
    pub special_case: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl From<&PlaybackAction> for ActionRecord {
    fn from(action: &PlaybackAction) -> Self {
        let (x, y) = action
            .position
            .map_or((UNSET, UNSET), |p| (i64::from(p.x), i64::from(p.y)));
        Self {
            kind: action.kind.as_str().to_string(),
            text: action.text.clone().unwrap_or_default(),
            content_label: action.content_label.clone().unwrap_or_default(),
            x,
            y,
            recorded_at: action.recorded_at.unwrap_or(UNSET),
            special_case: action.special_case.as_str().to_string(),
        }
    }
}

impl TryFrom<ActionRecord> for PlaybackAction {
    type Error = CatalogError;

    fn try_from(record: ActionRecord) -> CatalogResult<Self> {
        let kind = ActionKind::parse(&record.kind)
            .ok_or_else(|| CatalogError::InvalidEntry(format!("unknown action kind {:?}", record.kind)))?;
        let special_case = SpecialCase::parse(&record.special_case).ok_or_else(|| {
            CatalogError::InvalidEntry(format!("unknown special case {:?}", record.special_case))
        })?;

        // Only the (-1, -1) pair marks an unknown position.
        let position = if record.x == UNSET && record.y == UNSET {
            None
        } else {
            let x = i32::try_from(record.x)
                .map_err(|_| CatalogError::InvalidEntry(format!("x out of range: {}", record.x)))?;
            let y = i32::try_from(record.y)
                .map_err(|_| CatalogError::InvalidEntry(format!("y out of range: {}", record.y)))?;
            Some(Point::new(x, y))
        };

        Ok(PlaybackAction {
            kind,
            text: Some(record.text).filter(|t| !t.is_empty()),
            content_label: Some(record.content_label).filter(|l| !l.is_empty()),
            position,
            recorded_at: (record.recorded_at != UNSET).then_some(record.recorded_at),
            special_case,
        })
    }
}

impl From<&Demonstration> for DemonstrationRecord {
    fn from(demonstration: &Demonstration) -> Self {
        Self {
            id: demonstration.id,
            app_identifier: demonstration.app_identifier.clone(),
            command: demonstration.command.clone(),
            created_at: demonstration.created_at,
            match_distance: demonstration
                .match_distance
                .and_then(|d| i64::try_from(d).ok())
                .unwrap_or(UNSET),
            actions: demonstration.actions.iter().map(ActionRecord::from).collect(),
            output_selections: demonstration
                .output_selections
                .iter()
                .map(|s| {
                    let rect = s.rect();
                    SelectionRecord {
                        left: rect.left,
                        top: rect.top,
                        right: rect.right,
                        bottom: rect.bottom,
                    }
                })
                .collect(),
        }
    }
}

impl TryFrom<DemonstrationRecord> for Demonstration {
    type Error = CatalogError;

    fn try_from(record: DemonstrationRecord) -> CatalogResult<Self> {
        let actions = record
            .actions
            .into_iter()
            .map(PlaybackAction::try_from)
            .collect::<CatalogResult<Vec<_>>>()?;

        Ok(Demonstration {
            id: record.id,
            command: record.command,
            app_identifier: record.app_identifier,
            actions,
            output_selections: record
                .output_selections
                .into_iter()
                .map(|s| OutputSelection::from_rect(Rect::new(s.left, s.top, s.right, s.bottom)))
                .collect(),
            created_at: record.created_at,
            match_distance: None,
        })
    }
}

/// Flatten a catalog into its persisted form.
pub fn encode(catalog: &DemonstrationCatalog) -> CatalogFile {
    CatalogFile {
        version: SCHEMA_VERSION,
        saved_at: Utc::now(),
        entries: catalog.iter().map(DemonstrationRecord::from).collect(),
    }
}

/// Rebuild a catalog from its persisted form.
pub fn decode(file: CatalogFile) -> CatalogResult<DemonstrationCatalog> {
    if file.version != SCHEMA_VERSION {
        return Err(CatalogError::UnsupportedVersion(file.version));
    }
    let demonstrations = file
        .entries
        .into_iter()
        .map(Demonstration::try_from)
        .collect::<CatalogResult<Vec<_>>>()?;
    Ok(DemonstrationCatalog::from_demonstrations(demonstrations))
}

// ============================================================================
// CatalogStore
// ============================================================================

/// Reads and writes the catalog file.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the catalog, reporting any failure.
    pub fn try_load(&self) -> CatalogResult<DemonstrationCatalog> {
        let content = std::fs::read_to_string(&self.path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        decode(file)
    }

    /// Load the catalog. Missing, unreadable or corrupt content yields an
    /// empty catalog.
    pub fn load(&self) -> DemonstrationCatalog {
        match self.try_load() {
            Ok(catalog) => {
                info!("Loaded {} demonstration(s) from {:?}", catalog.len(), self.path);
                catalog
            }
            Err(CatalogError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No catalog at {:?}, starting empty", self.path);
                DemonstrationCatalog::new()
            }
            Err(e) => {
                warn!("Could not load catalog from {:?}: {}. Starting empty", self.path, e);
                DemonstrationCatalog::new()
            }
        }
    }

    /// Write the whole catalog, replacing the previous file atomically.
    pub fn save(&self, catalog: &DemonstrationCatalog) -> CatalogResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&encode(catalog))?;
        let temp = self.temp_path();
        std::fs::write(&temp, json)?;
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!("Saved {} demonstration(s) to {:?}", catalog.len(), self.path);
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> DemonstrationCatalog {
        DemonstrationCatalog::from_demonstrations([
            Demonstration::new("com.example.notes")
                .with_command("save note")
                .with_action(
                    PlaybackAction::new(ActionKind::Activation)
                        .with_position(Point::new(10, 50))
                        .with_recorded_at(1_000),
                )
                .with_action(
                    PlaybackAction::new(ActionKind::Activation)
                        .with_text("Save")
                        .with_position(Point::new(200, 300))
                        .with_recorded_at(2_000),
                )
                .with_output_selection(OutputSelection::new(Point::new(0, 0), Point::new(500, 80))),
            Demonstration::new("com.example.notes").with_command("discard"),
            Demonstration::new("com.android.settings")
                .with_command("bluetooth")
                .with_action(
                    PlaybackAction::new(ActionKind::Activation)
                        .with_text("Bluetooth")
                        .with_content_label("Toggle bluetooth")
                        .with_special_case(SpecialCase::ToggleWidget),
                ),
        ])
    }

    #[test]
    fn test_save_then_load_preserves_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("data").join("catalog.json"));

        let mut catalog = sample_catalog();
        let looked_up = catalog.find_best_match("save", "com.example.notes").unwrap();
        catalog.add(looked_up);

        store.save(&catalog).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, catalog);
        assert!(loaded.iter().all(|d| d.match_distance.is_none()));
        assert!(!dir.path().join("data").join(".catalog.json.tmp").exists());
    }

    #[test]
    fn test_sentinels_in_file() {
        let file = encode(&sample_catalog());
        assert_eq!(file.version, SCHEMA_VERSION);
        let bluetooth = file
            .entries
            .iter()
            .find(|e| e.command == "bluetooth")
            .unwrap();
        assert_eq!(bluetooth.actions[0].x, -1);
        assert_eq!(bluetooth.actions[0].recorded_at, -1);
        assert_eq!(bluetooth.actions[0].special_case, "toggle_widget");
        assert_eq!(bluetooth.match_distance, -1);
    }

    #[test]
    fn test_single_negative_coordinate_is_kept() {
        let action = PlaybackAction::new(ActionKind::Activation).with_position(Point::new(-1, 40));
        let decoded = PlaybackAction::try_from(ActionRecord::from(&action)).unwrap();
        assert_eq!(decoded.position, Some(Point::new(-1, 40)));

        let unset = PlaybackAction::try_from(ActionRecord::from(&PlaybackAction::new(ActionKind::Activation))).unwrap();
        assert_eq!(unset.position, None);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_empty());
        assert!(store.try_load().is_err());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = CatalogStore::new(&path);
        assert!(store.load().is_empty());
        assert!(matches!(store.try_load(), Err(CatalogError::SerializationError(_))));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut file = encode(&sample_catalog());
        file.version = 7;
        assert!(matches!(decode(file), Err(CatalogError::UnsupportedVersion(7))));
    }

    #[test]
    fn test_unknown_special_case_is_rejected() {
        let mut file = encode(&sample_catalog());
        file.entries[0].actions.push(ActionRecord {
            kind: "activation".to_string(),
            text: String::new(),
            content_label: String::new(),
            x: 1,
            y: 1,
            recorded_at: UNSET,
            special_case: "spinner".to_string(),
        });
        assert!(matches!(decode(file), Err(CatalogError::InvalidEntry(_))));
    }

    #[test]
    fn test_save_failure_leaves_catalog_usable() {
        let dir = tempfile::tempdir().unwrap();
        // The target path is a directory, so the final rename fails.
        let target = dir.path().join("catalog.json");
        std::fs::create_dir_all(target.join("occupied")).unwrap();
        let store = CatalogStore::new(&target);

        let catalog = sample_catalog();
        assert!(store.save(&catalog).is_err());
        assert_eq!(catalog.len(), 3);
        assert!(!dir.path().join(".catalog.json.tmp").exists());
    }
}
