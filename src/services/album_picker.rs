//! Random album picker
//!
//! Looks at the immediate subdirectories of a photo library root, keeps the
//! ones named like `2023-05-trip` (or `2023_05_trip`), picks one at random and
//! derives the attributes the album sensor exposes: year, month, name, local
//! path and the media-source URI a picture frame can load.
//!
//! The picker holds exactly one [SelectionResult]; every [refresh](AlbumPicker::refresh)
//! replaces it wholesale.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::services::manager::{Service, ServiceHealth};

/// Folder names eligible for selection: four digits, separator, two digits,
/// separator, anything. Month and year are deliberately not range-checked.
static ALBUM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-_](\d{2})[-_](.*)$").unwrap());

/// Display name of the sensor
pub const SENSOR_NAME: &str = "Album Select";

/// Stable identifier of the sensor
pub const SENSOR_UNIQUE_ID: &str = "album_select";

/// An album folder whose name matched the year-month pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumCandidate {
    /// Raw directory name, e.g. `2023-05-trip`
    pub folder: String,
    pub year: String,
    pub month: String,
    pub name: String,
}

impl AlbumCandidate {
    /// Parse a directory name. Returns [None] if it doesn't follow `YYYY-MM-<name>`.
    pub fn parse(folder: &str) -> Option<Self> {
        let caps = ALBUM_REGEX.captures(folder)?;
        Some(Self {
            folder: folder.to_string(),
            year: caps[1].to_string(),
            month: caps[2].to_string(),
            name: caps[3].to_string(),
        })
    }
}

/// The album currently exposed by the sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumSelection {
    pub folder: String,
    pub year: String,
    pub month: String,
    pub name: String,
    pub uri: String,
    pub path: String,
}

/// Outcome of the last refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionResult {
    /// Nothing selected: no refresh yet, or the root holds no album folders
    #[default]
    Empty,
    Selected(AlbumSelection),
    /// The root could not be listed
    Failed { error: String },
}

impl SelectionResult {
    /// Sensor state: the selected folder name, if any.
    pub fn state(&self) -> Option<&str> {
        match self {
            SelectionResult::Selected(selection) => Some(&selection.folder),
            _ => None,
        }
    }

    /// Sensor attributes: `year`, `month`, `name`, `uri`, `path` for a
    /// selection, `error` for a failed scan, nothing otherwise.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        match self {
            SelectionResult::Empty => {}
            SelectionResult::Selected(selection) => {
                attrs.insert("year".to_string(), selection.year.clone());
                attrs.insert("month".to_string(), selection.month.clone());
                attrs.insert("name".to_string(), selection.name.clone());
                attrs.insert("uri".to_string(), selection.uri.clone());
                attrs.insert("path".to_string(), selection.path.clone());
            }
            SelectionResult::Failed { error } => {
                attrs.insert("error".to_string(), error.clone());
            }
        }
        attrs
    }
}

/// Serializable view of the sensor, as returned by the HTTP API and `--once`.
#[derive(Debug, Clone, Serialize)]
pub struct AlbumSensor {
    pub name: &'static str,
    pub unique_id: &'static str,
    pub state: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Errors listing the album root
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("No such file or directory: {}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Permission denied: {}", .path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("Failed to list {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl ScanError {
    fn from_walk(path: &Path, source: walkdir::Error) -> Self {
        let path = path.to_path_buf();
        match source.io_error().map(io::Error::kind) {
            Some(io::ErrorKind::NotFound) => ScanError::NotFound { path, source },
            Some(io::ErrorKind::PermissionDenied) => ScanError::AccessDenied { path, source },
            _ => ScanError::Io { path, source },
        }
    }

    /// Missing or unreadable roots end up as an `error` attribute; anything
    /// else is reported to the caller.
    pub fn is_reported_as_attribute(&self) -> bool {
        matches!(self, ScanError::NotFound { .. } | ScanError::AccessDenied { .. })
    }
}

/// List the album folders directly under `root`.
///
/// Symlinks to directories count as directories. Entries that can't be read
/// (e.g. dangling links) and names that aren't valid UTF-8 are skipped.
pub fn scan_candidates(root: &Path) -> Result<Vec<AlbumCandidate>, ScanError> {
    let mut candidates = Vec::new();

    for entry in WalkDir::new(root).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 || e.path() == Some(root) => {
                return Err(ScanError::from_walk(root, e));
            }
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if entry.depth() == 0 {
            if !entry.file_type().is_dir() {
                return Err(ScanError::NotADirectory {
                    path: root.to_path_buf(),
                });
            }
            continue;
        }

        if !entry.file_type().is_dir() {
            continue;
        }

        let Some(folder) = entry.file_name().to_str() else {
            continue;
        };

        if let Some(candidate) = AlbumCandidate::parse(folder) {
            candidates.push(candidate);
        }
    }

    Ok(candidates)
}

/// Rewrite a local path into a media-source URI.
///
/// Only a leading `media_prefix` is substituted (once). Paths outside the
/// media root are returned unchanged.
pub fn media_uri(local_path: &str, media_prefix: &str, uri_prefix: &str) -> String {
    match local_path.strip_prefix(media_prefix) {
        Some(rest) => format!("{}{}", uri_prefix, rest),
        None => local_path.to_string(),
    }
}

/// Album picker configuration
#[derive(Debug, Clone)]
pub struct AlbumPickerConfig {
    /// Directory holding the album folders
    pub root_path: PathBuf,
    /// Virtual root the media prefix is rewritten to
    pub uri_prefix: String,
    /// Local mount root that maps onto `uri_prefix`
    pub media_prefix: String,
}

impl From<&Config> for AlbumPickerConfig {
    fn from(config: &Config) -> Self {
        Self {
            root_path: PathBuf::from(&config.album_path),
            uri_prefix: config.uri_prefix.clone(),
            media_prefix: config.media_prefix.clone(),
        }
    }
}

impl AlbumPickerConfig {
    /// Derive path, URI and attributes for a chosen candidate.
    pub fn selection_for(&self, candidate: &AlbumCandidate) -> AlbumSelection {
        let path = self
            .root_path
            .join(&candidate.folder)
            .to_string_lossy()
            .to_string();
        let uri = media_uri(&path, &self.media_prefix, &self.uri_prefix);

        AlbumSelection {
            folder: candidate.folder.clone(),
            year: candidate.year.clone(),
            month: candidate.month.clone(),
            name: candidate.name.clone(),
            uri,
            path,
        }
    }

    /// Scan the root and pick one album with `rng`. Blocking.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SelectionResult, ScanError> {
        match scan_candidates(&self.root_path) {
            Ok(candidates) => Ok(match candidates.choose(rng) {
                Some(candidate) => SelectionResult::Selected(self.selection_for(candidate)),
                None => SelectionResult::Empty,
            }),
            Err(e) if e.is_reported_as_attribute() => Ok(SelectionResult::Failed {
                error: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

struct PickerState {
    result: SelectionResult,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Picks a random album folder and holds the current selection.
pub struct AlbumPicker {
    config: Arc<AlbumPickerConfig>,
    state: RwLock<PickerState>,
    /// Single permit: at most one directory scan in flight.
    scan_permit: Semaphore,
}

impl AlbumPicker {
    pub fn new(config: AlbumPickerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: RwLock::new(PickerState {
                result: SelectionResult::Empty,
                refreshed_at: None,
            }),
            scan_permit: Semaphore::new(1),
        }
    }

    /// Rescan the root and pick a new album.
    ///
    /// A missing or unreadable root is not an error here: the result becomes
    /// [SelectionResult::Failed]. Other listing failures are returned and the
    /// previous result is kept.
    pub async fn refresh(&self) -> Result<()> {
        let _permit = self
            .scan_permit
            .acquire()
            .await
            .context("album scan permit closed")?;

        let config = self.config.clone();
        let result = tokio::task::spawn_blocking(move || config.pick(&mut rand::thread_rng()))
            .await
            .context("album scan task failed")??;

        match &result {
            SelectionResult::Selected(selection) => {
                info!(folder = %selection.folder, uri = %selection.uri, "Selected album");
            }
            SelectionResult::Empty => {
                debug!(path = %self.config.root_path.display(), "No album folders found");
            }
            SelectionResult::Failed { error } => {
                warn!(path = %self.config.root_path.display(), error = %error, "Album scan failed");
            }
        }

        let mut state = self.state.write();
        state.result = result;
        state.refreshed_at = Some(Utc::now());
        Ok(())
    }

    /// Last computed result
    pub fn current(&self) -> SelectionResult {
        self.state.read().result.clone()
    }

    pub fn current_state(&self) -> Option<String> {
        self.state.read().result.state().map(str::to_string)
    }

    pub fn current_attributes(&self) -> BTreeMap<String, String> {
        self.state.read().result.attributes()
    }

    pub fn snapshot(&self) -> AlbumSensor {
        let state = self.state.read();
        AlbumSensor {
            name: SENSOR_NAME,
            unique_id: SENSOR_UNIQUE_ID,
            state: state.result.state().map(str::to_string),
            attributes: state.result.attributes(),
            refreshed_at: state.refreshed_at,
        }
    }
}

#[async_trait]
impl Service for AlbumPicker {
    fn name(&self) -> &str {
        "album_picker"
    }

    async fn start(&self) -> Result<()> {
        info!(
            service = "album_picker",
            root = %self.config.root_path.display(),
            media_prefix = %self.config.media_prefix,
            uri_prefix = %self.config.uri_prefix,
            "Album picker starting"
        );
        self.refresh()
            .await
            .context("initial album refresh failed")
    }

    async fn stop(&self) -> Result<()> {
        info!(service = "album_picker", "Album picker stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        match &self.state.read().result {
            SelectionResult::Failed { error } => Ok(ServiceHealth::degraded(error.clone())),
            _ => Ok(ServiceHealth::healthy()),
        }
    }
}
