//! TOML configuration and runtime settings resolution.
//!
//! # Responsibility
//! - Parse the optional `packtree.toml` file.
//! - Merge file values with command-line flags into one `Settings` value.
//!
//! # Invariants
//! - Command-line flags (and their env fallbacks) win over file values.
//! - A missing config path means built-in defaults; an unreadable or invalid
//!   file is an error.

use packtree_core::{default_log_level, ExceptionTable, ImportOptions, ReconcileOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOG_DIR_NAME: &str = "logs";

/// Contents of the TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub database: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub reconcile: ReconcileSection,
    pub import: ImportSection,
    pub exceptions: ExceptionTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileSection {
    pub transactional: bool,
    pub recursive: bool,
    pub dedupe_courses: bool,
    pub merge_before_collapse: bool,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        let defaults = ReconcileOptions::default();
        Self {
            transactional: defaults.transactional,
            recursive: defaults.recursive,
            dedupe_courses: defaults.dedupe_courses,
            merge_before_collapse: defaults.merge_before_collapse,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportSection {
    pub root_title: Option<String>,
    pub course_title_suffix: Option<String>,
    /// Pause between phonetic lookups, in milliseconds.
    pub phonetic_delay_ms: Option<u64>,
}

impl CliConfig {
    /// Loads `path`, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
        Self::parse(&text).map_err(|err| format!("invalid config {}: {err}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            recursive: self.reconcile.recursive,
            dedupe_courses: self.reconcile.dedupe_courses,
            transactional: self.reconcile.transactional,
            merge_before_collapse: self.reconcile.merge_before_collapse,
            exceptions: self.exceptions.clone(),
        }
    }

    pub fn import_options(&self) -> ImportOptions {
        let mut options = ImportOptions::default();
        if let Some(root_title) = &self.import.root_title {
            options.root_title = root_title.clone();
        }
        if let Some(suffix) = &self.import.course_title_suffix {
            options.course_title_suffix = suffix.clone();
        }
        options
    }

    /// Configured lookup pause, `None` for the enricher's default.
    pub fn phonetic_delay(&self) -> Option<Duration> {
        self.import.phonetic_delay_ms.map(Duration::from_millis)
    }
}

/// Process-wide settings after merging flags and file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub json: bool,
}

impl Settings {
    pub fn resolve(
        db: Option<PathBuf>,
        log_dir: Option<PathBuf>,
        log_level: Option<String>,
        json: bool,
        config: &CliConfig,
    ) -> Result<Self, String> {
        let db = db.or_else(|| config.database.clone()).ok_or_else(|| {
            "no catalog database given; pass --db, set PACKTREE_DB or `database` in the config"
                .to_string()
        })?;
        let log_dir = log_dir
            .or_else(|| config.log_dir.clone())
            .unwrap_or_else(|| default_log_dir(&db));
        let log_level = log_level
            .or_else(|| config.log_level.clone())
            .unwrap_or_else(|| default_log_level().to_string());

        Ok(Self {
            db,
            log_dir,
            log_level,
            json,
        })
    }
}

fn default_log_dir(db: &Path) -> PathBuf {
    match db.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(LOG_DIR_NAME),
        _ => PathBuf::from(LOG_DIR_NAME),
    }
}
