//! Configuration store: reads/writes the gateway's persisted settings.
//!
//! Active settings live in `<data_dir>/settings.toml`; named profiles are
//! snapshots under `<data_dir>/profiles/<name>.toml`. Every mutation is
//! persisted immediately so a restart comes back with the last-known
//! configuration.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use spraygate_types::{
    GatewayError, MaintenanceSettings, PatternSettings, ProfileInfo, Settings, Side, Speeds,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SETTINGS_FILE: &str = "settings.toml";
const PROFILES_DIR: &str = "profiles";

/// One saved profile on disk: metadata plus a full settings snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    info: ProfileInfo,
    settings: Settings,
}

/// Persistent configuration collaborator consumed by the command gateway.
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    settings: Settings,
}

impl ConfigStore {
    /// Open the store rooted at `dir`, loading `settings.toml` when present
    /// and falling back to defaults otherwise.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        let dir = dir.into();
        let path = dir.join(SETTINGS_FILE);
        let settings = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| {
                GatewayError::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            toml::from_str(&raw)
                .map_err(|e| GatewayError::Config(format!("failed to parse settings: {e}")))?
        } else {
            debug!(path = %path.display(), "no settings file, using defaults");
            Settings::default()
        };
        Ok(Self { dir, settings })
    }

    /// The currently active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn speeds(&self) -> &Speeds {
        &self.settings.speeds
    }

    pub fn maintenance(&self) -> &MaintenanceSettings {
        &self.settings.maintenance
    }

    pub fn pattern(&self) -> &PatternSettings {
        &self.settings.pattern
    }

    /// Update one side's painting speed and persist.
    pub fn update_speed(&mut self, side: Side, value: f64) -> Result<(), GatewayError> {
        self.settings.speeds.set(side, value);
        self.persist()
    }

    pub fn update_speeds(&mut self, speeds: Speeds) -> Result<(), GatewayError> {
        self.settings.speeds = speeds;
        self.persist()
    }

    pub fn update_maintenance(
        &mut self,
        maintenance: MaintenanceSettings,
    ) -> Result<(), GatewayError> {
        self.settings.maintenance = maintenance;
        self.persist()
    }

    pub fn update_pattern(&mut self, pattern: PatternSettings) -> Result<(), GatewayError> {
        self.settings.pattern = pattern;
        self.persist()
    }

    /// Replace the full settings document and persist.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), GatewayError> {
        self.settings = settings;
        self.persist()
    }

    // ── Named profiles ──────────────────────────────────────────────────────

    /// Snapshot the active settings under `name`. Overwrites an existing
    /// profile with the same name.
    pub fn save_profile(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<ProfileInfo, GatewayError> {
        let file = self.profile_path(name)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GatewayError::Config(format!("failed to create profile directory: {e}"))
            })?;
        }
        let info = ProfileInfo {
            name: name.to_string(),
            description: description.unwrap_or_default().to_string(),
            saved_at: Utc::now(),
        };
        let profile = Profile {
            info: info.clone(),
            settings: self.settings.clone(),
        };
        let raw = toml::to_string_pretty(&profile)
            .map_err(|e| GatewayError::Config(format!("failed to serialize profile: {e}")))?;
        fs::write(&file, raw).map_err(|e| {
            GatewayError::Config(format!("failed to write {}: {e}", file.display()))
        })?;
        info!(name, "configuration profile saved");
        Ok(info)
    }

    /// Load the named profile, make it the active settings, and persist.
    pub fn load_profile(&mut self, name: &str) -> Result<&Settings, GatewayError> {
        let file = self.profile_path(name)?;
        let raw = fs::read_to_string(&file)
            .map_err(|e| GatewayError::Config(format!("no such profile '{name}': {e}")))?;
        let profile: Profile = toml::from_str(&raw)
            .map_err(|e| GatewayError::Config(format!("failed to parse profile '{name}': {e}")))?;
        self.settings = profile.settings;
        self.persist()?;
        info!(name, "configuration profile loaded");
        Ok(&self.settings)
    }

    /// List all saved profiles, sorted by name. Unparseable files are
    /// skipped.
    pub fn list_profiles(&self) -> Result<Vec<ProfileInfo>, GatewayError> {
        let dir = self.dir.join(PROFILES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|e| {
            GatewayError::Config(format!("failed to read {}: {e}", dir.display()))
        })?;
        let mut profiles = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            match fs::read_to_string(&path)
                .ok()
                .and_then(|raw| toml::from_str::<Profile>(&raw).ok())
            {
                Some(profile) => profiles.push(profile.info),
                None => debug!(path = %path.display(), "skipping unreadable profile"),
            }
        }
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    // ── Internal helpers ────────────────────────────────────────────────────

    fn profile_path(&self, name: &str) -> Result<PathBuf, GatewayError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ' ')
        {
            return Err(GatewayError::Config(format!(
                "invalid profile name '{name}'"
            )));
        }
        Ok(self.dir.join(PROFILES_DIR).join(format!("{name}.toml")))
    }

    fn persist(&self) -> Result<(), GatewayError> {
        persist_to(&self.settings, &self.dir)
    }
}

/// Write `settings` to `<dir>/settings.toml`, creating `dir` if necessary.
fn persist_to(settings: &Settings, dir: &Path) -> Result<(), GatewayError> {
    fs::create_dir_all(dir)
        .map_err(|e| GatewayError::Config(format!("failed to create {}: {e}", dir.display())))?;
    let raw = toml::to_string_pretty(settings)
        .map_err(|e| GatewayError::Config(format!("failed to serialize settings: {e}")))?;
    let path = dir.join(SETTINGS_FILE);
    fs::write(&path, raw)
        .map_err(|e| GatewayError::Config(format!("failed to write {}: {e}", path.display())))
}
