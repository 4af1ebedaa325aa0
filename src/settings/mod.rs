//! User settings with shallow-merge updates and JSON import/export
//!
//! The store is shared as `Arc<SettingsStore>`. When opened with a path,
//! every change is written back to that file as pretty JSON.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::types::whale::Confidence;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fa,
    En,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub sound: bool,
    pub desktop: bool,
    pub mobile: bool,
    pub whale_alerts: bool,
    pub signal_alerts: bool,
    pub price_alerts: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            enabled: true,
            sound: true,
            desktop: true,
            mobile: true,
            whale_alerts: true,
            signal_alerts: true,
            price_alerts: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RsiThreshold {
    pub overbought: f64,
    pub oversold: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSettings {
    pub rsi_threshold: RsiThreshold,
    pub whale_min_amount: f64,  // million USD
    pub confidence_level: Confidence,
    pub timeframes: Vec<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            rsi_threshold: RsiThreshold { overbought: 80.0, oversold: 20.0 },
            whale_min_amount: 1.0,
            confidence_level: Confidence::Medium,
            timeframes: ["1m", "5m", "15m", "1h", "4h", "1d"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl AnalysisSettings {
    pub fn whale_min_amount_usd(&self) -> f64 {
        self.whale_min_amount * 1_000_000.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSettings {
    pub max_risk_level: RiskLevel,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    pub position_size: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        RiskSettings {
            max_risk_level: RiskLevel::Medium,
            stop_loss_percent: 2.0,
            take_profit_percent: 5.0,
            position_size: 1000.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiEndpoints {
    pub market: String,
    pub whale: String,
    pub signals: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    pub primary: String,
    pub backup: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    pub enabled: bool,
    pub endpoints: ApiEndpoints,
    pub keys: ApiKeys,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub auto_mode: bool,
    pub refresh_interval: u64,  // ms
    pub theme: Theme,
    pub language: Language,
    pub notifications: NotificationSettings,
    pub analysis: AnalysisSettings,
    pub risk: RiskSettings,
    pub api: ApiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_mode: true,
            refresh_interval: 3000,
            theme: Theme::Dark,
            language: Language::Fa,
            notifications: NotificationSettings::default(),
            analysis: AnalysisSettings::default(),
            risk: RiskSettings::default(),
            api: ApiSettings::default(),
        }
    }
}

/// Top-level fields to replace; sections are replaced whole
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub auto_mode: Option<bool>,
    pub refresh_interval: Option<u64>,
    pub theme: Option<Theme>,
    pub language: Option<Language>,
    pub notifications: Option<NotificationSettings>,
    pub analysis: Option<AnalysisSettings>,
    pub risk: Option<RiskSettings>,
    pub api: Option<ApiSettings>,
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(auto_mode) = patch.auto_mode {
            self.auto_mode = auto_mode;
        }
        if let Some(refresh_interval) = patch.refresh_interval {
            self.refresh_interval = refresh_interval;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(notifications) = patch.notifications {
            self.notifications = notifications;
        }
        if let Some(analysis) = patch.analysis {
            self.analysis = analysis;
        }
        if let Some(risk) = patch.risk {
            self.risk = risk;
        }
        if let Some(api) = patch.api {
            self.api = api;
        }
    }
}

/// Backing file. Writes carry a revision and older ones are skipped.
struct SettingsFile {
    path: PathBuf,
    next_revision: AtomicU64,
    written: Mutex<u64>,
}

impl SettingsFile {
    fn new(path: PathBuf) -> Self {
        SettingsFile {
            path,
            next_revision: AtomicU64::new(1),
            written: Mutex::new(0),
        }
    }

    fn next_revision(&self) -> u64 {
        self.next_revision.fetch_add(1, Ordering::SeqCst)
    }

    /// Writes via a temp file and rename
    fn write(&self, revision: u64, body: &str) {
        let mut written = self.written.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if revision <= *written {
            return;
        }

        let tmp = self.path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, body).and_then(|_| std::fs::rename(&tmp, &self.path));

        match result {
            Ok(()) => *written = revision,
            Err(e) => tracing::error!(path = %self.path.display(), error = %e, "Failed to persist settings"),
        }
    }
}

pub struct SettingsStore {
    settings: RwLock<Settings>,
    file: Option<Arc<SettingsFile>>,
}

impl SettingsStore {
    pub fn in_memory() -> Self {
        SettingsStore {
            settings: RwLock::new(Settings::default()),
            file: None,
        }
    }

    /// Loads `path` if it exists. An unreadable body falls back to defaults.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let settings = match std::fs::read_to_string(&path) {
            Ok(body) => match serde_json::from_str::<SettingsPatch>(&body) {
                Ok(patch) => {
                    let mut settings = Settings::default();
                    settings.apply(patch);
                    settings
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable settings file");
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(Error::IoError(e)),
        };

        tracing::info!(path = %path.display(), "Settings store opened");
        Ok(SettingsStore {
            settings: RwLock::new(settings),
            file: Some(Arc::new(SettingsFile::new(path))),
        })
    }

    pub fn get(&self) -> Settings {
        self.read().clone()
    }

    /// Shallow merge of the supplied sections
    pub fn set(&self, patch: SettingsPatch) -> Settings {
        let (settings, revision) = {
            let mut settings = self.write();
            settings.apply(patch);
            (settings.clone(), self.file.as_ref().map(|f| f.next_revision()))
        };
        self.persist(&settings, revision);
        settings
    }

    pub fn export_to_string(&self) -> String {
        // Plain structs of strings, numbers and bools always serialize
        serde_json::to_string_pretty(&*self.read()).unwrap_or_default()
    }

    /// Applies an exported document. Failures are logged and leave settings unchanged.
    pub fn import_from_string(&self, json: &str) {
        if let Err(e) = self.try_import(json) {
            tracing::error!(error = %e, "Settings import rejected");
        }
    }

    pub fn try_import(&self, json: &str) -> Result<Settings> {
        let patch: SettingsPatch = serde_json::from_str(json)
            .map_err(|e| Error::SettingsImportError(e.to_string()))?;
        Ok(self.set(patch))
    }

    pub fn reset(&self) -> Settings {
        let (settings, revision) = {
            let mut settings = self.write();
            *settings = Settings::default();
            (settings.clone(), self.file.as_ref().map(|f| f.next_revision()))
        };
        self.persist(&settings, revision);
        tracing::info!("Settings reset to defaults");
        settings
    }

    /// Called after the lock is released. Inside a runtime the write goes to the blocking pool.
    fn persist(&self, settings: &Settings, revision: Option<u64>) {
        let (Some(file), Some(revision)) = (&self.file, revision) else {
            return;
        };

        let body = match serde_json::to_string_pretty(settings) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(path = %file.path.display(), error = %e, "Failed to serialize settings");
                return;
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let file = file.clone();
                runtime.spawn_blocking(move || file.write(revision, &body));
            }
            Err(_) => file.write(revision, &body),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_expectations() {
        let settings = Settings::default();

        assert!(settings.auto_mode);
        assert_eq!(settings.refresh_interval, 3000);
        assert_eq!(settings.analysis.rsi_threshold.overbought, 80.0);
        assert_eq!(settings.analysis.timeframes.len(), 6);
        assert_eq!(settings.analysis.whale_min_amount_usd(), 1_000_000.0);
        assert!(!settings.api.enabled);
    }

    #[test]
    fn set_replaces_only_supplied_sections() {
        let store = SettingsStore::in_memory();
        let mut notifications = NotificationSettings::default();
        notifications.sound = false;

        store.set(SettingsPatch {
            theme: Some(Theme::Light),
            notifications: Some(notifications),
            ..Default::default()
        });

        let settings = store.get();
        assert_eq!(settings.theme, Theme::Light);
        assert!(!settings.notifications.sound);
        assert_eq!(settings.language, Language::Fa);
        assert_eq!(settings.risk, RiskSettings::default());
    }

    #[test]
    fn export_then_import_restores_state() {
        let store = SettingsStore::in_memory();
        store.set(SettingsPatch { refresh_interval: Some(10_000), ..Default::default() });
        let exported = store.export_to_string();

        store.reset();
        assert_eq!(store.get().refresh_interval, 3000);

        store.import_from_string(&exported);
        assert_eq!(store.get().refresh_interval, 10_000);
    }

    #[test]
    fn invalid_import_leaves_settings_unchanged() {
        let store = SettingsStore::in_memory();
        store.set(SettingsPatch { language: Some(Language::En), ..Default::default() });
        let before = store.get();

        store.import_from_string("{ not json");
        store.import_from_string(r#"{"theme": "neon"}"#);

        assert_eq!(store.get(), before);
        assert!(matches!(
            store.try_import("42"),
            Err(Error::SettingsImportError(_))
        ));
    }

    #[test]
    fn partial_import_merges() {
        let store = SettingsStore::in_memory();
        store.import_from_string(r#"{"autoMode": false}"#);

        let settings = store.get();
        assert!(!settings.auto_mode);
        assert_eq!(settings.theme, Theme::Dark);
    }

    #[test]
    fn file_backed_store_persists_changes() {
        let path = std::env::temp_dir().join(format!("whale-pulse-settings-{}.json", uuid::Uuid::new_v4()));

        let store = SettingsStore::open(&path).unwrap();
        store.set(SettingsPatch { theme: Some(Theme::Auto), ..Default::default() });
        drop(store);

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.get().theme, Theme::Auto);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn stale_file_writes_are_skipped() {
        let path = std::env::temp_dir().join(format!("whale-pulse-settings-{}.json", uuid::Uuid::new_v4()));
        let file = SettingsFile::new(path.clone());

        file.write(2, "newer");
        file.write(1, "older");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "newer");
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_inside_runtime_persists_off_the_lock() {
        let path = std::env::temp_dir().join(format!("whale-pulse-settings-{}.json", uuid::Uuid::new_v4()));
        let store = SettingsStore::open(&path).unwrap();

        store.set(SettingsPatch { theme: Some(Theme::Light), ..Default::default() });
        store.set(SettingsPatch { language: Some(Language::En), ..Default::default() });
        // readable while the write is in flight
        assert_eq!(store.get().theme, Theme::Light);

        let mut persisted = None;
        for _ in 0..100 {
            if let Ok(body) = std::fs::read_to_string(&path) {
                let settings: Settings = serde_json::from_str(&body).unwrap();
                if settings.language == Language::En {
                    persisted = Some(settings);
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let persisted = persisted.expect("settings were not written");
        assert_eq!(persisted.theme, Theme::Light);
        std::fs::remove_file(&path).unwrap();
    }
}
