use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::db::{DbError, PulseDb};
use crate::error::ApiError;
use crate::jobs::JobRunner;
use crate::types::{pulse_home, Config, JobId};

/// Shared server state, handed to every handler as `Arc<AppState>`.
pub struct AppState {
    pub config: Config,
    pub db: Mutex<PulseDb>,
    pub token_secret: Vec<u8>,
    pub jobs: JobRunner,
    pub last_scheduled_run: Mutex<HashMap<JobId, DateTime<Utc>>>,
}

impl AppState {
    /// Open the configured database and build the state around it.
    pub fn new(config: Config) -> Result<Self, DbError> {
        let db = PulseDb::open(config.database_path.as_deref())?;
        Ok(Self::with_db_handle(config, db))
    }

    pub fn with_db_handle(config: Config, db: PulseDb) -> Self {
        let token_secret = match config.token_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
            _ => {
                log::warn!("No tokenSecret configured; generated an ephemeral signing key");
                format!(
                    "{}{}",
                    uuid::Uuid::new_v4().simple(),
                    uuid::Uuid::new_v4().simple()
                )
                .into_bytes()
            }
        };
        Self {
            config,
            db: Mutex::new(db),
            token_secret,
            jobs: JobRunner::with_default_jobs(),
            last_scheduled_run: Mutex::new(HashMap::new()),
        }
    }

    /// Run store work on the blocking pool while holding the connection.
    pub async fn with_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&PulseDb) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let db = state.db.lock();
            f(&db)
        })
        .await?
    }

    /// Record when a scheduled run last occurred
    pub fn set_last_scheduled_run(&self, job: JobId, time: DateTime<Utc>) {
        self.last_scheduled_run.lock().insert(job, time);
    }

    /// Get when a job last ran on schedule
    pub fn get_last_scheduled_run(&self, job: JobId) -> Option<DateTime<Utc>> {
        self.last_scheduled_run.lock().get(&job).cloned()
    }
}

/// Config file location: `$PULSE_CONFIG`, else `~/.pulse/config.json`.
pub fn config_path() -> PathBuf {
    std::env::var_os("PULSE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| pulse_home().join("config.json"))
}

/// Load configuration; a missing file yields defaults. Environment
/// overrides are applied last.
pub fn load_config() -> Result<Config, String> {
    let path = config_path();
    let mut config = if path.exists() {
        let content =
            fs::read_to_string(&path).map_err(|e| format!("Failed to read config: {}", e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Config::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Apply `PULSE_PORT`, `PULSE_DB_PATH` and `PULSE_TOKEN_SECRET`.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), String> {
    if let Some(port) = lookup("PULSE_PORT") {
        config.port = port
            .trim()
            .parse()
            .map_err(|_| format!("Invalid PULSE_PORT: {}", port))?;
    }
    if let Some(path) = lookup("PULSE_DB_PATH").filter(|p| !p.trim().is_empty()) {
        config.database_path = Some(PathBuf::from(path));
    }
    if let Some(secret) = lookup("PULSE_TOKEN_SECRET").filter(|s| !s.is_empty()) {
        config.token_secret = Some(secret);
    }
    Ok(())
}

#[cfg(test)]
pub mod test_state {
    use super::*;
    use crate::db::test_utils::test_db;

    /// State over a fresh temp database with a fixed token secret and
    /// report/upload directories inside a leaked temp dir.
    pub fn test_app_state() -> Arc<AppState> {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Config {
            token_secret: Some("test-secret".into()),
            report_dir: dir.path().join("reports"),
            upload_dir: dir.path().join("uploads"),
            ..Config::default()
        };
        std::mem::forget(dir);
        Arc::new(AppState::with_db_handle(config, test_db()))
    }
}
