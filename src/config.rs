use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::warn;

const DIRECTORY_FILE: &str = "directory.json";
const SNAPSHOT_FILE: &str = "assignments.snap";

/// Runtime settings, read from `CAPACITY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// Date the utilization report is computed for.
    pub report_date: NaiveDate,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// their default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("CAPACITY_DATA_DIR").unwrap_or_else(|| "./data".into());

        let metrics_port = lookup("CAPACITY_METRICS_PORT").and_then(|raw| match raw.parse::<u16>() {
            Ok(port) => Some(port),
            Err(e) => {
                warn!("ignoring CAPACITY_METRICS_PORT={raw:?}: {e}");
                None
            }
        });

        let report_date = lookup("CAPACITY_REPORT_DATE")
            .and_then(|raw| match raw.parse::<NaiveDate>() {
                Ok(date) => Some(date),
                Err(e) => {
                    warn!("ignoring CAPACITY_REPORT_DATE={raw:?}: {e}");
                    None
                }
            })
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        Self {
            data_dir: PathBuf::from(data_dir),
            metrics_port,
            report_date,
        }
    }

    pub fn directory_path(&self) -> PathBuf {
        self.data_dir.join(DIRECTORY_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }
}
