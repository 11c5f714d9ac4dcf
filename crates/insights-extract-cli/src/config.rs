//! Command-line arguments and their mapping to a [`RunConfig`].

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use insights_extract_core::{PolicyOverride, PolicyTable, RunConfig, TargetDate};
use snafu::OptionExt;

use crate::error::{CliResult, NoArchiveSourceSnafu, NoDefaultDateSnafu};

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "insights-extract",
    about = "Extract one day's rows from an insights snapshot archive into per-category JSON"
)]
pub struct Cli {
    /// Target date (YYYY-MM-DD); defaults to yesterday in local time
    #[arg(long)]
    pub date: Option<TargetDate>,

    /// Read this local archive instead of downloading one (takes precedence over --url)
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Direct-download endpoint; queried with snapshotDate=<date>&format=zip
    #[arg(long, env = "INSIGHTS_URL")]
    pub url: Option<String>,

    #[arg(long, env = "INSIGHTS_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "INSIGHTS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Where downloaded archives are kept as insights_<date>.zip
    #[arg(long, default_value = "Zip_Download")]
    pub download_dir: PathBuf,

    #[arg(long, default_value = "Json_filtered")]
    pub output_dir: PathBuf,

    /// Error document path (default: <output-dir>/error.json)
    #[arg(long)]
    pub error_log: Option<PathBuf>,

    /// Repeatable CATEGORY=COLUMN[:skip-missing] policy override
    #[arg(long = "policy")]
    pub policies: Vec<PolicyOverride>,

    /// HTTP timeout for the download, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Reject downloaded archives larger than this
    #[arg(long, default_value_t = DEFAULT_MAX_ARCHIVE_BYTES)]
    pub max_archive_bytes: u64,
}

/// Where the archive bytes come from.
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    Local(PathBuf),
    Remote(Remote),
}

#[derive(Debug, Clone)]
pub struct Remote {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub download_dir: PathBuf,
    pub timeout_secs: u64,
    pub max_archive_bytes: u64,
}

impl Cli {
    pub fn target_date(&self, today: NaiveDate) -> CliResult<TargetDate> {
        match self.date {
            Some(date) => Ok(date),
            None => TargetDate::day_before(today).context(NoDefaultDateSnafu { today }),
        }
    }

    pub fn archive_source(&self) -> CliResult<ArchiveSource> {
        if let Some(path) = &self.archive {
            return Ok(ArchiveSource::Local(path.clone()));
        }

        let url = self.url.clone().context(NoArchiveSourceSnafu)?;
        Ok(ArchiveSource::Remote(Remote {
            url,
            username: self.username.clone(),
            password: self.password.clone(),
            download_dir: self.download_dir.clone(),
            timeout_secs: self.timeout_secs,
            max_archive_bytes: self.max_archive_bytes,
        }))
    }

    pub fn run_config(&self, target_date: TargetDate) -> RunConfig {
        let mut policies = PolicyTable::default();
        policies.extend(self.policies.iter().cloned());

        let config = RunConfig::new(target_date, &self.output_dir).with_policies(policies);
        match &self.error_log {
            Some(path) => config.with_error_log_path(path),
            None => config,
        }
    }
}
