use insights_extract_core::{PipelineError, StorageError};
use reqwest::StatusCode;

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Cannot derive a default --date from today ({today}); pass --date explicitly"))]
    NoDefaultDate { today: chrono::NaiveDate },

    #[snafu(display("No archive source: pass --archive PATH or --url URL"))]
    NoArchiveSource,

    #[snafu(display(
        "Missing credentials for {url}. \
         Set --username/--password or INSIGHTS_USERNAME/INSIGHTS_PASSWORD."
    ))]
    MissingCredentials { url: String },

    #[snafu(display("Failed to build HTTP client"))]
    HttpClient { source: reqwest::Error },

    #[snafu(display("Request to {url} failed: {source}"))]
    Request { url: String, source: reqwest::Error },

    #[snafu(display("Failed to download snapshot for {date}: {status} - {body}"))]
    Download {
        date: String,
        status: StatusCode,
        body: String,
    },

    #[snafu(display("Snapshot archive exceeds {limit} bytes (got at least {size})"))]
    ArchiveTooLarge { limit: u64, size: u64 },

    #[snafu(display("Archive not found or not readable: {path}"))]
    ReadArchive {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to save downloaded archive to {path}: {source}"))]
    SaveArchive {
        path: String,
        #[snafu(source(from(StorageError, Box::new)))]
        source: Box<StorageError>,
    },

    #[snafu(display("Extraction failed: {source}"))]
    Pipeline {
        #[snafu(source(from(PipelineError, Box::new)))]
        source: Box<PipelineError>,
    },
}
