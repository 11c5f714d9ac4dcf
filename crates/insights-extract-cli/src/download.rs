//! Retrieval of the daily snapshot archive.

use std::time::Duration;

use insights_extract_core::{TargetDate, storage::write_atomic};
use log::info;
use reqwest::Client;
use snafu::{OptionExt, ResultExt, ensure};

use crate::{
    config::Remote,
    error::{
        ArchiveTooLargeSnafu, CliResult, DownloadSnafu, HttpClientSnafu, MissingCredentialsSnafu,
        RequestSnafu, SaveArchiveSnafu,
    },
};

/// File name the archive for `date` is kept under in the download directory.
pub fn archive_file_name(date: TargetDate) -> String {
    format!("insights_{date}.zip")
}

/// Download the snapshot for `date`, keep a copy in the download directory
/// and return its bytes.
pub async fn fetch_archive(remote: &Remote, date: TargetDate) -> CliResult<Vec<u8>> {
    let username = remote.username.as_deref().context(MissingCredentialsSnafu {
        url: remote.url.as_str(),
    })?;
    let password = remote.password.as_deref().context(MissingCredentialsSnafu {
        url: remote.url.as_str(),
    })?;

    let client = Client::builder()
        .timeout(Duration::from_secs(remote.timeout_secs))
        .build()
        .context(HttpClientSnafu)?;

    let date_str = date.to_string();
    info!("downloading snapshot {date_str} from {}", remote.url);

    let mut response = client
        .get(&remote.url)
        .query(&[("snapshotDate", date_str.as_str()), ("format", "zip")])
        .basic_auth(username, Some(password))
        .send()
        .await
        .context(RequestSnafu {
            url: remote.url.as_str(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return DownloadSnafu {
            date: date_str,
            status,
            body,
        }
        .fail();
    }

    let limit = remote.max_archive_bytes;
    if let Some(size) = response.content_length() {
        ensure!(size <= limit, ArchiveTooLargeSnafu { limit, size });
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.context(RequestSnafu {
        url: remote.url.as_str(),
    })? {
        let size = (bytes.len() + chunk.len()) as u64;
        ensure!(size <= limit, ArchiveTooLargeSnafu { limit, size });
        bytes.extend_from_slice(&chunk);
    }

    let path = remote.download_dir.join(archive_file_name(date));
    write_atomic(&path, &bytes).await.context(SaveArchiveSnafu {
        path: path.display().to_string(),
    })?;
    info!("downloaded {} ({} bytes)", path.display(), bytes.len());

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn archive_name_carries_the_date() {
        let date: TargetDate = "2024-03-10".parse().unwrap();
        assert_eq!(archive_file_name(date), "insights_2024-03-10.zip");
    }

    #[tokio::test]
    async fn credentials_are_required_before_any_request() {
        let remote = Remote {
            url: "http://127.0.0.1:9/unused".to_string(),
            username: Some("svc".to_string()),
            password: None,
            download_dir: PathBuf::from("unused"),
            timeout_secs: 1,
            max_archive_bytes: 1,
        };
        let date: TargetDate = "2024-03-10".parse().unwrap();

        let err = fetch_archive(&remote, date).await.unwrap_err();
        assert!(err.to_string().starts_with("Missing credentials"));
    }
}
