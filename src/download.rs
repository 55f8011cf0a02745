//! Result retrieval: pick a source per variant and write it to disk.
//!
//! A completed task may carry an object-storage `access_url` per variant.
//! When [`ClientConfig::prefer_storage_download`](crate::ClientConfig) is
//! set, that URL is fetched directly and the API download endpoint is only
//! used as a fallback.
//!
//! Files are written atomically (temp file in the target directory, then
//! rename) as `translated_<variant>_<task_id>.pdf`, so an interrupted
//! download never leaves a truncated PDF behind.

use crate::api::{TaskId, TaskResult, TranslateApi, Variant};
use crate::error::{ClientError, ValidationError};
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a variant's bytes will be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// Direct object-storage URL.
    Storage(String),
    /// `GET /api/task/{id}/download/{variant}`.
    Api,
}

/// What happened to one variant in [`download_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(PathBuf),
    /// The server did not produce this variant.
    NotGenerated,
}

pub fn resolve_source(
    result: Option<&TaskResult>,
    variant: Variant,
    prefer_storage: bool,
) -> DownloadSource {
    match result.and_then(|r| r.storage_url(variant)) {
        Some(url) if prefer_storage => DownloadSource::Storage(url.to_string()),
        _ => DownloadSource::Api,
    }
}

/// File name used for a downloaded variant.
pub fn output_filename(task_id: &TaskId, variant: Variant) -> String {
    format!("translated_{variant}_{task_id}.pdf")
}

/// Fetch one variant's bytes.
///
/// A failed storage fetch falls back to the API endpoint once.
pub async fn fetch(
    api: &dyn TranslateApi,
    task_id: &TaskId,
    result: Option<&TaskResult>,
    variant: Variant,
    prefer_storage: bool,
) -> Result<Bytes, ClientError> {
    if let Some(r) = result {
        if !r.has(variant) {
            return Err(ValidationError::OutputUnavailable {
                variant: variant.to_string(),
            }
            .into());
        }
    }

    match resolve_source(result, variant, prefer_storage) {
        DownloadSource::Storage(url) => {
            debug!("Fetching {} output of {} from storage", variant, task_id);
            match api.fetch_url(&url).await {
                Ok(bytes) => Ok(bytes),
                Err(e) => {
                    warn!("Storage download of {} failed ({}); using the API", variant, e);
                    api.download(task_id, variant).await
                }
            }
        }
        DownloadSource::Api => api.download(task_id, variant).await,
    }
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub async fn write_atomic(path: &Path, bytes: Bytes) -> Result<(), ClientError> {
    let write_failed = |source: std::io::Error| ClientError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await.map_err(write_failed)?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".pdftranslate-")
            .suffix(".part")
            .tempfile_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| ClientError::Internal(format!("write task panicked: {e}")))?
    .map_err(write_failed)
}

/// Download one variant into `dir`; returns the written path.
pub async fn download_to_dir(
    api: &dyn TranslateApi,
    task_id: &TaskId,
    result: Option<&TaskResult>,
    variant: Variant,
    dir: &Path,
    prefer_storage: bool,
) -> Result<PathBuf, ClientError> {
    let bytes = fetch(api, task_id, result, variant, prefer_storage).await?;
    let path = dir.join(output_filename(task_id, variant));
    let len = bytes.len();
    write_atomic(&path, bytes).await?;
    info!("Saved {} output ({} bytes) to {}", variant, len, path.display());
    Ok(path)
}

/// Download every variant. A variant the server did not generate (absent
/// from `result`, or a 404 from the API) is reported as
/// [`DownloadOutcome::NotGenerated`] rather than failing the whole call.
pub async fn download_all(
    api: &dyn TranslateApi,
    task_id: &TaskId,
    result: Option<&TaskResult>,
    dir: &Path,
    prefer_storage: bool,
) -> Result<Vec<(Variant, DownloadOutcome)>, ClientError> {
    let mut outcomes = Vec::with_capacity(Variant::ALL.len());
    for variant in Variant::ALL {
        let outcome = match download_to_dir(api, task_id, result, variant, dir, prefer_storage).await {
            Ok(path) => DownloadOutcome::Saved(path),
            Err(ClientError::Validation(ValidationError::OutputUnavailable { .. })) => {
                DownloadOutcome::NotGenerated
            }
            Err(e) if e.status() == Some(404) => DownloadOutcome::NotGenerated,
            Err(e) => return Err(e),
        };
        outcomes.push((variant, outcome));
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StorageDescriptor;

    fn result_with_storage() -> TaskResult {
        let mut r = TaskResult {
            mono_pdf_path: Some("out/doc.mono.pdf".into()),
            dual_pdf_path: Some("out/doc.dual.pdf".into()),
            ..Default::default()
        };
        r.storage.insert(
            Variant::Dual,
            StorageDescriptor {
                access_url: "https://cdn.example.com/dual.pdf".into(),
                file_hash: None,
                storage_key: None,
                access_expires_at: None,
            },
        );
        r
    }

    #[test]
    fn storage_preferred_only_when_enabled_and_present() {
        let r = result_with_storage();
        assert_eq!(
            resolve_source(Some(&r), Variant::Dual, true),
            DownloadSource::Storage("https://cdn.example.com/dual.pdf".into())
        );
        assert_eq!(resolve_source(Some(&r), Variant::Dual, false), DownloadSource::Api);
        assert_eq!(resolve_source(Some(&r), Variant::Mono, true), DownloadSource::Api);
        assert_eq!(resolve_source(None, Variant::Mono, true), DownloadSource::Api);
    }

    #[test]
    fn filename_pattern() {
        assert_eq!(
            output_filename(&TaskId("T1".into()), Variant::Mono),
            "translated_mono_T1.pdf"
        );
    }

    #[tokio::test]
    async fn atomic_write_leaves_only_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.pdf");
        write_atomic(&path, Bytes::from_static(b"%PDF-1.7")).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1, "temp file must be renamed away");
    }

    #[test]
    fn atomic_write_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("out.pdf");

        let err = tokio_test::block_on(write_atomic(&path, Bytes::from_static(b"x"))).unwrap_err();
        match err {
            ClientError::OutputWriteFailed { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
