//! Upload controller: validate a selected file locally, then send it.
//!
//! Validation happens entirely on the client: a file whose name does not end
//! in `.pdf` (any case) or whose size exceeds the configured limit is
//! rejected with a [`ValidationError`] before a request is built. Server
//! rejections surface the server's `detail` verbatim and are never retried.

use crate::api::{FileHandle, TranslateApi};
use crate::error::{ClientError, ValidationError};
use crate::session::SessionState;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Streamed from disk at upload time.
    Path(PathBuf),
    /// Already in memory (drag-and-drop, tests).
    Bytes(Bytes),
}

/// A file accepted by the user and not yet uploaded.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub size: u64,
    pub source: FileSource,
}

impl UploadedFile {
    /// Select a file from disk, reading its name and size.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|e| ValidationError::FileUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !meta.is_file() {
            return Err(ValidationError::FileUnreadable {
                path: path.to_path_buf(),
                reason: "not a regular file".into(),
            });
        }
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            filename,
            size: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Select an in-memory file.
    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            filename: filename.into(),
            size: bytes.len() as u64,
            source: FileSource::Bytes(bytes),
        }
    }

    /// Check extension and size against `max_bytes`.
    pub fn validate(&self, max_bytes: u64) -> Result<(), ValidationError> {
        if !has_pdf_extension(&self.filename) {
            return Err(ValidationError::NotAPdf {
                filename: self.filename.clone(),
            });
        }
        if self.size > max_bytes {
            return Err(ValidationError::FileTooLarge {
                size: self.size,
                limit: max_bytes,
            });
        }
        Ok(())
    }
}

/// Case-insensitive `.pdf` suffix check on the file name.
pub fn has_pdf_extension(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

/// Validate and upload `file`, storing the resulting handle in `session`.
///
/// Issues exactly one request on success or server rejection and none on
/// validation failure. The previous file handle (if any) is discarded only
/// once the new one has been issued.
pub async fn submit_upload(
    api: &dyn TranslateApi,
    session: &mut SessionState,
    file: UploadedFile,
    max_bytes: u64,
) -> Result<FileHandle, ClientError> {
    file.validate(max_bytes)?;
    debug!("Uploading '{}' ({} bytes)", file.filename, file.size);

    let handle = api.upload(&file).await?;
    info!(
        "Uploaded '{}' as file {} ({} bytes)",
        handle.filename, handle.file_id, handle.size
    );

    session.store_file_handle(file, handle.clone());
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pdf_extension_is_case_insensitive() {
        assert!(has_pdf_extension("doc.pdf"));
        assert!(has_pdf_extension("DOC.PDF"));
        assert!(has_pdf_extension("paper.v2.Pdf"));
        assert!(!has_pdf_extension("doc.docx"));
        assert!(!has_pdf_extension("pdf"));
        assert!(has_pdf_extension(".pdf"));
        assert!(!has_pdf_extension("doc.pdf.txt"));
    }

    #[test]
    fn rejects_oversized_file() {
        let f = UploadedFile::from_bytes("big.pdf", vec![0u8; 11]);
        assert_eq!(
            f.validate(10),
            Err(ValidationError::FileTooLarge { size: 11, limit: 10 })
        );
        assert!(f.validate(11).is_ok());
    }

    #[test]
    fn rejects_wrong_extension_before_size() {
        let f = UploadedFile::from_bytes("report.docx", vec![0u8; 1]);
        assert!(matches!(
            f.validate(100),
            Err(ValidationError::NotAPdf { .. })
        ));
    }

    #[test]
    fn from_path_reads_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.7 test").unwrap();

        let file = UploadedFile::from_path(&path).unwrap();
        assert_eq!(file.filename, "paper.pdf");
        assert_eq!(file.size, 13);
        assert!(matches!(file.source, FileSource::Path(_)));
    }

    #[test]
    fn from_path_missing_file() {
        let err = UploadedFile::from_path("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, ValidationError::FileUnreadable { .. }));
    }
}
