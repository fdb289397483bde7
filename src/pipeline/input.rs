//! Input resolution: normalise a user-supplied path, URL or byte buffer to a
//! local PDF file.
//!
//! pdfium needs a file-system path, so URLs and uploaded bytes are written to
//! temporary files that are removed when the [`ResolvedInput`] is dropped.
//! Every route checks the `%PDF` magic bytes before returning.

use crate::error::McqGenError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// The resolved input: a local path, or a temp file that lives as long as this value.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; PDF downloaded to a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// Input was an in-memory buffer.
    Buffered(NamedTempFile),
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
            ResolvedInput::Buffered(file) => file.path(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Clean a path typed or pasted by a user: surrounding quotes are stripped
/// and backslashes become forward slashes.
pub fn clean_path_argument(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .replace('\\', "/")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, McqGenError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Write `bytes` to a managed temp file after checking they are a PDF.
pub fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, McqGenError> {
    let mut tmp = NamedTempFile::new().map_err(|e| McqGenError::Internal(format!("tempfile: {e}")))?;
    if let Some(magic) = bad_magic(bytes) {
        return Err(McqGenError::NotAPdf {
            path: tmp.path().to_path_buf(),
            magic,
        });
    }
    tmp.write_all(bytes)
        .map_err(|e| McqGenError::Internal(format!("tempfile write: {e}")))?;
    debug!("Buffered {} bytes to {}", bytes.len(), tmp.path().display());
    Ok(ResolvedInput::Buffered(tmp))
}

/// `Some(first four bytes)` when `bytes` do not start with `%PDF`.
fn bad_magic(bytes: &[u8]) -> Option<[u8; 4]> {
    if bytes.starts_with(PDF_MAGIC) {
        return None;
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Some(magic)
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, McqGenError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(McqGenError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
                return Err(McqGenError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(McqGenError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(McqGenError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, McqGenError> {
    info!("Downloading PDF from: {}", url);

    let download_failed = |reason: String| McqGenError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| download_failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            McqGenError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            download_failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(download_failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| McqGenError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_failed(e.to_string()))?;

    if let Some(magic) = bad_magic(&bytes) {
        return Err(McqGenError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| McqGenError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment when it looks like a file name, else `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

/// Short display name for logs and errors.
pub fn source_name(input: &str) -> String {
    if is_url(input) {
        return filename_from_url(input);
    }
    Path::new(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn path_argument_cleanup() {
        assert_eq!(clean_path_argument("\"C:\\docs\\paper.pdf\""), "C:/docs/paper.pdf");
        assert_eq!(clean_path_argument("  'notes.pdf' \n"), "notes.pdf");
        assert_eq!(clean_path_argument("/tmp/a b.pdf"), "/tmp/a b.pdf");
    }

    #[test]
    fn filename_from_url_variants() {
        assert_eq!(filename_from_url("https://x.org/papers/paging.pdf"), "paging.pdf");
        assert_eq!(filename_from_url("https://x.org/download"), "downloaded.pdf");
        assert_eq!(filename_from_url("https://x.org/"), "downloaded.pdf");
    }

    #[test]
    fn source_name_variants() {
        assert_eq!(source_name("/data/in/os.pdf"), "os.pdf");
        assert_eq!(source_name("https://x.org/a/b.pdf"), "b.pdf");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local("/definitely/not/here.pdf").err().unwrap();
        assert!(matches!(err, McqGenError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"hello world").unwrap();
        let err = resolve_local(path.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, McqGenError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn pdf_bytes_are_buffered() {
        let resolved = resolve_bytes(b"%PDF-1.7\n...").unwrap();
        assert!(resolved.path().exists());
        assert_eq!(std::fs::read(resolved.path()).unwrap(), b"%PDF-1.7\n...");
    }

    #[test]
    fn non_pdf_bytes_are_rejected() {
        let err = resolve_bytes(b"PK").err().unwrap();
        assert!(matches!(err, McqGenError::NotAPdf { magic, .. } if magic == [b'P', b'K', 0, 0]));
    }
}
