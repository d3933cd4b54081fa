//! Images submitted for recognition and the tasks built from them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Content types the recognizer accepts.
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Returns true if `content_type` is an accepted image type.
pub fn is_supported_content_type(content_type: &str) -> bool {
    SUPPORTED_CONTENT_TYPES.contains(&content_type)
}

/// Guess a content type from a file extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Where the image bytes live until a worker reads them.
#[derive(Clone)]
pub enum ImagePayload {
    Memory(Arc<[u8]>),
    File(PathBuf),
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImagePayload::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            ImagePayload::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// An uploaded image: a byte handle plus the metadata declared with it.
///
/// `content_type` and `size` are what the uploader claimed; they are checked
/// before the bytes are read.
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub payload: ImagePayload,
}

impl ImageSource {
    /// Image held in memory; the declared size is the buffer length.
    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: bytes.len() as u64,
            payload: ImagePayload::Memory(bytes),
        }
    }

    /// Image on disk, read lazily by the worker that processes it.
    pub fn from_file(
        path: impl Into<PathBuf>,
        content_type: impl Into<String>,
        size: u64,
    ) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file_name,
            content_type: content_type.into(),
            size,
            payload: ImagePayload::File(path),
        }
    }

    /// Override the declared size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Path used to refer to the image once persisted.
    pub fn image_path(&self) -> String {
        match &self.payload {
            ImagePayload::File(path) => path.to_string_lossy().into_owned(),
            ImagePayload::Memory(_) => self.file_name.clone(),
        }
    }

    /// Load the image bytes.
    pub async fn read(&self) -> std::io::Result<Arc<[u8]>> {
        match &self.payload {
            ImagePayload::Memory(bytes) => Ok(bytes.clone()),
            ImagePayload::File(path) => Ok(tokio::fs::read(path).await?.into()),
        }
    }
}

/// One unit of work for the pool.
#[derive(Debug, Clone)]
pub struct RecognitionTask {
    /// Position in the submitted batch; only used to place the outcome.
    pub index: usize,
    pub image: ImageSource,
    /// Shared by every task of a batch.
    pub prompt: Arc<str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_content_types() {
        assert!(is_supported_content_type("image/png"));
        assert!(is_supported_content_type("image/jpg"));
        assert!(!is_supported_content_type("application/pdf"));
        assert!(!is_supported_content_type("IMAGE/PNG"));
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("a/receipt.JPG")), "image/jpeg");
        assert_eq!(content_type_for_path(Path::new("x.webp")), "image/webp");
        assert_eq!(content_type_for_path(Path::new("scan.pdf")), "application/pdf");
        assert_eq!(content_type_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_read_memory_and_missing_file() {
        let image = ImageSource::from_bytes("a.png", "image/png", vec![1u8, 2, 3]);
        assert_eq!(image.size, 3);
        assert_eq!(&*image.read().await.unwrap(), &[1, 2, 3]);
        assert_eq!(image.image_path(), "a.png");

        let missing = ImageSource::from_file("/nonexistent/dir/b.png", "image/png", 10);
        assert_eq!(missing.file_name, "b.png");
        assert!(missing.read().await.is_err());
    }
}
