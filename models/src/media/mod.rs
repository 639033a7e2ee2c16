pub mod builder;

use std::path::{Path, PathBuf};

/// Read-only view over an uploaded attachment.
///
/// The bytes stay on disk; the backend reads them from `source` at send time.
/// Build through [`builder::MediaPayloadBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub(crate) mime_type: String,
    pub(crate) size_bytes: u64,
    pub(crate) file_name: String,
    pub(crate) source: PathBuf,
}

impl MediaPayload {
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}
