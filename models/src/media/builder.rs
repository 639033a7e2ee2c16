use crate::error::model_error::ModelError;
use crate::{ErrorLocation, MediaPayload};

use std::panic::Location;
use std::path::PathBuf;

/// Builder for validated [`MediaPayload`] values.
///
/// `file_name` defaults to the last component of `source` when not set.
#[derive(Debug, Default)]
pub struct MediaPayloadBuilder {
    mime_type: Option<String>,
    size_bytes: Option<u64>,
    file_name: Option<String>,
    source: Option<PathBuf>,
}

impl MediaPayloadBuilder {
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_size_bytes(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Build the MediaPayload with validation.
    #[track_caller]
    pub fn build(self) -> Result<MediaPayload, ModelError> {
        let source = self.source.ok_or_else(|| ModelError::Validation {
            message: String::from("Media source is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if source.as_os_str().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Media source cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let mime_type = self.mime_type.ok_or_else(|| ModelError::Validation {
            message: String::from("MIME type is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if !mime_type.contains('/') {
            return Err(ModelError::Validation {
                message: format!("Invalid MIME type: {mime_type}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let size_bytes = self.size_bytes.ok_or_else(|| ModelError::Validation {
            message: String::from("Size is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let file_name = match self.file_name {
            Some(name) if !name.is_empty() => name,
            Some(_) => {
                return Err(ModelError::Validation {
                    message: String::from("File name cannot be empty"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            None => source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ModelError::Validation {
                    message: format!("Cannot derive file name from {}", source.display()),
                    location: ErrorLocation::from(Location::caller()),
                })?,
        };

        Ok(MediaPayload {
            mime_type,
            size_bytes,
            file_name,
            source,
        })
    }
}
