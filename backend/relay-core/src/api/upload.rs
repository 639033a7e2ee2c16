//! On-disk storage for attachments received by `/send-media`.

use crate::error::server::ServerError;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use log::{debug, info, warn};
use regex::Regex;
use uuid::Uuid;

const UNSAFE_CHARS_PATTERN: &str = r"[^A-Za-z0-9._-]";
const FALLBACK_FILE_NAME: &str = "upload";

static UNSAFE_CHARS_REGEX: OnceLock<Regex> = OnceLock::new();

fn unsafe_chars_regex() -> &'static Regex {
    UNSAFE_CHARS_REGEX.get_or_init(|| Regex::new(UNSAFE_CHARS_PATTERN).expect("valid regex pattern"))
}

/// Upload directory plus the retention policy for what lands in it.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    retain: bool,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, retain: bool) -> Self {
        Self {
            dir: dir.into(),
            retain,
        }
    }

    /// Create the upload directory if needed.
    pub async fn prepare(&self) -> Result<(), ServerError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        debug!("Upload directory ready at {}", self.dir.display());
        Ok(())
    }

    /// Write `bytes` as `<unix-millis>_<uuid>_<sanitized name>` and return the path.
    ///
    /// The uuid keeps concurrent uploads of the same name apart.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<PathBuf, ServerError> {
        self.prepare().await?;

        let name = upload_file_name(
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            original_name,
        );
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes).await?;

        info!("Stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Remove an upload once its send attempt is over, unless uploads are retained.
    pub async fn discard(&self, path: &Path) {
        if self.retain {
            return;
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed upload {}", path.display()),
            Err(e) => warn!("Failed to remove upload {}: {e}", path.display()),
        }
    }
}

pub(crate) fn upload_file_name(millis: i64, unique: Uuid, original_name: &str) -> String {
    format!(
        "{millis}_{}_{}",
        unique.simple(),
        sanitize_file_name(original_name)
    )
}

/// Last path component only, with anything outside `[A-Za-z0-9._-]` replaced.
pub(crate) fn sanitize_file_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned = unsafe_chars_regex().replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
