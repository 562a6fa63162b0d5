//! Source and target locations recorded for a finished download.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Where a finished payload lives and where it should be copied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePlacement {
    /// Payload file name as reported by the download client.
    pub file_name: String,
    /// Absolute path of the payload inside the client's save path.
    pub source_path: Utf8PathBuf,
    /// Absolute destination path under the target storage root.
    pub target_path: Utf8PathBuf,
}

impl FilePlacement {
    /// Derives a placement for `file_name` saved under `save_path`, targeting
    /// `target_root`.
    #[must_use]
    pub fn for_payload(file_name: &str, save_path: &Utf8Path, target_root: &Utf8Path) -> Self {
        Self {
            file_name: file_name.to_owned(),
            source_path: save_path.join(file_name),
            target_path: target_root.join(file_name),
        }
    }
}
