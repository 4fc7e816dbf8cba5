//! Upload task validation, run once before any remote call.

use std::path::Path;

use crate::content_type::content_type_for_path;
use crate::error::{Error, Result};
use crate::types::UploadTask;

/// Facts about the local package gathered during validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ValidatedFile {
    pub(crate) file_name: String,
    pub(crate) size: u64,
    pub(crate) content_type: &'static str,
}

/// Check that the package exists, is readable, and carries the build metadata
/// its extension requires.
pub(crate) async fn validate_task(task: &UploadTask) -> Result<ValidatedFile> {
    let path = task.path();

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::input_file(path, "file does not exist"));
        }
        Err(e) => {
            return Err(Error::input_file(path, format!("cannot stat file: {}", e)));
        }
    };
    if !metadata.is_file() {
        return Err(Error::input_file(path, "not a regular file"));
    }

    if let Err(e) = tokio::fs::File::open(path).await {
        return Err(Error::input_file(path, format!("file is not readable: {}", e)));
    }

    let file_name = task
        .file_name()
        .ok_or_else(|| Error::input_file(path, "path has no valid UTF-8 file name"))?
        .to_string();

    validate_build_metadata(task)?;

    Ok(ValidatedFile {
        file_name,
        size: metadata.len(),
        content_type: content_type_for_path(path),
    })
}

/// Installer-style packages cannot be versioned by the service on its own.
///
/// - `.pkg`, `.dmg`: build version and build number
/// - `.zip`, `.msi`: build version
fn validate_build_metadata(task: &UploadTask) -> Result<()> {
    let extension = extension_of(task.path());
    let has_version = task.options.build_version().is_some();
    let has_number = task.options.build_number().is_some();

    let needs_both = ["pkg", "dmg"]
        .iter()
        .any(|e| e.eq_ignore_ascii_case(&extension));
    if needs_both && !(has_version && has_number) {
        return Err(Error::input_file(
            task.path(),
            format!(
                "build version and build number must be specified to upload a file of extension '.{}'",
                extension
            ),
        ));
    }

    let needs_version = ["zip", "msi"]
        .iter()
        .any(|e| e.eq_ignore_ascii_case(&extension));
    if needs_version && !has_version {
        return Err(Error::input_file(
            task.path(),
            format!(
                "build version must be specified to upload a file of extension '.{}'",
                extension
            ),
        ));
    }

    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}
