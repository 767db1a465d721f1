//! Build Spec Loader: reads the spec from the checkout and builds the job.

use std::io::ErrorKind;
use std::path::Path;

use pipeline::{parse_build_spec, BuildJob, DispatchError, JobSeed};
use tracing::warn;

/// Reads the build spec at `path`, maps it onto the job schema, and overlays
/// the dispatch-time values from `seed`.
///
/// # Errors
///
/// [`DispatchError::BuildSpecNotFound`] if no file exists at `path`;
/// [`DispatchError::BuildSpecFormat`] if it cannot be read or does not fit
/// the schema.
pub async fn load_build_job(path: &Path, seed: &JobSeed) -> Result<BuildJob, DispatchError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(DispatchError::BuildSpecNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(DispatchError::BuildSpecFormat {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };

    let document = parse_build_spec(&raw).map_err(|e| e.at(path))?;
    if !document.dropped_fields().is_empty() {
        warn!(
            path = %path.display(),
            dropped = ?document.dropped_fields(),
            "Ignoring build spec fields the build schema does not define"
        );
    }

    Ok(seed.overlay(document))
}
