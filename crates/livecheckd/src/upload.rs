use livecheck_verify::{
    compress_jpeg, validate_image_quality, CaptureConfig, CaptureError, ImageIssue,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("captured image rejected: {0:?}")]
    Rejected(Vec<ImageIssue>),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Check a captured image and shrink it to the upload budget.
///
/// CPU-bound; callers run it on the blocking pool.
pub fn prepare_capture(image: &[u8], config: &CaptureConfig) -> Result<Vec<u8>, UploadError> {
    let report = validate_image_quality(image, config);
    if !report.is_valid() {
        return Err(UploadError::Rejected(report.issues));
    }
    let compressed = compress_jpeg(image, config)?;
    tracing::debug!(
        original = image.len(),
        compressed = compressed.len(),
        "capture prepared for upload"
    );
    Ok(compressed)
}
