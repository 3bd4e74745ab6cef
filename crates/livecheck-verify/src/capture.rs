use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, GenericImageView};
use serde::Serialize;
use thiserror::Error;

/// Minimum capture resolution accepted for verification.
const MIN_WIDTH: u32 = 640;
const MIN_HEIGHT: u32 = 480;
/// Accepted width/height ratio band.
const MIN_ASPECT: f32 = 0.5;
const MAX_ASPECT: f32 = 2.0;
/// Quality step used when searching for a JPEG that fits the size budget.
const QUALITY_STEP: u8 = 10;
const MIN_QUALITY: u8 = 10;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("captured image is empty")]
    Empty,
    #[error("failed to decode captured image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Initial JPEG quality (1-100).
    pub image_quality: u8,
    /// Size budget for the uploaded image in KiB.
    pub max_size_kb: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            image_quality: 90,
            max_size_kb: 2048,
        }
    }
}

impl CaptureConfig {
    fn max_bytes(&self) -> usize {
        self.max_size_kb * 1024
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "kebab-case")]
pub enum ImageIssue {
    Empty,
    TooLarge { size_kb: usize },
    LowResolution { width: u32, height: u32 },
    UnusualAspectRatio { width: u32, height: u32 },
    Undecodable,
}

/// Outcome of [`validate_image_quality`]. Valid iff there are no issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub issues: Vec<ImageIssue>,
}

impl QualityReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check an encoded capture for size, resolution and aspect ratio.
///
/// Oversized images (over 1.5x the budget) are reported but still decoded so
/// resolution problems show up in the same report.
pub fn validate_image_quality(bytes: &[u8], config: &CaptureConfig) -> QualityReport {
    let mut issues = Vec::new();

    if bytes.is_empty() {
        issues.push(ImageIssue::Empty);
        return QualityReport { issues };
    }

    if bytes.len() * 2 > config.max_bytes() * 3 {
        issues.push(ImageIssue::TooLarge {
            size_kb: bytes.len() / 1024,
        });
    }

    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!(error = %e, "capture could not be decoded");
            issues.push(ImageIssue::Undecodable);
            return QualityReport { issues };
        }
    };

    let (width, height) = img.dimensions();
    if width < MIN_WIDTH || height < MIN_HEIGHT {
        issues.push(ImageIssue::LowResolution { width, height });
    }

    let aspect = width as f32 / height.max(1) as f32;
    if !(MIN_ASPECT..=MAX_ASPECT).contains(&aspect) {
        issues.push(ImageIssue::UnusualAspectRatio { width, height });
    }

    QualityReport { issues }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(CaptureError::Encode)?;
    Ok(out)
}

/// JPEG qualities tried by [`compress_jpeg`], highest first. The last step
/// is always `MIN_QUALITY` unless the start is already below it.
fn quality_steps(start: u8) -> Vec<u8> {
    let mut quality = start.clamp(1, 100);
    let mut steps = vec![quality];
    while quality > MIN_QUALITY {
        quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
        steps.push(quality);
    }
    steps
}

/// Fit a capture into the configured size budget.
///
/// Images already within budget are returned unchanged. Otherwise the image
/// is re-encoded as JPEG starting at `image_quality` and stepping down until
/// it fits; if nothing fits, the lowest-quality attempt is returned.
pub fn compress_jpeg(bytes: &[u8], config: &CaptureConfig) -> Result<Vec<u8>, CaptureError> {
    if bytes.is_empty() {
        return Err(CaptureError::Empty);
    }
    if bytes.len() <= config.max_bytes() {
        return Ok(bytes.to_vec());
    }

    let img = image::load_from_memory(bytes).map_err(CaptureError::Decode)?;
    let mut last = None;

    for quality in quality_steps(config.image_quality) {
        let encoded = encode_jpeg(&img, quality)?;
        tracing::debug!(quality, size = encoded.len(), "re-encoded capture");
        if encoded.len() <= config.max_bytes() {
            return Ok(encoded);
        }
        last = Some(encoded);
    }

    tracing::warn!(
        max_kb = config.max_size_kb,
        "capture still exceeds size budget at lowest quality"
    );
    Ok(last.unwrap_or_else(|| bytes.to_vec()))
}
