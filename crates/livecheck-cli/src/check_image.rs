//! `livecheck check-image`: run a capture through the upload pipeline offline.

use anyhow::{Context, Result};
use livecheck_verify::{
    compress_jpeg, validate_image_quality, CaptureConfig, MockUniformVerifier, UniformVerifier,
};
use serde_json::{json, Value};

/// Validate, compress and mock-verify an encoded image.
///
/// Compression and verification are skipped when the quality check fails.
/// With a seed the mock verifier's answer is reproducible.
pub fn check_image(bytes: &[u8], config: &CaptureConfig, seed: Option<u64>) -> Result<Value> {
    let quality = validate_image_quality(bytes, config);
    if !quality.is_valid() {
        tracing::warn!(issues = quality.issues.len(), "image failed quality check");
        return Ok(json!({
            "quality": quality,
            "valid": false,
            "originalBytes": bytes.len(),
            "compressedBytes": null,
            "verification": null,
        }));
    }

    let compressed = compress_jpeg(bytes, config).context("compressing image")?;
    let mut verifier = match seed {
        Some(seed) => MockUniformVerifier::seeded(seed),
        None => MockUniformVerifier::new(),
    };
    let verification = verifier.verify(&compressed).context("verifying uniform")?;

    Ok(json!({
        "quality": quality,
        "valid": true,
        "originalBytes": bytes.len(),
        "compressedBytes": compressed.len(),
        "verification": verification,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb([120u8, 90, 60]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_invalid_image_skips_verification() {
        let report = check_image(b"", &CaptureConfig::default(), Some(1)).unwrap();
        assert_eq!(report["valid"], false);
        assert!(report["verification"].is_null());
        assert_eq!(report["quality"]["issues"][0]["issue"], "empty");
    }

    #[test]
    fn test_low_resolution_is_reported() {
        let report = check_image(&png(320, 240), &CaptureConfig::default(), Some(1)).unwrap();
        assert_eq!(report["valid"], false);
        assert_eq!(report["quality"]["issues"][0]["issue"], "low-resolution");
    }

    #[test]
    fn test_valid_image_is_verified_reproducibly() {
        let bytes = png(640, 480);
        let a = check_image(&bytes, &CaptureConfig::default(), Some(9)).unwrap();
        let b = check_image(&bytes, &CaptureConfig::default(), Some(9)).unwrap();
        assert_eq!(a["valid"], true);
        assert_eq!(a["compressedBytes"], a["originalBytes"]);
        assert!(a["verification"]["success"].as_bool().unwrap());
        assert_eq!(a, b);
    }
}
