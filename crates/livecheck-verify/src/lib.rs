//! livecheck-verify: what happens to a frame after the liveness check passes.
//!
//! [`capture`] validates and compresses the captured image; [`verifier`]
//! defines the uniform-verification backend contract and a mock backend.

pub mod capture;
pub mod verifier;

pub use capture::{
    compress_jpeg, validate_image_quality, CaptureConfig, CaptureError, ImageIssue, QualityReport,
};
pub use verifier::{MockUniformVerifier, UniformVerification, UniformVerifier, VerifyError};
