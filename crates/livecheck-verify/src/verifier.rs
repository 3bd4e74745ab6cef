use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNIFORM_TYPE: &str = "Security Guard Uniform";
const DETECTED_MESSAGE: &str =
    "Valid uniform detected. Person is properly dressed in required uniform.";
const NOT_DETECTED_MESSAGE: &str =
    "No valid uniform detected. Please ensure you are wearing the required uniform.";

/// Share of mock verifications that report a uniform.
const MOCK_DETECTION_RATE: f64 = 0.7;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("no image provided")]
    EmptyImage,
}

/// Response of the uniform-verification backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniformVerification {
    pub success: bool,
    pub uniform_detected: bool,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniform_type: Option<String>,
    pub message: String,
}

/// A backend that decides whether the captured person wears the required uniform.
pub trait UniformVerifier: Send {
    fn verify(&mut self, image: &[u8]) -> Result<UniformVerification, VerifyError>;
}

/// Stand-in backend returning randomised but plausible answers.
pub struct MockUniformVerifier {
    rng: StdRng,
}

impl MockUniformVerifier {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic mock, for tests and reproducible CLI runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for MockUniformVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformVerifier for MockUniformVerifier {
    fn verify(&mut self, image: &[u8]) -> Result<UniformVerification, VerifyError> {
        if image.is_empty() {
            return Err(VerifyError::EmptyImage);
        }
        tracing::info!(size = image.len(), "mock uniform verification");

        let detected = self.rng.gen_bool(MOCK_DETECTION_RATE);
        let spread: f32 = self.rng.gen();
        let result = if detected {
            UniformVerification {
                success: true,
                uniform_detected: true,
                confidence: 0.85 + spread * 0.15,
                uniform_type: Some(UNIFORM_TYPE.to_string()),
                message: DETECTED_MESSAGE.to_string(),
            }
        } else {
            UniformVerification {
                success: true,
                uniform_detected: false,
                confidence: 0.45 + spread * 0.25,
                uniform_type: None,
                message: NOT_DETECTED_MESSAGE.to_string(),
            }
        };
        Ok(result)
    }
}
