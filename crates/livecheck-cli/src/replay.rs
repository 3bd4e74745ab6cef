//! `livecheck replay`: drive an engine from a recorded detection stream.
//!
//! A recording is JSON lines, one event per line, each stamped with `tMs`
//! (milliseconds since the start of the recording, non-decreasing):
//!
//! ```text
//! {"tMs": 0, "event": "start"}
//! {"tMs": 33, "frameWidth": 1080, "frameHeight": 1920, "detection": { ... }}
//! {"tMs": 9000, "event": "reset"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Time is synthetic:
//! timers fire exactly when the recording says they would have.

use std::fmt;
use std::io::BufRead;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use livecheck_core::{
    FaceDetectionResult, LivenessConfig, LivenessEngine, LivenessPhase, LivenessSnapshot,
};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Control {
    Start,
    Reset,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Recorded {
    #[serde(rename_all = "camelCase")]
    Control { t_ms: u64, event: Control },
    #[serde(rename_all = "camelCase")]
    Frame {
        t_ms: u64,
        frame_width: u32,
        frame_height: u32,
        detection: FaceDetectionResult,
    },
}

impl Recorded {
    fn t_ms(&self) -> u64 {
        match self {
            Recorded::Control { t_ms, .. } | Recorded::Frame { t_ms, .. } => *t_ms,
        }
    }
}

/// What caused a phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    Start,
    Frame,
    Timer,
    Reset,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cause::Start => "start",
            Cause::Frame => "frame",
            Cause::Timer => "timer",
            Cause::Reset => "reset",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub t_ms: u64,
    pub from: LivenessPhase,
    pub to: LivenessPhase,
    pub cause: Cause,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>7} ms] {} -> {} ({})",
            self.t_ms, self.from, self.to, self.cause
        )
    }
}

#[derive(Debug)]
pub struct ReplayReport {
    pub transitions: Vec<Transition>,
    pub frames: usize,
    pub snapshot: LivenessSnapshot,
}

/// Replay a recording through a fresh engine.
pub fn replay(input: impl BufRead, config: LivenessConfig) -> Result<ReplayReport> {
    let mut engine = LivenessEngine::new(config);
    let origin = Instant::now();
    let mut transitions = Vec::new();
    let mut frames = 0;
    let mut last_t = 0;

    for (index, line) in input.lines().enumerate() {
        let lineno = index + 1;
        let line = line.with_context(|| format!("reading line {lineno}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: Recorded =
            serde_json::from_str(line).with_context(|| format!("parsing line {lineno}"))?;
        let t_ms = event.t_ms();
        if t_ms < last_t {
            bail!("line {lineno}: tMs {t_ms} goes back in time (previous {last_t})");
        }
        last_t = t_ms;
        let now = origin + Duration::from_millis(t_ms);

        record(&mut transitions, t_ms, Cause::Timer, &mut engine, |e| {
            e.poll_timers(now);
        });
        match event {
            Recorded::Control {
                event: Control::Start,
                ..
            } => record(&mut transitions, t_ms, Cause::Start, &mut engine, |e| {
                e.start_detection_at(now)
            }),
            Recorded::Control {
                event: Control::Reset,
                ..
            } => record(&mut transitions, t_ms, Cause::Reset, &mut engine, |e| {
                e.reset_checks()
            }),
            Recorded::Frame {
                frame_width,
                frame_height,
                detection,
                ..
            } => {
                frames += 1;
                record(&mut transitions, t_ms, Cause::Frame, &mut engine, |e| {
                    e.process_detection_at(&detection, frame_width, frame_height, now)
                });
            }
        }
    }

    tracing::debug!(frames, transitions = transitions.len(), "replay finished");
    Ok(ReplayReport {
        transitions,
        frames,
        snapshot: engine.snapshot(),
    })
}

/// Apply one step and note the phase change it caused, if any.
fn record(
    transitions: &mut Vec<Transition>,
    t_ms: u64,
    cause: Cause,
    engine: &mut LivenessEngine,
    apply: impl FnOnce(&mut LivenessEngine),
) {
    let from = engine.phase();
    apply(engine);
    let to = engine.phase();
    if from != to {
        transitions.push(Transition {
            t_ms,
            from,
            to,
            cause,
        });
    }
}
