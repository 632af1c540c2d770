//! Validation of raw provider output into a `TrainingArtifact`.
//!
//! Lessons are accepted as trimmed text. Simulations must decode into the exact
//! `Simulation` shape and pass the structural checks below; nothing is repaired.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::domain::{ArtifactKind, Simulation, TrainingArtifact};
use crate::error::TrainingError;
use crate::util::trunc_for_log;

/// Stand-in for a lesson the provider returned empty.
pub const NO_LESSON_CONTENT: &str = "No lesson content was generated.";

pub const SIMULATION_OPTION_COUNT: usize = 3;

#[instrument(level = "debug", skip(raw), fields(raw_len = raw.len()))]
pub fn normalize(raw: &str, kind: ArtifactKind) -> Result<TrainingArtifact, TrainingError> {
  match kind {
    ArtifactKind::Lesson => Ok(TrainingArtifact::Lesson(normalize_lesson(raw))),
    ArtifactKind::Simulation => parse_simulation(raw).map(TrainingArtifact::Simulation),
  }
}

pub fn normalize_lesson(raw: &str) -> String {
  let text = raw.trim();
  if text.is_empty() {
    debug!(target: "training", "Empty lesson text replaced with sentinel");
    NO_LESSON_CONTENT.to_string()
  } else {
    text.to_string()
  }
}

pub fn parse_simulation(raw: &str) -> Result<Simulation, TrainingError> {
  let payload = strip_code_fence(raw);
  let sim: Simulation = serde_json::from_str(payload).map_err(|e| {
    warn!(target: "training", error = %e, preview = %trunc_for_log(payload, 80), "Simulation payload did not decode");
    TrainingError::MalformedArtifact(format!("simulation is not valid JSON of the expected shape: {e}"))
  })?;
  validate_simulation(&sim)?;
  Ok(sim)
}

/// Exactly three options, unique non-empty ids, and a correct id that points at one of them.
pub fn validate_simulation(sim: &Simulation) -> Result<(), TrainingError> {
  if sim.options.len() != SIMULATION_OPTION_COUNT {
    return Err(TrainingError::MalformedArtifact(format!(
      "simulation must have exactly {} options, got {}",
      SIMULATION_OPTION_COUNT,
      sim.options.len()
    )));
  }
  let mut ids = HashSet::with_capacity(sim.options.len());
  for opt in &sim.options {
    if opt.id.trim().is_empty() {
      return Err(TrainingError::MalformedArtifact("simulation option has an empty id".into()));
    }
    if !ids.insert(opt.id.as_str()) {
      return Err(TrainingError::MalformedArtifact(format!("duplicate simulation option id '{}'", opt.id)));
    }
  }
  if !ids.contains(sim.correct_option_id.as_str()) {
    return Err(TrainingError::MalformedArtifact(format!(
      "correct_option_id '{}' does not match any option",
      sim.correct_option_id
    )));
  }
  Ok(())
}

/// Remove a surrounding ``` / ```json fence if the provider added one.
pub fn strip_code_fence(raw: &str) -> &str {
  let s = raw.trim();
  let Some(rest) = s.strip_prefix("```") else { return s };
  // Drop the info string (e.g. "json") up to the first newline.
  let body = match rest.find('\n') {
    Some(nl) => &rest[nl + 1..],
    None => rest,
  };
  body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
