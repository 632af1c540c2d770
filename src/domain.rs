//! Domain models: skill questions, self ratings, calibration categories,
//! training paths, assessment outcomes and generated training artifacts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// One selectable answer of a skill question.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionOption {
  pub key: String,
  pub text: String,
}

/// Authored question used to check a learner's competence on one skill.
/// Option order is presentation order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillQuestion {
  pub id: String,
  pub name: String,
  pub category: String,
  pub text: String,
  pub options: Vec<QuestionOption>,
  pub correct: String,
}

impl SkillQuestion {
  /// Checks option keys (single uppercase letter, unique) and the correct key reference.
  pub fn validate(&self) -> Result<(), String> {
    if self.options.len() < 2 {
      return Err(format!("question '{}' needs at least two options", self.id));
    }
    let mut seen: Vec<&str> = Vec::with_capacity(self.options.len());
    for opt in &self.options {
      let mut chars = opt.key.chars();
      let single_upper = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase());
      if !single_upper {
        return Err(format!("question '{}' has invalid option key '{}'", self.id, opt.key));
      }
      if seen.contains(&opt.key.as_str()) {
        return Err(format!("question '{}' has duplicate option key '{}'", self.id, opt.key));
      }
      seen.push(&opt.key);
    }
    if !seen.contains(&self.correct.as_str()) {
      return Err(format!("question '{}' marks unknown option '{}' as correct", self.id, self.correct));
    }
    Ok(())
  }

  pub fn has_option(&self, key: &str) -> bool {
    self.options.iter().any(|o| o.key == key)
  }

  pub fn is_correct(&self, key: &str) -> bool {
    self.correct == key
  }
}

/// Self-assessed confidence, 1 (Novice) to 5 (Expert). Always in range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct SelfRating(u8);

impl SelfRating {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  pub fn new(value: i64) -> Result<Self, SessionError> {
    if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
      Ok(Self(value as u8))
    } else {
      Err(SessionError::RatingOutOfRange(value))
    }
  }

  pub fn value(self) -> u8 {
    self.0
  }
}

impl TryFrom<i64> for SelfRating {
  type Error = SessionError;
  fn try_from(value: i64) -> Result<Self, Self::Error> {
    Self::new(value)
  }
}

impl From<SelfRating> for u8 {
  fn from(r: SelfRating) -> u8 {
    r.0
  }
}

impl fmt::Display for SelfRating {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Agreement between confidence and demonstrated competence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationCategory {
  AlignedExpert,
  Underconfident,
  Overconfident,
  Novice,
}

impl CalibrationCategory {
  pub fn as_str(self) -> &'static str {
    match self {
      CalibrationCategory::AlignedExpert => "aligned_expert",
      CalibrationCategory::Underconfident => "underconfident",
      CalibrationCategory::Overconfident => "overconfident",
      CalibrationCategory::Novice => "novice",
    }
  }

  /// Remediation route for this category. Depends on nothing but the category.
  pub fn training_path(self) -> TrainingPath {
    match self {
      CalibrationCategory::AlignedExpert => TrainingPath::None,
      CalibrationCategory::Underconfident => TrainingPath::ConfidenceBoost,
      CalibrationCategory::Novice => TrainingPath::StandardLearning,
      CalibrationCategory::Overconfident => TrainingPath::IntensiveCorrection,
    }
  }
}

impl fmt::Display for CalibrationCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPath {
  None,
  ConfidenceBoost,
  StandardLearning,
  IntensiveCorrection,
}

impl TrainingPath {
  pub fn needs_training(self) -> bool {
    self != TrainingPath::None
  }
}

/// Result of one answered question. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentOutcome {
  pub skill_id: String,
  pub skill_name: String,
  pub self_rating: SelfRating,
  pub is_correct: bool,
  pub calibration_status: CalibrationCategory,
  pub training_path: TrainingPath,
}

/// Which shape of generated content is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
  Lesson,
  Simulation,
}

impl ArtifactKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ArtifactKind::Lesson => "lesson",
      ArtifactKind::Simulation => "simulation",
    }
  }
}

/// Input of one training-content generation. Built per request, never stored.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub skill_name: String,
  pub category: CalibrationCategory,
  pub self_rating: SelfRating,
  pub kind: ArtifactKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationOption {
  pub id: String,
  pub text: String,
  pub feedback: String,
}

/// Roleplay exercise: a setup, one customer line and exactly three responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Simulation {
  pub setup: String,
  pub customer_line: String,
  pub options: Vec<SimulationOption>,
  pub correct_option_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrainingArtifact {
  Lesson(String),
  Simulation(Simulation),
}
