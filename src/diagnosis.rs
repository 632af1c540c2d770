//! Calibration diagnosis: (self rating, correctness) -> (category, training path).
//!
//! | correct | rating | category       | path                 |
//! |---------|--------|----------------|----------------------|
//! | yes     | >= 3   | aligned_expert | none                 |
//! | yes     | <= 2   | underconfident | confidence_boost     |
//! | no      | >= 4   | overconfident  | intensive_correction |
//! | no      | <= 3   | novice         | standard_learning    |
//!
//! A correct answer rated 3 counts as `aligned_expert`.

use crate::domain::{AssessmentOutcome, CalibrationCategory, SelfRating, SkillQuestion, TrainingPath};

pub fn classify(rating: SelfRating, is_correct: bool) -> (CalibrationCategory, TrainingPath) {
  let category = match (is_correct, rating.value()) {
    (true, r) if r <= 2 => CalibrationCategory::Underconfident,
    (true, _) => CalibrationCategory::AlignedExpert,
    (false, r) if r >= 4 => CalibrationCategory::Overconfident,
    (false, _) => CalibrationCategory::Novice,
  };
  (category, category.training_path())
}

/// Diagnose a chosen option against its question.
pub fn assess(question: &SkillQuestion, rating: SelfRating, option_key: &str) -> AssessmentOutcome {
  let is_correct = question.is_correct(option_key);
  let (calibration_status, training_path) = classify(rating, is_correct);
  AssessmentOutcome {
    skill_id: question.id.clone(),
    skill_name: question.name.clone(),
    self_rating: rating,
    is_correct,
    calibration_status,
    training_path,
  }
}
