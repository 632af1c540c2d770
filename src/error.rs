//! Error taxonomy for the training pipeline and the assessment sessions.

use thiserror::Error;

/// Failures of one training-content request. Each is reported once; nothing retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrainingError {
  /// Provider credential missing or unusable. Checked before any network attempt.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// Network failure, timeout, non-success status or an empty provider response.
  #[error("provider error: {0}")]
  Provider(String),

  /// The provider answered but the content failed structural validation.
  #[error("malformed artifact: {0}")]
  MalformedArtifact(String),
}

impl TrainingError {
  pub fn kind(&self) -> &'static str {
    match self {
      TrainingError::Configuration(_) => "configuration_error",
      TrainingError::Provider(_) => "provider_error",
      TrainingError::MalformedArtifact(_) => "malformed_artifact_error",
    }
  }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
  #[error("unknown session: {0}")]
  NotFound(String),

  #[error("cannot {action} while {step}")]
  InvalidTransition { action: &'static str, step: &'static str },

  #[error("self rating {0} is outside 1..=5")]
  RatingOutOfRange(i64),

  #[error("unknown option '{0}'")]
  UnknownOption(String),

  #[error("no outcome at index {0}")]
  UnknownOutcome(usize),

  #[error("outcome for '{0}' needs no training")]
  NoTrainingNeeded(String),
}

impl SessionError {
  pub fn kind(&self) -> &'static str {
    match self {
      SessionError::NotFound(_) => "session_not_found",
      SessionError::InvalidTransition { .. } => "invalid_transition",
      SessionError::RatingOutOfRange(_) => "rating_out_of_range",
      SessionError::UnknownOption(_) => "unknown_option",
      SessionError::UnknownOutcome(_) => "unknown_outcome",
      SessionError::NoTrainingNeeded(_) => "no_training_needed",
    }
  }
}
