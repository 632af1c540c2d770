//! Assessment session state machine.
//!
//! SelfRating --rate--> Testing --choose--> SelfRating (next question) | Finished
//!
//! Choosing is only accepted in `Testing`, so an answered question can never be
//! answered again and an option cannot be picked before a rating was given.

use std::sync::Arc;

use tracing::{debug, info};

use crate::diagnosis::assess;
use crate::domain::{AssessmentOutcome, SelfRating, SkillQuestion};
use crate::error::SessionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStep {
  SelfRating,
  Testing { rating: SelfRating },
  Finished,
}

impl SessionStep {
  pub fn name(&self) -> &'static str {
    match self {
      SessionStep::SelfRating => "self_rating",
      SessionStep::Testing { .. } => "testing",
      SessionStep::Finished => "finished",
    }
  }
}

#[derive(Clone, Debug)]
pub struct AssessmentSession {
  pub id: String,
  pub user_id: Option<String>,
  questions: Arc<[SkillQuestion]>,
  index: usize,
  step: SessionStep,
  outcomes: Vec<AssessmentOutcome>,
}

impl AssessmentSession {
  pub fn new(id: String, user_id: Option<String>, questions: Arc<[SkillQuestion]>) -> Self {
    let step = if questions.is_empty() { SessionStep::Finished } else { SessionStep::SelfRating };
    Self { id, user_id, questions, index: 0, step, outcomes: Vec::new() }
  }

  pub fn step(&self) -> SessionStep {
    self.step
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn question_count(&self) -> usize {
    self.questions.len()
  }

  pub fn is_finished(&self) -> bool {
    self.step == SessionStep::Finished
  }

  /// The question being rated or answered; `None` once finished.
  pub fn current_question(&self) -> Option<&SkillQuestion> {
    match self.step {
      SessionStep::Finished => None,
      _ => self.questions.get(self.index),
    }
  }

  pub fn outcomes(&self) -> &[AssessmentOutcome] {
    &self.outcomes
  }

  /// Capture confidence for the current question and present it.
  pub fn rate(&mut self, rating: SelfRating) -> Result<(), SessionError> {
    match self.step {
      SessionStep::SelfRating => {
        self.step = SessionStep::Testing { rating };
        debug!(target: "diagnosis", session = %self.id, index = self.index, %rating, "Self rating captured");
        Ok(())
      }
      other => Err(SessionError::InvalidTransition { action: "rate confidence", step: other.name() }),
    }
  }

  /// Answer the current question. Emits the outcome and advances.
  pub fn choose(&mut self, option_key: &str) -> Result<AssessmentOutcome, SessionError> {
    let rating = match self.step {
      SessionStep::Testing { rating } => rating,
      other => return Err(SessionError::InvalidTransition { action: "choose an option", step: other.name() }),
    };
    let question = self
      .questions
      .get(self.index)
      .ok_or(SessionError::InvalidTransition { action: "choose an option", step: "finished" })?;
    if !question.has_option(option_key) {
      return Err(SessionError::UnknownOption(option_key.to_string()));
    }

    let outcome = assess(question, rating, option_key);
    info!(
      target: "diagnosis",
      session = %self.id,
      skill = %outcome.skill_id,
      %rating,
      correct = outcome.is_correct,
      category = %outcome.calibration_status,
      "Outcome diagnosed"
    );
    self.outcomes.push(outcome.clone());
    self.index += 1;
    self.step = if self.index < self.questions.len() { SessionStep::SelfRating } else { SessionStep::Finished };
    Ok(outcome)
  }

  /// Outcome eligible for on-demand training: session finished and path not `none`.
  pub fn trainable_outcome(&self, index: usize) -> Result<&AssessmentOutcome, SessionError> {
    if !self.is_finished() {
      return Err(SessionError::InvalidTransition { action: "request training", step: self.step.name() });
    }
    let outcome = self.outcomes.get(index).ok_or(SessionError::UnknownOutcome(index))?;
    if !outcome.training_path.needs_training() {
      return Err(SessionError::NoTrainingNeeded(outcome.skill_id.clone()));
    }
    Ok(outcome)
  }
}
