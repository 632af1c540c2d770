//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Starting sessions and walking them through rating/answering
//!   - Recording outcomes (detached)
//!   - On-demand training for finished sessions and direct training requests

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{ArtifactKind, GenerationRequest, SelfRating, TrainingArtifact};
use crate::error::{SessionError, TrainingError};
use crate::outcomes::record_detached;
use crate::protocol::{session_view, AnswerOut, GenerateTrainingIn, OutcomeOut, SessionView};
use crate::session::AssessmentSession;
use crate::state::AppState;

/// Either side of a session-scoped training request can fail.
#[derive(Debug)]
pub enum SessionTrainingError {
  Session(SessionError),
  Training(TrainingError),
}

#[instrument(level = "info", skip(state), fields(has_user = user_id.is_some()))]
pub async fn start_session(state: &AppState, user_id: Option<String>) -> SessionView {
  let session = AssessmentSession::new(Uuid::new_v4().to_string(), user_id, state.questions.clone());
  let view = session_view(&session);
  info!(target: "diagnosis", session = %session.id, questions = session.question_count(), "Session started");
  state.insert_session(session).await;
  view
}

pub async fn get_session(state: &AppState, session_id: &str) -> Result<SessionView, SessionError> {
  state.get_session(session_id).await.map(|s| session_view(&s))
}

#[instrument(level = "info", skip(state))]
pub async fn rate_confidence(state: &AppState, session_id: &str, self_rating: i64) -> Result<SessionView, SessionError> {
  let rating = SelfRating::new(self_rating)?;
  state
    .with_session(session_id, |s| {
      s.rate(rating)?;
      Ok(session_view(s))
    })
    .await
}

/// Answer the current question. The outcome goes to the sink without waiting on it.
#[instrument(level = "info", skip(state))]
pub async fn submit_answer(state: &AppState, session_id: &str, option: &str) -> Result<AnswerOut, SessionError> {
  let (outcome, correct_option, view, user_id) = state
    .with_session(session_id, |s| {
      let correct_option = s.current_question().map(|q| q.correct.clone()).unwrap_or_default();
      let outcome = s.choose(option)?;
      Ok((outcome, correct_option, session_view(s), s.user_id.clone()))
    })
    .await?;

  record_detached(&state.outcomes, user_id.as_deref(), &outcome);

  Ok(AnswerOut { outcome: OutcomeOut::from(&outcome), correct_option, session: view })
}

/// Training for one outcome of a finished session. Reads a snapshot; never writes back.
#[instrument(level = "info", skip(state))]
pub async fn session_training(
  state: &AppState,
  session_id: &str,
  outcome_index: usize,
  kind: ArtifactKind,
) -> Result<TrainingArtifact, SessionTrainingError> {
  let outcome = {
    let snapshot = state.get_session(session_id).await.map_err(SessionTrainingError::Session)?;
    snapshot.trainable_outcome(outcome_index).cloned().map_err(SessionTrainingError::Session)?
  };
  state
    .trainer
    .train_for_outcome(&outcome, kind)
    .await
    .map_err(SessionTrainingError::Training)
}

#[instrument(level = "info", skip(state, body), fields(skill = %body.skill_name))]
pub async fn generate_training(
  state: &AppState,
  body: GenerateTrainingIn,
  kind: ArtifactKind,
) -> Result<TrainingArtifact, TrainingError> {
  let req = GenerationRequest {
    skill_name: body.skill_name,
    category: body.mistake_context,
    self_rating: body.user_level,
    kind,
  };
  state.trainer.request_training(&req).await
}
