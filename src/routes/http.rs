//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, FromRequest, Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::domain::ArtifactKind;
use crate::error::{SessionError, TrainingError};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

/// JSON body extractor whose rejection uses the shared `ErrorOut` shape.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(InvalidRequest))]
pub struct ApiJson<T>(pub T);

/// Undecodable request body: 400 with kind `invalid_request`.
pub struct InvalidRequest(ErrorOut);

impl From<JsonRejection> for InvalidRequest {
  fn from(rejection: JsonRejection) -> Self {
    Self(ErrorOut::new("invalid_request", rejection.body_text()))
  }
}

impl IntoResponse for InvalidRequest {
  fn into_response(self) -> Response {
    tracing::warn!(target: "calibra_backend", message = %self.0.message, "Rejected request body");
    (StatusCode::BAD_REQUEST, Json(self.0)).into_response()
  }
}

fn session_failure(e: SessionError) -> Response {
  let status = match e {
    SessionError::NotFound(_) => StatusCode::NOT_FOUND,
    SessionError::InvalidTransition { .. } | SessionError::NoTrainingNeeded(_) => StatusCode::CONFLICT,
    SessionError::RatingOutOfRange(_) | SessionError::UnknownOption(_) | SessionError::UnknownOutcome(_) => StatusCode::BAD_REQUEST,
  };
  (status, Json(ErrorOut::new(e.kind(), e.to_string()))).into_response()
}

/// All training failures share one status; `kind` tells them apart.
fn training_failure(e: TrainingError) -> Response {
  (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorOut::new(e.kind(), e.to_string()))).into_response()
}

fn artifact_response(result: Result<crate::domain::TrainingArtifact, TrainingError>) -> Response {
  match result {
    Ok(artifact) => Json(ArtifactOut::from(artifact)).into_response(),
    Err(e) => training_failure(e),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, provider_configured: state.trainer.is_configured() })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  body: Option<ApiJson<StartSessionIn>>,
) -> impl IntoResponse {
  let body = body.map(|ApiJson(b)| b).unwrap_or_default();
  let view = start_session(&state, body.user_id).await;
  info!(target: "diagnosis", id = %view.id, "HTTP session started");
  (StatusCode::CREATED, Json(view))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match get_session(&state, &id).await {
    Ok(view) => Json(view).into_response(),
    Err(e) => session_failure(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(self_rating = body.self_rating))]
pub async fn http_post_rating(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  ApiJson(body): ApiJson<RatingIn>,
) -> Response {
  match rate_confidence(&state, &id, body.self_rating).await {
    Ok(view) => Json(view).into_response(),
    Err(e) => session_failure(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(option = %body.option))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  ApiJson(body): ApiJson<AnswerIn>,
) -> Response {
  match submit_answer(&state, &id, &body.option).await {
    Ok(out) => {
      info!(target: "diagnosis", %id, status = %out.outcome.outcome.calibration_status, "HTTP answer diagnosed");
      Json(out).into_response()
    }
    Err(e) => session_failure(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(outcome_index = body.outcome_index, kind = body.kind.as_str()))]
pub async fn http_post_session_training(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  ApiJson(body): ApiJson<SessionTrainingIn>,
) -> Response {
  match session_training(&state, &id, body.outcome_index, body.kind).await {
    Ok(artifact) => Json(ArtifactOut::from(artifact)).into_response(),
    Err(SessionTrainingError::Session(e)) => session_failure(e),
    Err(SessionTrainingError::Training(e)) => training_failure(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(skill = %body.skill_name, context = %body.mistake_context))]
pub async fn http_generate_lesson(State(state): State<Arc<AppState>>, ApiJson(body): ApiJson<GenerateTrainingIn>) -> Response {
  artifact_response(generate_training(&state, body, ArtifactKind::Lesson).await)
}

#[instrument(level = "info", skip(state, body), fields(skill = %body.skill_name, context = %body.mistake_context))]
pub async fn http_generate_simulation(State(state): State<Arc<AppState>>, ApiJson(body): ApiJson<GenerateTrainingIn>) -> Response {
  artifact_response(generate_training(&state, body, ArtifactKind::Simulation).await)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Method, Request},
    Router,
  };
  use serde_json::{json, Value};
  use tower::ServiceExt; // for `oneshot`

  use super::*;
  use crate::config::TrainerConfig;
  use crate::outcomes::TracingOutcomeSink;
  use crate::routes::build_router;
  use crate::training::testing::{ScriptedGenerator, SIMULATION_JSON};

  fn app(generator: Arc<ScriptedGenerator>) -> Router {
    let state = AppState::build(TrainerConfig::default(), generator, Arc::new(TracingOutcomeSink));
    build_router(Arc::new(state))
  }

  async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
      .method(method)
      .uri(uri)
      .header("content-type", "application/json");
    let request = match body {
      Some(b) => request.body(Body::from(b.to_string())),
      None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({}));
    (status, json)
  }

  fn training_body() -> Value {
    json!({ "skillName": "Cold Calling", "mistakeContext": "overconfident", "userLevel": 5 })
  }

  #[tokio::test]
  async fn lesson_endpoint_returns_lesson() {
    let app = app(Arc::new(ScriptedGenerator::new(vec![Ok("  Pause, then pivot.  ".into())])));
    let (status, body) = call(&app, Method::POST, "/generate-training", Some(training_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "lesson": "Pause, then pivot." }));
  }

  #[tokio::test]
  async fn simulation_endpoint_returns_bare_object() {
    let app = app(Arc::new(ScriptedGenerator::new(vec![Ok(SIMULATION_JSON.into())])));
    let (status, body) = call(&app, Method::POST, "/generate-training/simulation", Some(training_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct_option_id"], "b");
    assert_eq!(body["options"].as_array().unwrap().len(), 3);
  }

  #[tokio::test]
  async fn malformed_simulation_is_a_500_with_kind() {
    let two = r#"{"setup":"s","customer_line":"c","options":[
      {"id":"a","text":"t","feedback":"f"},{"id":"b","text":"t","feedback":"f"}],"correct_option_id":"a"}"#;
    let app = app(Arc::new(ScriptedGenerator::new(vec![Ok(two.into())])));
    let (status, body) = call(&app, Method::POST, "/generate-training/simulation", Some(training_body())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], true);
    assert_eq!(body["kind"], "malformed_artifact_error");
    assert!(body.get("options").is_none());
  }

  #[tokio::test]
  async fn missing_credential_is_reported_without_calling_provider() {
    let generator = Arc::new(ScriptedGenerator::unconfigured());
    let app = app(generator.clone());
    let (status, body) = call(&app, Method::POST, "/generate-training", Some(training_body())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "configuration_error");
    assert_eq!(generator.calls(), 0);

    let (_, health) = call(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(health, json!({ "ok": true, "providerConfigured": false }));
  }

  #[tokio::test]
  async fn session_walkthrough_over_http() {
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok("You knew it. Say it with conviction.".into())]));
    let app = app(generator.clone());

    let (status, view) = call(&app, Method::POST, "/api/v1/sessions", Some(json!({ "userId": "u1" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["step"], "self_rating");
    assert_eq!(view["questionCount"], 2);
    assert!(view["question"].get("correct").is_none());
    let id = view["id"].as_str().unwrap().to_string();
    let base = format!("/api/v1/sessions/{id}");

    // Answering before rating is rejected.
    let (status, body) = call(&app, Method::POST, &format!("{base}/answer"), Some(json!({ "option": "B" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_transition");

    let (status, view) = call(&app, Method::POST, &format!("{base}/rating"), Some(json!({ "selfRating": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "testing");
    assert_eq!(view["selfRating"], 1);

    let (_, out) = call(&app, Method::POST, &format!("{base}/answer"), Some(json!({ "option": "B" }))).await;
    assert_eq!(out["outcome"]["calibrationStatus"], "underconfident");
    assert_eq!(out["outcome"]["trainingPath"], "confidence_boost");
    assert_eq!(out["outcome"]["fixGap"], true);
    assert_eq!(out["correctOption"], "B");

    let (status, _) = call(&app, Method::POST, &format!("{base}/rating"), Some(json!({ "selfRating": 9 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    call(&app, Method::POST, &format!("{base}/rating"), Some(json!({ "selfRating": 5 }))).await;
    let (_, out) = call(&app, Method::POST, &format!("{base}/answer"), Some(json!({ "option": "C" }))).await;
    assert_eq!(out["outcome"]["calibrationStatus"], "aligned_expert");
    assert_eq!(out["outcome"]["fixGap"], false);
    assert_eq!(out["session"]["step"], "finished");

    let (status, body) = call(&app, Method::POST, &format!("{base}/training"), Some(json!({ "outcomeIndex": 1 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "no_training_needed");

    let (status, body) = call(&app, Method::POST, &format!("{base}/training"), Some(json!({ "outcomeIndex": 0, "kind": "lesson" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lesson"], "You knew it. Say it with conviction.");
    assert_eq!(generator.calls(), 1);
    assert!(generator.last_prompt().unwrap().contains("imposter syndrome"));
  }

  #[tokio::test]
  async fn undecodable_bodies_get_the_error_shape() {
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let app = app(generator.clone());

    let bad_level = json!({ "skillName": "Cold Calling", "mistakeContext": "overconfident", "userLevel": 9 });
    let (status, body) = call(&app, Method::POST, "/generate-training", Some(bad_level)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
    assert_eq!(body["kind"], "invalid_request");
    assert!(body["message"].as_str().unwrap().contains("userLevel"));

    let bad_context = json!({ "skillName": "Cold Calling", "mistakeContext": "bogus", "userLevel": 3 });
    let (status, body) = call(&app, Method::POST, "/generate-training/simulation", Some(bad_context)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
    assert_eq!(generator.calls(), 0);

    let (_, view) = call(&app, Method::POST, "/api/v1/sessions", None).await;
    let uri = format!("/api/v1/sessions/{}/rating", view["id"].as_str().unwrap());
    let (status, body) = call(&app, Method::POST, &uri, Some(json!({ "selfRating": "high" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
    assert_eq!(body["kind"], "invalid_request");
  }

  #[tokio::test]
  async fn unknown_session_is_404() {
    let app = app(Arc::new(ScriptedGenerator::new(vec![])));
    let (status, body) = call(&app, Method::GET, "/api/v1/sessions/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "session_not_found");
  }
}
