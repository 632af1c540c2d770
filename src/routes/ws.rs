//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::logic::*;
use crate::protocol::{ArtifactOut, ClientWsMessage, ErrorOut, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "calibra_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// What the loop does with one incoming frame.
#[derive(Debug, PartialEq)]
enum Frame {
  Reply(Message),
  Close,
  Ignore,
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "calibra_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match frame_for(msg, &state).await {
      Frame::Reply(reply) => {
        // A closed socket means the learner walked away; any result is dropped here.
        if let Err(e) = socket.send(reply).await {
          error!(target: "calibra_backend", error = %e, "WS send error");
          break;
        }
      }
      Frame::Close => break,
      Frame::Ignore => {}
    }
  }
  info!(target: "calibra_backend", "WebSocket disconnected");
}

async fn frame_for(msg: Message, state: &AppState) -> Frame {
  match msg {
    Message::Text(txt) => {
      // Parse, dispatch, serialize response.
      let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "calibra_backend", "WS received: {:?}", &incoming);
          handle_client_ws(incoming, state).await
        }
        Err(e) => ServerWsMessage::Error { error: ErrorOut::new("invalid_message", format!("Invalid JSON: {}", e)) },
      };

      let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "error": true, "kind": "serialization", "message": format!("Serialization error: {}", e) }).to_string()
      });
      Frame::Reply(Message::Text(out))
    }
    Message::Ping(payload) => Frame::Reply(Message::Pong(payload)),
    Message::Close(_) => Frame::Close,
    _ => Frame::Ignore,
  }
}

fn session_error(e: crate::error::SessionError) -> ServerWsMessage {
  ServerWsMessage::Error { error: ErrorOut::new(e.kind(), e.to_string()) }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartSession { user_id } => {
      let session = start_session(state, user_id).await;
      ServerWsMessage::Session { session }
    }

    ClientWsMessage::GetSession { session_id } => match get_session(state, &session_id).await {
      Ok(session) => ServerWsMessage::Session { session },
      Err(e) => session_error(e),
    },

    ClientWsMessage::RateConfidence { session_id, self_rating } => {
      match rate_confidence(state, &session_id, self_rating).await {
        Ok(session) => ServerWsMessage::Session { session },
        Err(e) => session_error(e),
      }
    }

    ClientWsMessage::SubmitAnswer { session_id, option } => match submit_answer(state, &session_id, &option).await {
      Ok(result) => {
        tracing::info!(target: "diagnosis", %session_id, status = %result.outcome.outcome.calibration_status, "WS answer diagnosed");
        ServerWsMessage::Outcome { result }
      }
      Err(e) => session_error(e),
    },

    ClientWsMessage::RequestTraining { session_id, outcome_index, kind } => {
      match session_training(state, &session_id, outcome_index, kind).await {
        Ok(artifact) => ServerWsMessage::Training { outcome_index, artifact: ArtifactOut::from(artifact) },
        Err(SessionTrainingError::Session(e)) => session_error(e),
        Err(SessionTrainingError::Training(e)) => ServerWsMessage::TrainingError {
          outcome_index,
          error: ErrorOut::new(e.kind(), e.to_string()),
        },
      }
    }
  }
}
