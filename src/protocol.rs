//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{
    ArtifactKind, AssessmentOutcome, CalibrationCategory, QuestionOption, SelfRating, Simulation,
    TrainingArtifact,
};
use crate::session::{AssessmentSession, SessionStep};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartSession {
        #[serde(default, rename = "userId")]
        user_id: Option<String>,
    },
    GetSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    RateConfidence {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "selfRating")]
        self_rating: i64,
    },
    SubmitAnswer {
        #[serde(rename = "sessionId")]
        session_id: String,
        option: String,
    },
    RequestTraining {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "outcomeIndex")]
        outcome_index: usize,
        kind: ArtifactKind,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionView,
    },
    Outcome {
        #[serde(flatten)]
        result: AnswerOut,
    },
    Training {
        #[serde(rename = "outcomeIndex")]
        outcome_index: usize,
        artifact: ArtifactOut,
    },
    TrainingError {
        #[serde(rename = "outcomeIndex")]
        outcome_index: usize,
        #[serde(flatten)]
        error: ErrorOut,
    },
    Error {
        #[serde(flatten)]
        error: ErrorOut,
    },
}

//
// Session views
//

/// Question as shown to the learner; the correct key is never included.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    pub name: String,
    pub category: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeOut {
    #[serde(flatten)]
    pub outcome: AssessmentOutcome,
    pub fix_gap: bool,
}

impl From<&AssessmentOutcome> for OutcomeOut {
    fn from(o: &AssessmentOutcome) -> Self {
        Self { outcome: o.clone(), fix_gap: o.training_path.needs_training() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub step: &'static str,
    pub question_index: usize,
    pub question_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_rating: Option<SelfRating>,
    pub outcomes: Vec<OutcomeOut>,
}

pub fn session_view(s: &AssessmentSession) -> SessionView {
    let self_rating = match s.step() {
        SessionStep::Testing { rating } => Some(rating),
        _ => None,
    };
    SessionView {
        id: s.id.clone(),
        step: s.step().name(),
        question_index: s.index(),
        question_count: s.question_count(),
        question: s.current_question().map(|q| QuestionOut {
            id: q.id.clone(),
            name: q.name.clone(),
            category: q.category.clone(),
            text: q.text.clone(),
            options: q.options.clone(),
        }),
        self_rating,
        outcomes: s.outcomes().iter().map(OutcomeOut::from).collect(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionIn {
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingIn {
    #[serde(rename = "selfRating")]
    pub self_rating: i64,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub option: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub outcome: OutcomeOut,
    pub correct_option: String,
    pub session: SessionView,
}

#[derive(Debug, Deserialize)]
pub struct SessionTrainingIn {
    #[serde(rename = "outcomeIndex")]
    pub outcome_index: usize,
    #[serde(default = "default_kind")]
    pub kind: ArtifactKind,
}

fn default_kind() -> ArtifactKind {
    ArtifactKind::Lesson
}

/// Body of `POST /generate-training[/simulation]`.
#[derive(Debug, Deserialize)]
pub struct GenerateTrainingIn {
    #[serde(rename = "skillName")]
    pub skill_name: String,
    #[serde(rename = "mistakeContext")]
    pub mistake_context: CalibrationCategory,
    #[serde(rename = "userLevel")]
    pub user_level: SelfRating,
}

#[derive(Debug, Serialize)]
pub struct LessonOut {
    pub lesson: String,
}

/// Lesson as `{ lesson }`, simulation as the bare simulation object.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ArtifactOut {
    Lesson(LessonOut),
    Simulation(Simulation),
}

impl From<TrainingArtifact> for ArtifactOut {
    fn from(a: TrainingArtifact) -> Self {
        match a {
            TrainingArtifact::Lesson(lesson) => ArtifactOut::Lesson(LessonOut { lesson }),
            TrainingArtifact::Simulation(sim) => ArtifactOut::Simulation(sim),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: bool,
    pub kind: &'static str,
    pub message: String,
}

impl ErrorOut {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self { error: true, kind, message: message.into() }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub provider_configured: bool,
}
