//! Application state: question bank, in-memory sessions, the training pipeline
//! and the outcome sink.
//!
//! The provider client is built once here and shared by every request.
//! Sessions idle longer than `session_idle` are dropped by a background sweep.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::RwLock, task::JoinHandle, time::Instant};
use tracing::{debug, error, info, instrument};

use crate::anthropic::{Anthropic, TextGenerator};
use crate::config::{load_trainer_config_from_env, session_idle_from_env, ProviderConfig, TrainerConfig, DEFAULT_SESSION_IDLE};
use crate::domain::SkillQuestion;
use crate::error::{SessionError, TrainingError};
use crate::outcomes::{sink_from_env, OutcomeSink};
use crate::seeds::builtin_questions;
use crate::session::AssessmentSession;
use crate::training::Trainer;

/// A session plus the last time it was created, read or changed.
#[derive(Clone, Debug)]
pub struct StoredSession {
    pub session: AssessmentSession,
    pub touched: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub questions: Arc<[SkillQuestion]>,
    pub sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    pub session_idle: Duration,
    pub trainer: Trainer,
    pub outcomes: Arc<dyn OutcomeSink>,
}

impl AppState {
    /// Build state from env: load config, question bank, provider client and outcome sink.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_trainer_config_from_env().unwrap_or_default();

        let provider_cfg = ProviderConfig::from_env();
        let generator: Arc<dyn TextGenerator> = match Anthropic::new(&provider_cfg) {
            Ok(client) => {
                if client.is_configured() {
                    info!(target: "calibra_backend", base_url = %client.base_url, model = %client.model, "Generation provider enabled.");
                } else {
                    error!(target: "calibra_backend", "ANTHROPIC_API_KEY not set; training requests will fail with a configuration error.");
                }
                Arc::new(client)
            }
            Err(e) => {
                error!(target: "calibra_backend", error = %e, "Generation provider unusable.");
                Arc::new(Unavailable(e))
            }
        };

        let mut state = Self::build(cfg, generator, sink_from_env());
        state.session_idle = session_idle_from_env();
        info!(target: "calibra_backend", idle = ?state.session_idle, "Idle sessions expire");
        state
    }

    /// Assemble state from explicit parts.
    pub fn build(cfg: TrainerConfig, generator: Arc<dyn TextGenerator>, outcomes: Arc<dyn OutcomeSink>) -> Self {
        let mut bank = cfg.question_bank();
        if bank.is_empty() {
            bank = builtin_questions();
        }
        info!(target: "diagnosis", questions = bank.len(), first = %bank[0].id, "Question bank ready");

        Self {
            questions: bank.into(),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            session_idle: DEFAULT_SESSION_IDLE,
            trainer: Trainer::new(cfg.prompts, cfg.generation, generator),
            outcomes,
        }
    }

    pub async fn insert_session(&self, session: AssessmentSession) {
        let stored = StoredSession { touched: Instant::now(), session };
        self.sessions.write().await.insert(stored.session.id.clone(), stored);
    }

    /// Snapshot of a session by id. Reading counts as activity.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_session(&self, id: &str) -> Result<AssessmentSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        stored.touched = Instant::now();
        Ok(stored.session.clone())
    }

    /// Apply a mutation to one session under the write lock.
    pub async fn with_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut AssessmentSession) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        stored.touched = Instant::now();
        f(&mut stored.session)
    }

    /// Drop sessions untouched for at least `session_idle` as of `now`. Returns how many went.
    pub async fn prune_idle_sessions(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.saturating_duration_since(s.touched) < self.session_idle);
        before - sessions.len()
    }

    /// Periodic sweep of idle sessions; runs until the runtime shuts down.
    pub fn spawn_session_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let period = (self.session_idle / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = self.prune_idle_sessions(Instant::now()).await;
                if removed > 0 {
                    debug!(target: "diagnosis", removed, "Idle sessions pruned");
                }
            }
        })
    }
}

/// Stand-in generator when the HTTP client itself could not be built.
struct Unavailable(TrainingError);

#[async_trait::async_trait]
impl TextGenerator for Unavailable {
    fn ensure_configured(&self) -> Result<(), TrainingError> {
        Err(self.0.clone())
    }

    async fn generate(&self, _prompt: &str, _params: &crate::anthropic::ModelParams) -> Result<String, TrainingError> {
        Err(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcomes::TracingOutcomeSink;
    use crate::training::testing::ScriptedGenerator;

    fn state() -> AppState {
        let mut state = AppState::build(
            TrainerConfig::default(),
            Arc::new(ScriptedGenerator::new(vec![])),
            Arc::new(TracingOutcomeSink),
        );
        state.session_idle = Duration::from_secs(3600);
        state
    }

    fn session(state: &AppState, id: &str) -> AssessmentSession {
        AssessmentSession::new(id.into(), None, state.questions.clone())
    }

    #[tokio::test]
    async fn idle_sessions_are_pruned_active_ones_kept() {
        let state = state();
        state.insert_session(session(&state, "old")).await;
        state.insert_session(session(&state, "busy")).await;

        let later = Instant::now() + Duration::from_secs(2 * 3600);
        state.sessions.write().await.get_mut("busy").unwrap().touched = later;

        assert_eq!(state.prune_idle_sessions(later).await, 1);
        assert!(matches!(state.get_session("old").await, Err(SessionError::NotFound(_))));
        assert!(state.get_session("busy").await.is_ok());
    }

    #[tokio::test]
    async fn fresh_sessions_survive_a_sweep() {
        let state = state();
        for i in 0..10 {
            state.insert_session(session(&state, &format!("s{i}"))).await;
        }
        assert_eq!(state.prune_idle_sessions(Instant::now()).await, 0);
        assert_eq!(state.sessions.read().await.len(), 10);
    }

    #[tokio::test]
    async fn activity_refreshes_the_idle_clock() {
        let state = state();
        state.insert_session(session(&state, "s1")).await;
        let before = state.sessions.read().await["s1"].touched;
        tokio::time::sleep(Duration::from_millis(5)).await;
        state.with_session("s1", |_| Ok(())).await.unwrap();
        assert!(state.sessions.read().await["s1"].touched > before);
    }
}
