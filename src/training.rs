//! Training request pipeline: configuration check -> prompt -> generation -> validation.
//!
//! The first failing stage short-circuits; callers get either a validated artifact
//! or exactly one `TrainingError`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument};

use crate::anthropic::{ModelParams, TextGenerator};
use crate::config::{GenerationSettings, Prompts};
use crate::domain::{ArtifactKind, AssessmentOutcome, GenerationRequest, TrainingArtifact};
use crate::error::TrainingError;
use crate::normalize::normalize;
use crate::prompt::build_prompt;

#[derive(Clone)]
pub struct Trainer {
  prompts: Prompts,
  settings: GenerationSettings,
  generator: Arc<dyn TextGenerator>,
}

impl Trainer {
  pub fn new(prompts: Prompts, settings: GenerationSettings, generator: Arc<dyn TextGenerator>) -> Self {
    Self { prompts, settings, generator }
  }

  pub fn is_configured(&self) -> bool {
    self.generator.ensure_configured().is_ok()
  }

  #[instrument(
    level = "info",
    skip(self, req),
    fields(skill = %req.skill_name, category = %req.category, rating = %req.self_rating, kind = req.kind.as_str())
  )]
  pub async fn request_training(&self, req: &GenerationRequest) -> Result<TrainingArtifact, TrainingError> {
    let start = Instant::now();
    let result = self.run(req).await;
    match &result {
      Ok(_) => info!(target: "training", elapsed = ?start.elapsed(), "Training artifact ready"),
      Err(e) => error!(target: "training", elapsed = ?start.elapsed(), kind = e.kind(), error = %e, "Training request failed"),
    }
    result
  }

  async fn run(&self, req: &GenerationRequest) -> Result<TrainingArtifact, TrainingError> {
    self.generator.ensure_configured()?;
    let prompt = build_prompt(&self.prompts, req);
    let params = ModelParams::for_kind(req.kind, &self.settings);
    let raw = self.generator.generate(&prompt, &params).await?;
    normalize(&raw, req.kind)
  }

  /// Training for a recorded outcome. The outcome is read, never modified.
  pub async fn train_for_outcome(
    &self,
    outcome: &AssessmentOutcome,
    kind: ArtifactKind,
  ) -> Result<TrainingArtifact, TrainingError> {
    let req = GenerationRequest {
      skill_name: outcome.skill_name.clone(),
      category: outcome.calibration_status,
      self_rating: outcome.self_rating,
      kind,
    };
    self.request_training(&req).await
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  use async_trait::async_trait;

  use super::*;

  /// Scripted generator that counts calls and replays queued responses.
  pub struct ScriptedGenerator {
    configured: bool,
    responses: Mutex<VecDeque<Result<String, TrainingError>>>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
  }

  impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, TrainingError>>) -> Self {
      Self {
        configured: true,
        responses: Mutex::new(responses.into()),
        calls: AtomicUsize::new(0),
        last_prompt: Mutex::new(None),
      }
    }

    pub fn unconfigured() -> Self {
      Self { configured: false, ..Self::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
      self.last_prompt.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl TextGenerator for ScriptedGenerator {
    fn ensure_configured(&self) -> Result<(), TrainingError> {
      if self.configured {
        Ok(())
      } else {
        Err(TrainingError::Configuration("ANTHROPIC_API_KEY is not set".into()))
      }
    }

    async fn generate(&self, prompt: &str, _params: &ModelParams) -> Result<String, TrainingError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
      self
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(TrainingError::Provider("no scripted response".into())))
    }
  }

  pub const SIMULATION_JSON: &str = r#"{"setup":"A shipper calls.","customer_line":"Why you?","options":[
    {"id":"a","text":"Because we're cheap.","feedback":"Price-only pitch."},
    {"id":"b","text":"Let me be your backup when capacity is tight.","feedback":"Low-risk entry."},
    {"id":"c","text":"Our rates beat everyone.","feedback":"Unbelievable claim."}],
    "correct_option_id":"b"}"#;

  pub fn trainer_with(generator: Arc<ScriptedGenerator>) -> Trainer {
    Trainer::new(Prompts::default(), GenerationSettings::default(), generator)
  }
}
