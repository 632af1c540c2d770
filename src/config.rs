//! Loading trainer configuration (prompts, generation params, question bank) from TOML,
//! and the provider settings from the environment.
//!
//! See `TrainerConfig`, `Prompts` and `GenerationSettings` for the expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{QuestionOption, SkillQuestion};
use crate::error::TrainingError;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TrainerConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationSettings,
  #[serde(default)]
  pub questions: Vec<QuestionCfg>,
}

/// Question entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub id: String,
  pub name: String,
  #[serde(default)] pub category: String,
  pub text: String,
  pub correct: String,
  #[serde(default)] pub options: Vec<QuestionOption>,
}

impl From<QuestionCfg> for SkillQuestion {
  fn from(q: QuestionCfg) -> Self {
    SkillQuestion {
      id: q.id,
      name: q.name,
      category: q.category,
      text: q.text,
      options: q.options,
      correct: q.correct,
    }
  }
}

impl TrainerConfig {
  /// Valid bank entries in file order; invalid ones are skipped with an error log.
  pub fn question_bank(&self) -> Vec<SkillQuestion> {
    let mut out = Vec::with_capacity(self.questions.len());
    for qc in &self.questions {
      let q = SkillQuestion::from(qc.clone());
      match q.validate() {
        Ok(()) => out.push(q),
        Err(reason) => error!(target: "diagnosis", id = %q.id, %reason, "Skipping bank question."),
      }
    }
    out
  }
}

/// Prompts handed to the generation provider. Placeholders use `{name}` syntax:
/// `persona`, `skill_name`, `category`, `self_rating`, `guidance`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub persona: String,
  pub lesson_template: String,
  pub simulation_template: String,
  pub guidance_overconfident: String,
  pub guidance_underconfident: String,
  pub guidance_novice: String,
  pub guidance_default: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      persona: "You are an expert Freight Broker Sales Trainer.".into(),
      lesson_template: "{persona}\nA learner was just assessed on \"{skill_name}\".\n\nDiagnosis: {category}. {guidance}\nSelf-rated confidence: {self_rating} (where 1=Novice, 5=Expert).\n\nAction:\nWrite a \"Micro-Lesson\" to correct this specific gap.\n1. Keep it under 150 words.\n2. Use a direct, coaching tone.\n3. Provide one specific script or phrase they should use next time.\n4. Do NOT use markdown formatting like ** or ##. Just plain text.".into(),
      simulation_template: "{persona}\nA learner was just assessed on \"{skill_name}\".\n\nDiagnosis: {category}. {guidance}\nSelf-rated confidence: {self_rating} (where 1=Novice, 5=Expert).\n\nAction:\nCreate a short roleplay simulation where the learner answers a customer.\nReturn ONLY a JSON object with exactly these keys:\n{\"setup\": string, \"customer_line\": string, \"options\": [{\"id\": string, \"text\": string, \"feedback\": string}], \"correct_option_id\": string}\nRules:\n- \"options\" has EXACTLY 3 entries with unique ids \"a\", \"b\", \"c\".\n- \"correct_option_id\" is the id of the best response.\n- Each feedback explains why that response works or fails.\n- Output nothing before or after the JSON object. No markdown.".into(),
      guidance_overconfident: "This is a blind spot the learner does not know about; be firm but encouraging.".into(),
      guidance_underconfident: "The learner answered correctly but doubts themselves (imposter syndrome); validate the instinct and boost certainty.".into(),
      guidance_novice: "The learner is new to this; keep it foundational and simple.".into(),
      guidance_default: "Give a standard correction.".into(),
    }
  }
}

/// Sampling settings per artifact kind.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
  pub lesson_max_tokens: u32,
  pub lesson_temperature: f32,
  pub simulation_max_tokens: u32,
  pub simulation_temperature: f32,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      lesson_max_tokens: 300,
      lesson_temperature: 0.7,
      simulation_max_tokens: 1024,
      simulation_temperature: 0.5,
    }
  }
}

/// Provider settings, read once at process start.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub timeout: Duration,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: "https://api.anthropic.com/v1".into(),
      model: "claude-3-5-sonnet-20240620".into(),
      timeout: Duration::from_secs(20),
    }
  }
}

impl ProviderConfig {
  pub fn from_env() -> Self {
    let defaults = Self::default();
    let timeout = std::env::var("PROVIDER_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .filter(|s| *s > 0)
      .map(Duration::from_secs)
      .unwrap_or(defaults.timeout);
    Self {
      api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
      base_url: std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url),
      model: std::env::var("ANTHROPIC_MODEL").unwrap_or(defaults.model),
      timeout,
    }
  }

  /// The credential must be present and non-blank.
  pub fn validate(&self) -> Result<&str, TrainingError> {
    match self.api_key.as_deref().map(str::trim) {
      Some(key) if !key.is_empty() => Ok(key),
      _ => Err(TrainingError::Configuration("ANTHROPIC_API_KEY is not set".into())),
    }
  }
}

/// Sessions untouched this long are dropped.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(60 * 60);

/// SESSION_IDLE_SECS, or the default when unset, unparsable or zero.
pub fn session_idle_from_env() -> Duration {
  parse_idle_secs(std::env::var("SESSION_IDLE_SECS").ok().as_deref())
}

fn parse_idle_secs(raw: Option<&str>) -> Duration {
  raw
    .and_then(|s| s.trim().parse::<u64>().ok())
    .filter(|s| *s > 0)
    .map(Duration::from_secs)
    .unwrap_or(DEFAULT_SESSION_IDLE)
}

pub fn parse_trainer_config(s: &str) -> Result<TrainerConfig, toml::de::Error> {
  toml::from_str::<TrainerConfig>(s)
}

/// Attempt to load `TrainerConfig` from TRAINER_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_trainer_config_from_env() -> Option<TrainerConfig> {
  let path = std::env::var("TRAINER_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_trainer_config(&s) {
      Ok(cfg) => {
        info!(target: "calibra_backend", %path, questions = cfg.questions.len(), "Loaded trainer config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "calibra_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "calibra_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
