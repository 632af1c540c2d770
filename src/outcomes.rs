//! Outcome persistence collaborator.
//!
//! Recording is fire-and-forget: the session never waits for it and a failed
//! write is only logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::domain::{AssessmentOutcome, CalibrationCategory};

/// What the persistence side stores per answered question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
  pub user_id: String,
  pub skill_id: String,
  pub self_rating: u8,
  pub is_correct: bool,
  pub calibration_status: CalibrationCategory,
}

impl OutcomeRecord {
  pub fn new(user_id: &str, outcome: &AssessmentOutcome) -> Self {
    Self {
      user_id: user_id.to_string(),
      skill_id: outcome.skill_id.clone(),
      self_rating: outcome.self_rating.value(),
      is_correct: outcome.is_correct,
      calibration_status: outcome.calibration_status,
    }
  }
}

#[async_trait]
pub trait OutcomeSink: Send + Sync {
  async fn record(&self, record: OutcomeRecord) -> Result<(), String>;
}

/// Sink that only logs; used when no outcome file is configured.
pub struct TracingOutcomeSink;

#[async_trait]
impl OutcomeSink for TracingOutcomeSink {
  async fn record(&self, record: OutcomeRecord) -> Result<(), String> {
    info!(
      target: "outcomes",
      user = %record.user_id,
      skill = %record.skill_id,
      rating = record.self_rating,
      correct = record.is_correct,
      status = %record.calibration_status,
      "Outcome recorded"
    );
    Ok(())
  }
}

/// Append-only JSONL file, one record per line.
pub struct JsonlOutcomeSink {
  path: PathBuf,
}

impl JsonlOutcomeSink {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[async_trait]
impl OutcomeSink for JsonlOutcomeSink {
  async fn record(&self, record: OutcomeRecord) -> Result<(), String> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await.map_err(|e| format!("failed to create outcome dir: {e}"))?;
    }
    let mut line = serde_json::to_string(&record).map_err(|e| format!("failed to serialize record: {e}"))?;
    line.push('\n');

    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .await
      .map_err(|e| format!("failed to open outcome log: {e}"))?;
    file.write_all(line.as_bytes()).await.map_err(|e| format!("failed to write record: {e}"))?;
    file.flush().await.map_err(|e| format!("failed to flush: {e}"))?;
    Ok(())
  }
}

/// Pick the sink from OUTCOME_LOG_PATH.
pub fn sink_from_env() -> Arc<dyn OutcomeSink> {
  match std::env::var("OUTCOME_LOG_PATH") {
    Ok(path) if !path.trim().is_empty() => {
      let sink = JsonlOutcomeSink::new(path);
      info!(target: "outcomes", path = %sink.path().display(), "Recording outcomes to JSONL file");
      Arc::new(sink)
    }
    _ => Arc::new(TracingOutcomeSink),
  }
}

/// Spawn the write and return immediately. Anonymous sessions are not recorded.
pub fn record_detached(sink: &Arc<dyn OutcomeSink>, user_id: Option<&str>, outcome: &AssessmentOutcome) {
  let Some(user_id) = user_id else {
    debug!(target: "outcomes", skill = %outcome.skill_id, "No user id; outcome not recorded");
    return;
  };
  let record = OutcomeRecord::new(user_id, outcome);
  let sink = sink.clone();
  tokio::spawn(async move {
    let skill = record.skill_id.clone();
    if let Err(e) = sink.record(record).await {
      warn!(target: "outcomes", %skill, error = %e, "Failed to record outcome");
    }
  });
}
