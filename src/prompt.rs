//! Generation request text, parameterized per calibration category and artifact kind.

use crate::config::Prompts;
use crate::domain::{ArtifactKind, CalibrationCategory, GenerationRequest};
use crate::util::fill_template;

/// Category-specific coaching guidance.
pub fn guidance_for<'a>(prompts: &'a Prompts, category: CalibrationCategory) -> &'a str {
  match category {
    CalibrationCategory::Overconfident => &prompts.guidance_overconfident,
    CalibrationCategory::Underconfident => &prompts.guidance_underconfident,
    CalibrationCategory::Novice => &prompts.guidance_novice,
    CalibrationCategory::AlignedExpert => &prompts.guidance_default,
  }
}

pub fn build_prompt(prompts: &Prompts, req: &GenerationRequest) -> String {
  let template = match req.kind {
    ArtifactKind::Lesson => &prompts.lesson_template,
    ArtifactKind::Simulation => &prompts.simulation_template,
  };
  let rating = req.self_rating.to_string();
  fill_template(
    template,
    &[
      ("persona", prompts.persona.as_str()),
      ("skill_name", req.skill_name.as_str()),
      ("category", req.category.as_str()),
      ("self_rating", rating.as_str()),
      ("guidance", guidance_for(prompts, req.category)),
    ],
  )
}
