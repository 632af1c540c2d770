//! Built-in question bank so the app is usable without a config file.

use crate::domain::{QuestionOption, SkillQuestion};

fn opt(key: &str, text: &str) -> QuestionOption {
  QuestionOption { key: key.into(), text: text.into() }
}

/// Freight brokerage assessment, in presentation order.
pub fn builtin_questions() -> Vec<SkillQuestion> {
  vec![
    SkillQuestion {
      id: "SK-FB-01".into(),
      name: "Cold Calling".into(),
      category: "Sales".into(),
      text: "You call a Shipping Manager who says 'We treat our incumbents like family.' What is the best door-opener?".into(),
      options: vec![
        opt("A", "Ask if their family ever misses appointments."),
        opt("B", "Pivot: 'I don't want to replace them, just be your backup when they are overbooked.'"),
        opt("C", "Offer to beat their rates by 20% immediately."),
        opt("D", "Hang up and try the next lead."),
      ],
      correct: "B".into(),
    },
    SkillQuestion {
      id: "SK-FB-02".into(),
      name: "Rate Negotiation".into(),
      category: "Sales".into(),
      text: "Spot Market is tight. A carrier wants $3,000 for a $2,500 load. You have $400 margin. The customer is TQL (Time Sensitive).".into(),
      options: vec![
        opt("A", "Pay the $3,000 and take the loss to save the relationship."),
        opt("B", "Cancel the load and tell the customer no trucks are available."),
        opt("C", "Counter at $2,700, sell the 'easy pickup', and call 5 more carriers."),
        opt("D", "Tell the carrier he is crazy and hang up."),
      ],
      correct: "C".into(),
    },
  ]
}
