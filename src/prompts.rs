use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::events::LearningMode;

/// Default system instruction sent with every conversation.
pub const SYSTEM_PROMPT: &str = r#"You are an expert AI learning assistant helping students study effectively.

Core Objectives:
- Explain complex concepts in simple, understandable terms.
- Walk through problems step by step instead of jumping to the answer.
- Encourage critical thinking with thought-provoking questions.
- Adapt explanations to the student's level of understanding.
- Use examples, analogies and visual descriptions when they help.
- Break large topics into manageable chunks.
- Offer practice problems, quizzes and study strategies when appropriate.

Interaction Style:
- Be patient, encouraging and supportive.
"#;

/// Short subject hints shown next to quick actions.
pub static MODE_GUIDANCE: Lazy<HashMap<LearningMode, &'static str>> = Lazy::new(|| {
    use LearningMode::*;

    let mut map = HashMap::new();
    map.insert(General, "Ask about any topic you are studying.");
    map.insert(Math, "Show your working; ask for step-by-step solutions.");
    map.insert(Science, "Ask for the concept first, then the experiment behind it.");
    map.insert(Programming, "Paste code and describe what you expected to happen.");
    map.insert(Languages, "Practice sentences and ask for corrections.");
    map.insert(History, "Ask about causes, consequences and timelines.");
    map
});

pub fn mode_guidance(mode: LearningMode) -> &'static str {
    MODE_GUIDANCE.get(&mode).copied().unwrap_or_default()
}

/// One-shot prompts the REPL can send on the student's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAction {
    Quiz,
    StudyTips,
    PracticeProblem,
}

impl QuickAction {
    pub fn prompt(self, mode: LearningMode) -> String {
        match self {
            QuickAction::Quiz => format!(
                "Generate a 5-question quiz about our recent discussion in {}.",
                mode
            ),
            QuickAction::StudyTips => format!("Provide 5 effective study tips for {}.", mode),
            QuickAction::PracticeProblem => format!(
                "Give me a practice problem for {} at an intermediate level.",
                mode
            ),
        }
    }
}
