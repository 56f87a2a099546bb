use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Subject focus for the current study session
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum LearningMode {
    #[default]
    General,
    Math,
    Science,
    Programming,
    Languages,
    History,
}

impl LearningMode {
    pub fn display_name(&self) -> &'static str {
        self.into()
    }

    pub fn description(&self) -> &'static str {
        match self {
            LearningMode::General => "Any subject, general study help",
            LearningMode::Math => "Proofs, problem solving and worked examples",
            LearningMode::Science => "Concepts, experiments and scientific reasoning",
            LearningMode::Programming => "Code, algorithms and debugging",
            LearningMode::Languages => "Vocabulary, grammar and conversation practice",
            LearningMode::History => "Events, causes and historical context",
        }
    }
}

/// Role in conversation, matching the remote API's turn roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Model,
}

impl ConversationRole {
    /// Label used when the history is shown or exported.
    pub fn label(&self) -> &'static str {
        match self {
            ConversationRole::User => "Student",
            ConversationRole::Model => "Assistant",
        }
    }
}

/// Individual conversation entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: ConversationRole,
    pub content: String,
}

impl ConversationEntry {
    pub fn new(role: ConversationRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!(LearningMode::from_str("math").unwrap(), LearningMode::Math);
        assert_eq!(LearningMode::from_str("HISTORY").unwrap(), LearningMode::History);
        assert!(LearningMode::from_str("chemistry").is_err());
    }

    #[test]
    fn all_six_modes_are_listed() {
        let names: Vec<_> = LearningMode::iter().map(|m| m.display_name()).collect();
        assert_eq!(
            names,
            ["General", "Math", "Science", "Programming", "Languages", "History"]
        );
    }

    #[test]
    fn roles_serialize_as_wire_names() {
        assert_eq!(serde_json::to_string(&ConversationRole::Model).unwrap(), "\"model\"");
        assert_eq!(ConversationRole::User.label(), "Student");
    }
}
