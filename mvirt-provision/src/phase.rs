//! Lifecycle phases a provision record can declare.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of lifecycle intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Create,
    Update,
    Stop,
    Delete,
    Get,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Create,
        Phase::Update,
        Phase::Stop,
        Phase::Delete,
        Phase::Get,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Create => "Create",
            Phase::Update => "Update",
            Phase::Stop => "Stop",
            Phase::Delete => "Delete",
            Phase::Get => "Get",
        }
    }

    /// Dense index used by the operation table.
    pub(crate) fn index(&self) -> usize {
        match self {
            Phase::Create => 0,
            Phase::Update => 1,
            Phase::Stop => 2,
            Phase::Delete => 3,
            Phase::Get => 4,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record's declared phase after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredPhase {
    Known(Phase),
    Unrecognized(String),
}

impl DesiredPhase {
    /// Classify a raw phase string.
    ///
    /// An empty (or all-whitespace) value is the initial state and means
    /// `Create`. Matching is ASCII case-insensitive.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return DesiredPhase::Known(Phase::Create);
        }

        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(trimmed))
            .map(DesiredPhase::Known)
            .unwrap_or_else(|| DesiredPhase::Unrecognized(raw.to_string()))
    }
}
