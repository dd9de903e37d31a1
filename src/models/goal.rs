//! Goal state returned by `$/lean/plainGoal`

use serde::{Deserialize, Serialize};

/// Plain-text rendering of the proof state at a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainGoal {
    pub rendered: String,
    /// Per-goal fragments. Servers older than 2021-03-10 omit the field,
    /// which stays `None` rather than an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<String>>,
}

impl PlainGoal {
    pub fn goal_count(&self) -> Option<usize> {
        self.goals.as_ref().map(Vec::len)
    }

    pub fn is_solved(&self) -> bool {
        matches!(&self.goals, Some(goals) if goals.is_empty())
    }
}
