//! Knowledge point node in a student's curriculum graph.

use serde::{Deserialize, Serialize};
use super::MasteryVector;

/// One Bloom-level question/answer pair attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QaPair {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// A normalized knowledge point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Display key, unique within a snapshot.
    pub id: String,
    /// Stable backend identity used to match nodes across snapshots.
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub grade: String,
    pub subject: String,
    pub publisher: String,
    pub status: MasteryVector,
    pub qa_pairs: Vec<QaPair>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            uuid: id.clone(),
            id,
            name: String::new(),
            description: String::new(),
            grade: String::new(),
            subject: String::new(),
            publisher: String::new(),
            status: MasteryVector::ZERO,
            qa_pairs: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = grade.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<MasteryVector>) -> Self {
        self.status = status.into();
        self
    }

    /// Label for display: the name, or the id when the name is blank.
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() { &self.id } else { &self.name }
    }

    /// Grade trimmed, `None` when blank.
    pub fn grade_key(&self) -> Option<&str> {
        let g = self.grade.trim();
        if g.is_empty() { None } else { Some(g) }
    }

    pub fn is_mastered(&self) -> bool {
        self.status.is_mastered()
    }
}
