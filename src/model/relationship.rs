//! Relationship (edge) between knowledge points.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Relation kind. The curriculum export uses a small fixed vocabulary;
/// anything else is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationKind {
    /// 前置知识
    Prerequisite,
    /// 包含
    Contains,
    /// 区分排斥
    Exclusive,
    /// 一般关联
    Related,
    Other(String),
}

impl RelationKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "前置知识" => Self::Prerequisite,
            "包含" => Self::Contains,
            "区分排斥" => Self::Exclusive,
            "一般关联" => Self::Related,
            other => match other.to_ascii_lowercase().as_str() {
                "prerequisite" => Self::Prerequisite,
                "contains" => Self::Contains,
                "exclusive" => Self::Exclusive,
                "related" => Self::Related,
                _ => Self::Other(other.to_string()),
            },
        }
    }

    /// Canonical text, as stored in snapshots.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Prerequisite => "前置知识",
            Self::Contains => "包含",
            Self::Exclusive => "区分排斥",
            Self::Related => "一般关联",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RelationKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<RelationKind> for String {
    fn from(k: RelationKind) -> Self {
        k.as_str().to_string()
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    pub description: String,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        kind: RelationKind,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            kind,
            description: String::new(),
        }
    }

    /// Identity tuple over this edge's own endpoint ids.
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            from: self.from.clone(),
            kind: self.kind.as_str().to_string(),
            to: self.to.clone(),
        }
    }

    /// The "other" end of the edge from the given node.
    pub fn other_end(&self, node: &str) -> Option<&str> {
        if node == self.from { Some(&self.to) }
        else if node == self.to { Some(&self.from) }
        else { None }
    }
}

/// `(from-uuid, type, to-uuid)`. Edges have no durable id across
/// independently generated snapshots, so this tuple is their identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: String,
    pub kind: String,
    pub to: String,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.from, self.kind, self.to)
    }
}
