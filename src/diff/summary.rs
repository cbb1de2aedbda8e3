//! Teacher-facing diff summary: mastery changes only, grouped by grade.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DiffResult, FieldValue};
use crate::model::{MasteryVector, TIER_NAMES};

/// One tier that flipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
    pub tier: String,
    pub from: u8,
    pub to: u8,
}

/// One node whose mastery vector moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub uuid: String,
    pub name: String,
    pub from: MasteryVector,
    pub to: MasteryVector,
    pub tiers: Vec<TierChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeGroup {
    pub grade: String,
    pub entries: Vec<StatusEntry>,
}

/// Reads "target → base": the stage being inspected against the stage
/// designated as the baseline, whatever their chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub student: String,
    pub target_stage: String,
    pub base_stage: String,
    /// Sorted by grade.
    pub grades: Vec<GradeGroup>,
    pub added_nodes: usize,
    pub removed_nodes: usize,
    pub changed_nodes: usize,
    pub added_edges: usize,
    pub removed_edges: usize,
}

impl DiffSummary {
    pub fn from_diff(
        student: impl Into<String>,
        target_stage: impl Into<String>,
        base_stage: impl Into<String>,
        diff: &DiffResult,
        unclassified_label: &str,
    ) -> Self {
        let mut by_grade: BTreeMap<String, Vec<StatusEntry>> = BTreeMap::new();

        for (changed, change) in diff.status_changes() {
            let (FieldValue::Status(from), FieldValue::Status(to)) = (&change.from, &change.to) else {
                continue;
            };
            let tiers: Vec<TierChange> = from
                .changed_tiers(to)
                .into_iter()
                .map(|i| TierChange { tier: TIER_NAMES[i].to_string(), from: from.tiers()[i], to: to.tiers()[i] })
                .collect();
            if tiers.is_empty() {
                continue;
            }
            let node = &changed.node;
            let grade = node.grade_key().unwrap_or(unclassified_label).to_string();
            let name = if node.name.is_empty() { node.uuid.clone() } else { node.name.clone() };
            by_grade.entry(grade).or_default().push(StatusEntry {
                uuid: node.uuid.clone(),
                name,
                from: *from,
                to: *to,
                tiers,
            });
        }

        Self {
            student: student.into(),
            target_stage: target_stage.into(),
            base_stage: base_stage.into(),
            grades: by_grade
                .into_iter()
                .map(|(grade, entries)| GradeGroup { grade, entries })
                .collect(),
            added_nodes: diff.added_nodes.len(),
            removed_nodes: diff.removed_nodes.len(),
            changed_nodes: diff.changed_nodes.len(),
            added_edges: diff.added_edges.len(),
            removed_edges: diff.removed_edges.len(),
        }
    }

    pub fn has_status_changes(&self) -> bool {
        !self.grades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::model::{Node, Snapshot};

    #[test]
    fn test_groups_status_changes_by_grade() {
        let base = Snapshot::new(
            "stu",
            "b",
            vec![
                Node::new("n1").with_name("分数").with_grade("三年级"),
                Node::new("n2").with_name("乘法").with_grade("二年级"),
                Node::new("n3").with_name("小数").with_grade("三年级"),
                Node::new("n4").with_grade(""),
            ],
            vec![],
        );
        let target = Snapshot::new(
            "stu",
            "t",
            vec![
                Node::new("n1").with_name("分数").with_grade("三年级").with_status([1, 1, 0]),
                Node::new("n2").with_name("乘法").with_grade("二年级").with_status([0, 0, 1]),
                Node::new("n3").with_name("小数 (新)").with_grade("三年级"),
                Node::new("n4").with_grade("").with_status([1, 0, 0]),
            ],
            vec![],
        );
        let summary = DiffSummary::from_diff("stu", "t", "b", &diff(&base, &target), "Unclassified");
        let grades: Vec<&str> = summary.grades.iter().map(|g| g.grade.as_str()).collect();
        assert_eq!(grades, vec!["Unclassified", "三年级", "二年级"]);
        let third = &summary.grades[1];
        assert_eq!(third.entries.len(), 1, "name-only change is not a status change");
        assert_eq!(third.entries[0].tiers.len(), 2);
        assert_eq!(third.entries[0].tiers[0].tier, "recall/understand");
        assert_eq!(summary.grades[0].entries[0].name, "n4");
        assert_eq!(summary.changed_nodes, 4);
    }

    #[test]
    fn test_blank_grade_uses_given_label() {
        let base = Snapshot::new("stu", "b", vec![Node::new("n1")], vec![]);
        let target = Snapshot::new("stu", "t", vec![Node::new("n1").with_status([0, 1, 0])], vec![]);
        let summary = DiffSummary::from_diff("stu", "t", "b", &diff(&base, &target), "未分类");
        assert_eq!(summary.grades[0].grade, "未分类");
    }
}
