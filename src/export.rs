//! Plain-text rendering of a diff summary.
//!
//! ```text
//! // kg-lens stage comparison
//! // student: 小明
//! // target 20250301_090000 → base 20250115_120000
//! // nodes +2 -1 ~3, edges +4 -0
//!
//! grade: 三年级
//!   - 分数
//!       recall/understand: 0 → 1
//! ```

use std::io::Write;

use crate::diff::DiffSummary;
use crate::Result;

/// Write the summary for a teacher to read. Only mastery changes are
/// listed; structural counts go in the header.
pub fn write_diff_summary(summary: &DiffSummary, writer: &mut dyn Write) -> Result<()> {
    // Header
    writeln!(writer, "// kg-lens stage comparison")?;
    writeln!(writer, "// student: {}", summary.student)?;
    writeln!(writer, "// target {} → base {}", summary.target_stage, summary.base_stage)?;
    writeln!(
        writer,
        "// nodes +{} -{} ~{}, edges +{} -{}",
        summary.added_nodes,
        summary.removed_nodes,
        summary.changed_nodes,
        summary.added_edges,
        summary.removed_edges,
    )?;
    writeln!(writer)?;

    if !summary.has_status_changes() {
        writeln!(writer, "no status changes")?;
        return Ok(());
    }

    for group in &summary.grades {
        writeln!(writer, "grade: {}", group.grade)?;
        for entry in &group.entries {
            writeln!(writer, "  - {}", entry.name)?;
            for tier in &entry.tiers {
                writeln!(writer, "      {}: {} → {}", tier.tier, tier.from, tier.to)?;
            }
        }
    }
    Ok(())
}

/// Convenience wrapper returning the rendering as a `String`.
pub fn diff_summary_to_string(summary: &DiffSummary) -> Result<String> {
    let mut buf = Vec::new();
    write_diff_summary(summary, &mut buf)?;
    String::from_utf8(buf).map_err(|e| crate::Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{GradeGroup, StatusEntry, TierChange};
    use crate::model::MasteryVector;

    fn summary(grades: Vec<GradeGroup>) -> DiffSummary {
        DiffSummary {
            student: "小明".into(),
            target_stage: "t".into(),
            base_stage: "b".into(),
            grades,
            added_nodes: 0,
            removed_nodes: 0,
            changed_nodes: 1,
            added_edges: 2,
            removed_edges: 0,
        }
    }

    #[test]
    fn test_no_changes_line() {
        let text = diff_summary_to_string(&summary(vec![])).unwrap();
        assert!(text.contains("// target t → base b"));
        assert!(text.contains("edges +2 -0"));
        assert!(text.trim_end().ends_with("no status changes"));
    }

    #[test]
    fn test_tier_lines() {
        let text = diff_summary_to_string(&summary(vec![GradeGroup {
            grade: "三年级".into(),
            entries: vec![StatusEntry {
                uuid: "n1".into(),
                name: "分数".into(),
                from: MasteryVector::ZERO,
                to: MasteryVector::new([1, 0, 0]),
                tiers: vec![TierChange { tier: "recall/understand".into(), from: 0, to: 1 }],
            }],
        }]))
        .unwrap();
        assert!(text.contains("grade: 三年级\n  - 分数\n      recall/understand: 0 → 1\n"));
    }
}
