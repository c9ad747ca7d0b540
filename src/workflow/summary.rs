use serde::Serialize;

use crate::models::{AuditCount, CountStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub pending: usize,
    pub counted: usize,
    pub verified: usize,
    pub adjusted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscrepancyStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub pending_adjustment: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityTotals {
    pub expected: i64,
    pub counted: i64,
    pub difference: i64,
}

/// Live roll-up of an audit's count lines. Always recomputed; never read from
/// the counters cached on the audit row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub total_items: usize,
    pub by_status: StatusBreakdown,
    pub discrepancies: DiscrepancyStats,
    pub quantities: QuantityTotals,
    pub progress: u8,
}

pub fn summarize(lines: &[AuditCount]) -> AuditSummary {
    let mut summary = AuditSummary {
        total_items: lines.len(),
        ..Default::default()
    };

    for line in lines {
        match line.status {
            CountStatus::Pending => summary.by_status.pending += 1,
            CountStatus::Counted => summary.by_status.counted += 1,
            CountStatus::Verified => summary.by_status.verified += 1,
            CountStatus::Adjusted => summary.by_status.adjusted += 1,
            CountStatus::Skipped => summary.by_status.skipped += 1,
        }

        summary.quantities.expected += i64::from(line.expected_quantity);
        summary.quantities.counted += i64::from(line.counted_quantity.unwrap_or(0));

        if line.status == CountStatus::Skipped {
            continue;
        }
        if let Some(d) = line.discrepancy.filter(|d| *d != 0) {
            summary.discrepancies.total += 1;
            if d > 0 {
                summary.discrepancies.positive += 1;
            } else {
                summary.discrepancies.negative += 1;
            }
            if !line.adjustment_approved && line.status != CountStatus::Adjusted {
                summary.discrepancies.pending_adjustment += 1;
            }
        }
    }

    summary.quantities.difference = summary.quantities.counted - summary.quantities.expected;

    if !lines.is_empty() {
        let resolved = (lines.len() - summary.by_status.pending) as f64;
        let progress = (resolved / lines.len() as f64 * 100.0).round() as u8;
        // 100 is reserved for "nothing pending"; 199/200 must not round up.
        summary.progress = if summary.by_status.pending > 0 {
            progress.min(99)
        } else {
            progress
        };
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fixtures::{counted_line, line};
    use uuid::Uuid;

    #[test]
    fn test_empty_audit_has_zero_progress() {
        let s = summarize(&[]);
        assert_eq!(s.progress, 0);
        assert_eq!(s.total_items, 0);
    }

    #[test]
    fn test_summary_counts_statuses_and_discrepancies() {
        let pending = line(Uuid::new_v4(), Uuid::new_v4(), 6);
        let over = counted_line(10, 12);
        let short = counted_line(10, 7);
        let exact = counted_line(5, 5);
        let mut adjusted = counted_line(8, 4);
        adjusted.status = CountStatus::Adjusted;
        adjusted.adjustment_approved = true;
        let mut skipped = counted_line(3, 1);
        skipped.status = CountStatus::Skipped;

        let s = summarize(&[pending, over, short, exact, adjusted, skipped]);

        assert_eq!(
            s.by_status,
            StatusBreakdown { pending: 1, counted: 3, verified: 0, adjusted: 1, skipped: 1 }
        );
        assert_eq!(
            s.discrepancies,
            DiscrepancyStats { total: 3, positive: 1, negative: 2, pending_adjustment: 2 }
        );
        assert_eq!(s.quantities.expected, 42);
        assert_eq!(s.quantities.counted, 29);
        assert_eq!(s.quantities.difference, -13);
        // 5 of 6 resolved
        assert_eq!(s.progress, 83);
    }

    #[test]
    fn test_progress_is_100_only_without_pending_lines() {
        let lines = vec![counted_line(1, 1), counted_line(2, 2)];
        assert_eq!(summarize(&lines).progress, 100);

        let mut with_pending = lines.clone();
        with_pending.push(line(Uuid::new_v4(), Uuid::new_v4(), 1));
        assert!(summarize(&with_pending).progress < 100);
    }

    #[test]
    fn test_progress_never_rounds_up_to_100_with_pending() {
        let mut lines: Vec<_> = (0..199).map(|_| counted_line(1, 1)).collect();
        lines.push(line(Uuid::new_v4(), Uuid::new_v4(), 1));
        assert_eq!(summarize(&lines).progress, 99);
    }
}
