//! Flags count estimates that diverge from what was actually retrieved.
//!
//! Search-size estimates from mail providers are often stale or inflated. The
//! detector only annotates; it recommends an exact paginated count and leaves
//! the cost decision to the caller.

use crate::core::types::{CountReconciliation, ToolResult};

/// Estimates above this multiple of the retrieved count are flagged.
const RATIO_THRESHOLD: u64 = 2;

/// Compare a retrieved count with a service estimate.
///
/// Returns a reconciliation iff `returned > 0 && total > 2 * returned`.
pub fn detect(returned: u64, total: u64) -> Option<CountReconciliation> {
    if returned == 0 || total <= returned.saturating_mul(RATIO_THRESHOLD) {
        return None;
    }
    Some(CountReconciliation {
        estimated: total,
        actual: returned,
        discrepancy_ratio: total as f64 / returned as f64,
    })
}

impl CountReconciliation {
    /// Warning text for people (and the next planning turn).
    pub fn warning(&self) -> String {
        format!(
            "Service reports {} total results but only {} were retrieved ({:.1}x). \
             The estimate may be inflated; request an exact count (count_all) before relying on it.",
            self.estimated, self.actual, self.discrepancy_ratio
        )
    }
}

/// Attach a discrepancy warning to a count-style result.
///
/// Looks for integer `returned` and `total` payload fields; other results are
/// left untouched. Never changes `success` or the payload.
pub fn annotate(result: &mut ToolResult) -> Option<CountReconciliation> {
    let returned = result.payload.get("returned")?.as_u64()?;
    let total = result.payload.get("total")?.as_u64()?;
    let reconciliation = detect(returned, total)?;
    let warning = reconciliation.warning();
    if !result.warnings.contains(&warning) {
        result.warnings.push(warning);
    }
    Some(reconciliation)
}
