pub mod escalation;
pub mod reconciler;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use escalation::{
    execute_plan, format_due_date, is_due, plan_pass, CheckReport, Delivery, EscalationPolicy,
    PlannedNotification,
};
pub use reconciler::{merge_scan, BackfillReport, HistoryReconciler, HistoryScan, HISTORY_PAGE_SIZE};
pub use tracker::{MemberStatus, Tracker};
