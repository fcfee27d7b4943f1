//! Coordination strategies and the coordinator that dispatches to them

mod aggregate;
mod coordinator;
mod feedback;
mod hierarchical;
mod invoke;
mod parallel;
mod sequential;

pub use aggregate::{BranchEntry, BranchStatus};
pub use coordinator::Coordinator;
pub use feedback::FeedbackPhase;
pub use invoke::BudgetExhausted;
