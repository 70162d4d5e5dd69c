pub mod contact;
pub mod ledger;
pub mod lifecycle;
pub mod workflow;

pub use ledger::BookingLedger;
pub use lifecycle::BookingLifecycle;
pub use workflow::{BookingWorkflow, PendingSelection, WorkflowError, WorkflowStep};
