//! Message admission and the generation cycle.

pub mod gate;
pub mod session;

pub use gate::{AdmissionPolicy, BusyFlag, BusyGuard, DropReason};
pub use session::{BotSession, DispatchOutcome};
