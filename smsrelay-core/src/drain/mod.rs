//! Bounded message drain: quota, listening window and single-response finalization

pub mod coordinator;
pub mod session;

pub use coordinator::{DrainCoordinator, DrainError, Trigger};
pub use session::{Admission, DrainSession};
