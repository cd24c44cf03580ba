//! Testing utilities and harness for the fiber reconciler

pub mod deadline;
pub mod faulty_host;
pub mod harness;
pub mod scheduler;

pub use deadline::{StepDeadline, Unbounded};
pub use faulty_host::FaultyHost;
pub use harness::{FlushReport, Harness};
pub use scheduler::ManualScheduler;

pub mod prelude {
    pub use crate::deadline::*;
    pub use crate::faulty_host::*;
    pub use crate::harness::*;
    pub use crate::scheduler::*;
}
