//! E2E test harness for fragment sessions.
//!
//! This module contains test infrastructure with builders, variants, and
//! methods that not every scenario uses.

#![allow(dead_code)]

pub mod assertions;
pub mod fakes;
pub mod scenario;
pub mod steps;
pub mod workspace;

// Re-export commonly used types
pub use assertions::Slot;
pub use fakes::{FakeAnalyzer, FakeVcs};
pub use scenario::Scenario;
pub use steps::ListKind;
pub use workspace::TestWorkspace;
