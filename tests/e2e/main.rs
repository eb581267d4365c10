//! End-to-end tests for fragment sessions.

mod harness;
mod scenarios;
