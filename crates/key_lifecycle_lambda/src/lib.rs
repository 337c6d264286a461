//! AWS-oriented adapters and handlers for key lifecycle actions.
//!
//! This crate owns runtime integration details: the Lambda event handler, the
//! action dispatcher, and the collaborator traits the AWS SDK adapters in
//! `src/bin` implement. Domain contracts live in `key_lifecycle_core`.

pub mod adapters;
pub mod error;
pub mod handlers;
