//! Shared key lifecycle domain primitives.
//!
//! This crate owns the request/response contract, request normalization, the
//! key state model, and the safety policy. It intentionally excludes AWS SDK
//! and Lambda runtime concerns; those live in `key_lifecycle_lambda`.

pub mod aliases;
pub mod contract;
pub mod key_state;
pub mod policy;
