//! A genetic-programming engine that evolves directed-acyclic workflow
//! graphs of LLM agents toward an external fitness objective. This crate
//! re-exports the full public surface of the member crates.

pub use evoflow_engines::*;
pub use evoflow_error::{ErrorCode, PersistenceKind};
