//! Structured error type for the store/generation layer.
//!
//! Port target: spec.md §7 (`BlockNotFound`, `TaskWriteFailure`,
//! `RepositoryError`), grounded in
//! `examples/AEtherlight-ai-lumina/crates/aetherlight-core/src/error.rs`'s
//! `thiserror`-derived enum pattern.

use chronopack_core::TaskId;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("time block not found for user on the requested day")]
    BlockNotFound,

    #[error("failed to write back schedule fields for task {0}")]
    TaskWriteFailure(TaskId),

    #[error("repository error: {0}")]
    RepositoryError(String),

    #[error("requested plan window is invalid: {0}")]
    InvalidWindow(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
