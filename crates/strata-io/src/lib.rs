//! # strata-io: Blob Store Abstraction for Strata
//!
//! This crate provides a trait-based abstraction over the flat key/bytes store
//! that holds partition files, so the object store can run against different
//! backends:
//!
//! - **`FsBlobStore`** (default): keys map to files under a root directory
//! - **`MemoryBlobStore`**: in-process map, used by tests and dry runs; supports
//!   injected write failures
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │      strata-storage      │
//! │  (uses BlobStore trait)  │
//! └────────────┬─────────────┘
//!              │
//! ┌────────────┴─────────────┐
//! │        strata-io         │
//! │  ┌─────────┐  ┌────────┐ │
//! │  │   Fs    │  │ Memory │ │
//! │  │ Backend │  │Backend │ │
//! │  └─────────┘  └────────┘ │
//! └──────────────────────────┘
//! ```
//!
//! Objects are write-once: `put` on an existing key fails with
//! [`IoError::AlreadyExists`].

mod backend;
mod error;
mod fs_backend;
mod memory_backend;

pub use backend::{BlobStore, ObjectMeta, validate_key};
pub use error::IoError;
pub use fs_backend::FsBlobStore;
pub use memory_backend::MemoryBlobStore;

#[cfg(test)]
mod tests;
