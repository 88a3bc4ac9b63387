//! HTTP collaborator subsystem.
//!
//! # Data Flow
//! ```text
//! FetchRequest
//!     → fetch.rs (reqwest request, raced by run_with_timeout)
//!     → status / body classification
//!     → Outcome<T>
//! ```

pub mod fetch;

pub use fetch::{fetch_json, FetchRequest, JsonFetcher};
