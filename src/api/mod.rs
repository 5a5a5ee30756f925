//! Dispatch backend API client and the completion submission contract.

pub mod client;
pub mod completion;
pub mod error;
pub mod jobs;

pub use client::ApiClient;
pub use error::ApiError;
