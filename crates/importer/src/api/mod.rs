//! Jikan API access layer.

pub mod client;
pub mod rate_limiter;
pub mod types;

pub use client::{FetchFailure, FetchOutcome, JikanClient};
pub use rate_limiter::RateLimiter;
