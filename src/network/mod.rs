//! Network side of the interception layer.

mod client;
mod types;

pub use client::{Fetch, HttpClient};
pub use types::{Request, Response};
