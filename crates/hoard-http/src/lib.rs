//! HTTP adapters for hoard.
//!
//! [`HttpClient`] implements the byte-source port used by the download
//! manager (with `Range` requests for resume) and the thumbnail-fetch port
//! used by the thumbnail cache.

#![deny(unsafe_code)]

mod client;
mod config;
mod error;

pub use client::HttpClient;
pub use config::HttpClientConfig;
pub use error::HttpError;
