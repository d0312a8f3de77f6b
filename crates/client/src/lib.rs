//! Client code for graphvc.
//!
//! This crate provides the outbound side of the service: the SSRF-hardened
//! fetch pipeline, readable-text extraction, bearer token verification, and
//! the LLM graph extraction client.

pub mod auth;
pub mod extract;
pub mod fetch;
pub mod openai;

pub use auth::{AuthError, Claims, TokenVerifier};
pub use extract::{ExtractedContent, extract_text};
pub use fetch::{ContentFetcher, FetchConfig, FetchResult, PageFetcher, UrlValidator};
pub use openai::{Extraction, GraphExtractor, OpenAiClient, OpenAiConfig};
