//! Core types and shared functionality for graphvc.
//!
//! This crate provides:
//! - Unified error types
//! - Configuration structures
//! - SQLite-backed stores and their migrations
//! - The scrape cache and the fixed-window rate limiter
//! - The knowledge graph model and graph persistence

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod ratelimit;
pub mod store;

pub use cache::{CachedScrape, NoScrapeCache, ScrapeCache, StoreScrapeCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use graph::{GraphEdge, GraphNode, GraphStore, KnowledgeGraph};
pub use ratelimit::{Decision, RateLimit, Tier, Unlimited, Usage, WindowLimiter};
pub use store::Database;
