//! # Scoped Search
//!
//! A permission-aware Elasticsearch tool server for MCP clients.
//!
//! Callers send ordinary query DSL together with a user id. Before the
//! query reaches the cluster it is narrowed to the documents that user may
//! see, using a per-user scope record cached in Redis. Responses are
//! reduced to plain-text fragments: aggregation summaries, a metadata line,
//! and highlighted hits.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │  Redis   │──▶│  scope   │──▶│  filter  │──▶│ compose  │
//! │  scope   │   │normalize │   │ strategy │   │  inject  │
//! └──────────┘   └──────────┘   └──────────┘   └────┬─────┘
//!                                                   ▼
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │  tools   │◀──│  reduce  │◀──│  search  │◀──│highlight │
//! │ MCP/HTTP │   │ fragments│   │    ES    │   │ mappings │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ES_URL=http://localhost:9200 REDIS_URL=redis://localhost scoped-search serve stdio
//! scoped-search compose --index cdc_line_items --user u-42 --body '{"size":5}'
//! scoped-search serve http
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, environment overlay, validation |
//! | [`models`] | Core data types |
//! | [`scope`] | Permission scope parsing and the [`scope::ScopeStore`] trait |
//! | [`cache`] | Redis-backed scope store |
//! | [`filter`] | Per-index permission filter selection |
//! | [`compose`] | Merging the permission filter into a query |
//! | [`highlight`] | Mapping-driven highlight directive |
//! | [`reduce`] | Search response to text fragments |
//! | [`engine`] | Elasticsearch client |
//! | [`gateway`] | One scoped search, end to end |
//! | [`tools`] | Tool trait, built-in tools, registry |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | stdio and HTTP transports |

pub mod cache;
pub mod compose;
pub mod config;
pub mod engine;
pub mod filter;
pub mod gateway;
pub mod highlight;
pub mod mcp;
pub mod models;
pub mod reduce;
pub mod scope;
pub mod server;
pub mod tools;
