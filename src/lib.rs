//! # helpview-core
//!
//! Client-side core of a browser-hosted help viewer: a lazily loaded
//! navigation tree, search scopes, and an incremental two-tier search engine,
//! all driven by the help server's HTTP endpoints.
//!
//! ## Overview
//!
//! The viewer page shows a table of contents next to a content view. This
//! crate owns everything behind those panels except drawing:
//!
//! - **Navigation**: the table of contents is materialized one level at a time
//!   as the reader expands it, and follows the content view when a topic is
//!   opened from elsewhere (links, search hits, deep links).
//! - **Scopes**: searches can be restricted to the selected book, the
//!   selected chapter, or a named custom scope kept on the server.
//! - **Search**: every keystroke asks for a handful of prefix matches
//!   (type-ahead), a submitted search renders the full result page with
//!   breadcrumb groups and a tri-state filter. Both tiers keep a small FIFO
//!   cache and ignore answers to queries that are no longer live.
//!
//! ## Architecture
//!
//! - **[`channel`]**: GETs against the server; a newer request on a named
//!   channel supersedes the previous one
//! - **[`tree`]**: generic lazy tree control (`TreeWidget`) with selection,
//!   keyboard navigation, deep-link resolution and nearest-first traversal
//! - **[`tristate`]**: tri-state checkbox forests served to a `TreeWidget`
//! - **[`toc`]**: the server's `tocfragment` XML as tree content
//! - **[`scope`]**: the active search scope and the custom scope editor
//! - **[`search`]**: queries, result parsing, caches, hints and grouping
//! - **[`route`]**: the URL fragment grammar used for deep links
//! - **[`viewer`]**: the session object tying the parts together
//!
//! Everything runs on one thread. Components share the request channels
//! through an `Rc`, futures are not `Send`, and no lock is held across an
//! `.await`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use helpview_core::{
//!     channel::HttpFetcher, config::{MemoryClientState, ViewerConfig}, delay::TokioDelay,
//!     search::SearchOutcome, viewer::HelpViewer,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ViewerConfig {
//!         base_url: "http://localhost:8080/help/".to_string(),
//!         ..Default::default()
//!     };
//!     let viewer = HelpViewer::new(HttpFetcher::new(), TokioDelay, config, MemoryClientState::default())?;
//!     viewer.init().await;
//!     print!("{}", viewer.toc().render_text());
//!
//!     if let SearchOutcome::TypeAhead(view) = viewer.type_ahead("edit").await {
//!         for row in view.results {
//!             println!("{}", row.url);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `helpview` CLI (`clap`, `tracing-subscriber`)
//! - **wasm**: browser bindings (`wasm-bindgen`, `tracing-wasm`)

pub mod channel;
pub mod config;
pub mod delay;
pub mod error;
pub mod markup;
pub mod route;
pub mod scope;
pub mod search;
#[cfg(test)]
mod tests;
pub mod toc;
pub mod tree;
pub mod tristate;
pub mod viewer;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::*;
