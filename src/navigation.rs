//! The navigation runtime.
//!
//! This module gives access to `taunus-runtime`: routing, model fetching,
//! caching, link hijacking and history management.
//!
//! ## Architecture
//!
//! - **Router**: colon-syntax patterns shared with the server
//! - **Fetcher**: `?json` model requests, one in flight per source
//! - **Cache**: memory and IndexedDB tiers with bounded read latency
//! - **Activator**: history entries, redirects and full-load fallback
//!
//! ## Example
//!
//! ```rust,ignore
//! use taunus::navigation::{GoOptions, Navigation};
//!
//! match runtime.go("/articles/intro", GoOptions::default()).await? {
//!     Navigation::Rendered { url } => tracing::debug!(%url, "rendered in place"),
//!     Navigation::FullLoad { .. } | Navigation::Aborted => {}
//! }
//! ```

// Re-export all taunus-runtime functionality
pub use taunus_runtime::*;
