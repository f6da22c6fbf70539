//! # nxpack ISR - on-demand revalidation
//!
//! Runtime half of an nxpack deployment. When a page asks to be
//! revalidated, this crate works out which cached artifacts belong to the
//! requested path and asks the platform to purge them.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nxpack_isr::{MemoryTransport, RevalidationManifest, RevalidationResolver, Revalidator};
//! use nxpack_router::manifest::next::PrerenderManifest;
//!
//! #[tokio::main]
//! async fn main() {
//!     let prerender: PrerenderManifest = serde_json::from_str(
//!         r#"{"routes": {"/about": {"initialRevalidateSeconds": false, "dataRoute": "/_next/data/b1/about.json"}}}"#,
//!     )
//!     .unwrap();
//!
//!     let manifest = Arc::new(RevalidationManifest::snapshot(&prerender));
//!     let revalidator = Revalidator::new(
//!         RevalidationResolver::new(manifest, None),
//!         MemoryTransport::new(),
//!     );
//!
//!     let paths = revalidator.revalidate("/about/", "example.com").await.unwrap();
//!     assert_eq!(paths, vec!["/about", "/_next/data/b1/about.json"]);
//! }
//! ```

pub mod config;
pub mod error;
pub mod manifest;
pub mod resolver;
pub mod revalidator;
pub mod transport;

pub use config::{RevalidateConfig, RevalidateTomlConfig};
pub use error::{ResolveError, RevalidateError};
pub use manifest::RevalidationManifest;
pub use resolver::RevalidationResolver;
pub use revalidator::{RevalidationOutcome, Revalidator, REVALIDATE_HEADER};
pub use transport::memory::MemoryTransport;
pub use transport::{InvalidationRequest, InvalidationResponse, InvalidationTransport};

#[cfg(feature = "http")]
pub use transport::http::HttpTransport;
