//! # ryt-resolver
//!
//! Resolves a video watch page into a catalog of downloadable streams.
//!
//! ## Features
//!
//! - Lenient extraction of the embedded player response, with a JSON endpoint fallback
//! - Signature deciphering: the transform is located in the player script by
//!   pattern search and executed in a V8 sandbox
//! - Per-script-version cache of extracted transforms
//! - Filtering and deterministic selection of streams by quality criteria
//!
//! ## Example
//!
//! ```rust,no_run
//! use ryt_resolver::{FormatSelectionCriteria, QualityPreference, Resolver, StreamTypePreference};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Resolver::new()?;
//!     let details = resolver.resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
//!
//!     let criteria = FormatSelectionCriteria::new(
//!         StreamTypePreference::AudioOnly,
//!         QualityPreference::BestAudioBitrate,
//!     );
//!     let stream = resolver.choose(&details, &criteria)?;
//!     println!("{}: itag {} -> {}", details.title, stream.itag, stream.url);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use crate::core::{
    FormatSelectionCriteria, MediaStream, QualityPreference, Resolver, ResolverOptions,
    StreamTypePreference, VideoDetails,
};
pub use error::ResolveError;

/// Result type alias for resolver operations
pub type Result<T> = std::result::Result<T, ResolveError>;
