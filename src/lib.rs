//! Cartoonify core: deterministic raster stylization and compositing.
//!
//! The library turns a decoded photograph into a stylized variant (cartoon,
//! sketch, oil-paint, color-shifted) or a "cloned-subject" collage, and hands
//! the result back as a plain RGB buffer for the caller to display or encode.
//! Everything runs synchronously on the calling thread; the only parallelism
//! is internal rayon row-splitting inside the filters.

pub mod cli;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod session;

pub use error::Error;
pub use session::{FilterKind, FilterSession, SessionState};
