//! Script-variant conversion for EPUB archives.
//!
//! Unpacks an EPUB, converts its content, navigation and package files with a
//! [`convert::ScriptConverter`], applies dictionary overrides, repacks it, and
//! optionally extracts a plain-text rendition.

pub mod archive;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod ops;

pub use error::{ConvertError, Result};
pub use ops::{ConversionReport, ConversionRequest, Pipeline};
