//! Utility functions for common operations.
//!
//! Currently this is the description normalizer used by the feed parser to
//! turn arbitrary inline HTML into a bounded snippet.
//!
//! # Examples
//!
//! ```
//! use siphon::util::clean_description;
//!
//! assert_eq!(clean_description("line<br>break"), "line break");
//! ```

mod text;

pub use text::{clean_description, SNIPPET_MAX_CHARS};
