//! Logging infrastructure for cowfs
//!
//! Events are emitted through `tracing` when the `logging` feature is on and
//! compile to nothing otherwise.
//!
//! # Log Levels
//!
//! - **DEBUG**: routing decisions: copy-up, merged directory views, policy denials
//! - **TRACE**: per-call path classification

use std::borrow::Cow;
use std::path::Path;

/// Longest path rendered in a log line before it is shortened.
pub const MAX_LOGGED_PATH_LEN: usize = 200;

/// Render a path for a log line, keeping the tail of over-long paths.
pub fn display_path(path: &Path) -> Cow<'_, str> {
    let rendered = path.to_string_lossy();
    if rendered.len() <= MAX_LOGGED_PATH_LEN {
        return rendered;
    }
    let mut start = rendered.len() - MAX_LOGGED_PATH_LEN;
    while !rendered.is_char_boundary(start) {
        start += 1;
    }
    Cow::Owned(format!("...{}", &rendered[start..]))
}

/// Debug event about `path`. Fields and message follow the path.
macro_rules! fs_debug {
    ($path:expr, $($arg:tt)+) => {
        #[cfg(feature = "logging")]
        tracing::debug!(path = %$crate::logging::display_path($path), $($arg)+);
        #[cfg(not(feature = "logging"))]
        let _ = $path;
    };
}

/// Trace event about `path`.
macro_rules! fs_trace {
    ($path:expr, $($arg:tt)+) => {
        #[cfg(feature = "logging")]
        tracing::trace!(path = %$crate::logging::display_path($path), $($arg)+);
        #[cfg(not(feature = "logging"))]
        let _ = $path;
    };
}

pub(crate) use fs_debug;
pub(crate) use fs_trace;
