//! Utility functions for hostname handling.

mod hostname;

pub use hostname::{canonical_hostname, hostname_from_display_text};
