//! Observability utilities.

mod logging;

pub use logging::{build_filter, init_logging, init_stderr_logging};
