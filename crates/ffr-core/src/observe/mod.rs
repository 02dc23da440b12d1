//! # Observability
//!
//! Every estimator reports through the `tracing` macros:
//!
//! | level | events |
//! |-------|--------|
//! | `info`  | estimator entry, recording layout |
//! | `debug` | per-taper progress, taper computation, parameter records |
//! | `warn`  | transform-size overrides, noise-floor caveat, degenerate pairs |
//!
//! The library never installs a subscriber itself. Applications (or a
//! resampling harness) call [`init_logging`] once at startup, or install
//! their own subscriber.
//!
//! ```rust,ignore
//! use ffr_core::observe::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development());
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
