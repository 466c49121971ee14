//! inlinetest version information.
//!
//! Exposes the tool version as a single constant so the CLI banner and
//! diagnostics agree on the same value.
//!
//! ## Notes
//!
//! - The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.
//! - Prefer this constant over repeating `env!("CARGO_PKG_VERSION")` in multiple places.

/// The inlinetest version string (for example, `0.1.0-alpha.1`).
pub const INLINETEST_VERSION: &str = env!("CARGO_PKG_VERSION");
