//! Router Module Index
//!
//! Routes are split by the access control applied to them as a whole, so a protected
//! endpoint cannot be exposed by forgetting a check inside a handler.

/// Routes open to every client.
pub mod public;

/// Routes behind the bearer-token gate.
pub mod authenticated;

/// Role promotion, class administration and booking writes. Open by default, gated
/// when `PROTECT_MANAGEMENT_ROUTES` is set.
pub mod management;
