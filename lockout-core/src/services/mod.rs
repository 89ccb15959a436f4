//! Service layer
//!
//! Services compose the pure lockout evaluator with a persistence gateway, a
//! clock and the event bus.

pub mod lockout;

pub use lockout::LockoutService;
