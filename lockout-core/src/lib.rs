//! Core functionality for the lockout project
//!
//! This crate decides, on each reported failed login, whether to count the
//! failure, restart counting after an expired lock, or impose a time-boxed
//! lock.
//!
//! It includes:
//!
//! - [`evaluate`], the pure state transition, and [`is_locked`], the lock status predicate
//! - [`LockoutPolicy`], the validated configuration
//! - [`LockoutFields`], the accessor trait host entities implement
//! - [`LockoutGateway`] and [`LockoutStore`], the persistence seams
//! - [`LockoutService`], which composes evaluation, persistence, a [`Clock`] and the [`EventBus`]
//!
//! Storage backends live in their own crates and implement [`LockoutStore`].
//!
pub mod clock;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod id;
pub mod mapping;
pub mod policy;
pub mod record;
pub mod repositories;
pub mod services;
pub mod state;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use evaluator::{Decision, evaluate};
pub use events::{Event, EventBus, EventHandler};
pub use mapping::FieldMapping;
pub use policy::{LockoutPolicy, LockoutPolicyBuilder, LockoutPolicyOptions};
pub use record::{LockoutRecord, RecordId};
pub use repositories::{InMemoryLockoutStore, LockoutGateway, LockoutStore};
pub use services::LockoutService;
pub use state::{LockStatus, LockoutFields, LockoutState, is_locked};
