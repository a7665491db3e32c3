//! Core session engine for the canteen ordering system.
//!
//! Wires the cart store, order submission, status state machine, and query
//! layer into one dependency-injected [`Session`] with a defined lifecycle:
//! built at sign-in from configuration and backend factories, torn down at
//! sign-out. The event bus carries every order mutation to collaborators
//! such as the status-history recorder.

pub mod builder;
pub mod event_bus;
pub mod session;

pub use builder::{default_factories, BuilderError, SessionBuilder, SessionFactories};
pub use event_bus::EventBus;
pub use session::{CheckoutDefaults, Session};
