//! Order lifecycle module for the ordering core.
//!
//! Covers the three pieces with real state and consistency concerns:
//! submission (materializing a cart into an order plus its lines against a
//! store without client-side transactions), the status state machine gating
//! every later mutation, and the staged query layer that stitches orders
//! together with their related rows.

/// Order list queries, enrichment, and vendor analytics.
pub mod query;
/// Order status state machine: vendor advances and customer cancellation.
pub mod state;
/// Checkout: order + line inserts with a compensating delete on failure.
pub mod submission;

pub use query::{ListOptions, OrderQueryService, QueryError, VendorAnalytics};
pub use state::{OrderStateMachine, TransitionError};
pub use submission::{CheckoutRequest, LineInput, SubmissionService, SubmitError};
