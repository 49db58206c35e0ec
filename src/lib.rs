//! OpsLevel webhook signature verification
//!
//! The [`signature`] module rebuilds the content OpsLevel signs and checks
//! the `X-OpsLevel-Signature` header against it. The [`webhooks`] module
//! puts that check in front of an HTTP endpoint.

pub mod logging;
pub mod signature;
pub mod webhooks;
