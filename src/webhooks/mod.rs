//! Webhooks module
//!
//! This module contains the HTTP server that receives OpsLevel webhook
//! deliveries and rejects the ones whose signature does not verify.

pub mod config;
pub mod server;

pub use config::{WebhookConfig, WebhookConfigError};
pub use server::{
    create_webhook_router, curl_example, health_handler, opslevel_webhook_handler, run_server,
    serve_with_shutdown, AppState, WebhookError, WebhookResult,
};
