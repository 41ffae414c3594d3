//! # Forms Relay Library
//!
//! Backend of the healthcare-forms portal: document intake plus the webhook
//! relay between the DocuSeal signing platform and n8n workflows.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod outbound;
pub mod relay;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub mod webhook_verification;
pub use migration;
