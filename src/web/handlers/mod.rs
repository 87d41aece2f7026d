//! HTTP request handlers, organised by domain
//!
//! Handlers stay thin: parameter validation and response shaping here,
//! business logic in the service layer.

pub mod blacklist;
pub mod cache;
pub mod config;
pub mod events;
pub mod health;
pub mod history;
pub mod plugins;
pub mod providers;
pub mod scoring;
pub mod wanted;
pub mod webhooks;
