//! Storefront checkout & payment-reconciliation engine
//!
//! Accepts a cart, computes an authoritative price, opens a provider-hosted
//! payment session, and later reconciles the provider's asynchronous
//! confirmation (or failure) against local order and inventory state.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod payments;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: services::AppServices,
}
