//! Tallybook session gateway.
//!
//! A backend-for-frontend that owns the browser's signed `session` cookie,
//! attaches bearer tokens to outbound API calls, refreshes them once on
//! `401`, and guards page navigation.

pub mod config;
pub mod routes;
pub mod services;
pub mod state;
