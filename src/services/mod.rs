//! Authenticated request pipeline.
//!
//! Leaves first: `envelope` signs and verifies the cookie payload, `session`
//! stores it in the request's cookie jar, `auth_api` talks to the remote auth
//! endpoints, `flight` coalesces concurrent work, `refresh` combines the two
//! for token refresh, and `api_client` is the choke point every outbound API
//! call goes through.

pub mod api_client;
pub mod auth_api;
pub mod envelope;
pub mod flight;
pub mod refresh;
pub mod session;
