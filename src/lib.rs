//! Aula - session and API client for the academic back-office
//!
//! Aula keeps an operator signed in to the back-office identity provider
//! and sends authenticated requests to the back-office REST API, renewing
//! the session when the API rejects an expired token.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, wires the pieces)
//! - [`auth`] - Token Holder, OIDC client and session model
//! - [`http`] - Request decorator, failure recovery and API client
//! - [`store`] - Session storage abstraction
//! - [`config`] - Configuration loading and validation
//! - [`ui`] - Terminal output
//!
//! # Session Invariants
//!
//! 1. The identity provider never receives the API bearer token
//! 2. A protected request is retried at most once, after one refresh
//! 3. A failed refresh always ends the session, exactly once
//! 4. Token values never reach logs, errors or output

pub mod auth;
pub mod cli;
pub mod config;
pub mod http;
pub mod store;
pub mod ui;
