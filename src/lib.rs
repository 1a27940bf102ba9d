//! An in-process fake HTTP server for exercising HTTP client code against
//! deterministic, canned responses without a real backend.
//!
//! Register the (route, method) pairs a test expects, each with the response
//! it should produce, then start a real listener:
//!
//! ```
//! use httpfake::FakeServer;
//! use std::collections::HashMap;
//!
//! let mut server = FakeServer::new();
//! server.add_route(
//!     "users/42",
//!     "GET",
//!     HashMap::new(),
//!     200,
//!     r#"{"name":"ada"}"#,
//!     HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
//! );
//!
//! let handle = server.start().unwrap();
//! // Point the HTTP client under test at the server.
//! let url = format!("{}/users/42", handle.base_url());
//!
//! server.close();
//! ```
//!
//! # Matching
//!
//! A request matches by exact lookup of its route key — the request target,
//! query string included, with the leading `/` stripped — and its method.
//! Required parameters declared at registration may arrive through the
//! query string, a form-encoded body, or a flat JSON object body; the
//! form/query source is consulted first and the JSON body second. Anything
//! that does not match gets a fixed `404` with body `{"error":"Not Found"}`.
//!
//! # Lifecycle
//!
//! The route table is mutable only while the server is stopped.
//! [`FakeServer::add_route`] and [`FakeServer::remove_route`] report refusal
//! by returning `false` while it runs, which is what makes the table safe to
//! read concurrently from every in-flight request without locking writes.
//! [`FakeServer::close`] stops the listener gracefully and re-opens the
//! table, so one fake can serve several test phases in sequence.

mod connection;
mod error;
mod event_loop;
mod fake_server;
mod request;
mod responder;
mod response;
mod routes;
mod server_handle;
pub mod status;

pub use fake_server::FakeServer;
pub use server_handle::{ServerExitReason, ServerHandle};
