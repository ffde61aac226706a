//! Conference-management backend: profiles, conferences, sessions,
//! registration and a session wishlist, over an authoritative in-memory
//! entity store with an append-only SQLite journal.
//!
//! # Examples
//!
//! In-memory store with the API on top:
//! ```
//! use confdesk::{
//!     api::ConferenceApi,
//!     config::AppConfig,
//!     core::store::EntityStore,
//!     forms::{ConferenceForm, ConferenceGetRequest},
//!     runtime::handle::spawn_store,
//!     types::Identity,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = AppConfig::default();
//! let store = spawn_store(EntityStore::new(), None, config.runtime.clone());
//! let (api, _worker) = ConferenceApi::start(store.clone(), &config);
//!
//! let alice = Identity {
//!     user_id: "alice".to_string(),
//!     email: "alice@example.com".to_string(),
//!     nickname: "Alice".to_string(),
//! };
//! let created = api
//!     .create_conference(Some(&alice), ConferenceForm {
//!         name: Some("RustConf".to_string()),
//!         max_attendees: Some(10),
//!         ..ConferenceForm::default()
//!     })
//!     .await
//!     .expect("create");
//!
//! let request = ConferenceGetRequest {
//!     websafe_conference_key: created.websafe_key.clone().expect("key"),
//! };
//! assert!(api.register_for_conference(Some(&alice), &request).await.expect("register").data);
//! let conf = api.get_conference(&request).await.expect("get");
//! assert_eq!(conf.seats_available, Some(9));
//! store.shutdown().await.expect("shutdown");
//! # }
//! ```
//!
//! Journaled runtime:
//! ```no_run
//! use confdesk::{
//!     persist::sqlite::SqliteOpSink,
//!     runtime::handle::{spawn_store, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteOpSink::open("confdesk.db").expect("open sqlite");
//! let store = sink.load_store().expect("replay");
//! let handle = spawn_store(store, Some(Box::new(sink)), RuntimeConfig::default());
//! handle.checkpoint().await.expect("checkpoint");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Endpoint operations.
pub mod api;
/// Environment-driven configuration.
pub mod config;
/// Core in-memory store, indices and query evaluation.
pub mod core;
/// API error taxonomy.
pub mod error;
/// Featured-speaker job queue, worker and shared cache.
pub mod featured;
/// Filter descriptor compiler.
pub mod filter;
/// Wire messages and record mapping.
pub mod forms;
/// Entity keys and websafe encoding.
pub mod key;
/// Stored records and their queryable properties.
pub mod model;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Registration and wishlist transitions.
pub mod registration;
/// JSON-lines RPC dispatch.
pub mod rpc;
/// Single-writer runtime handle, transactions and events.
pub mod runtime;
/// Tracing setup.
pub mod telemetry;
/// Shared primitive types and enums.
pub mod types;
