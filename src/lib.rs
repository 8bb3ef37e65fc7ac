#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]
//! # lazy4chan
//!
//! lazy4chan is an async client for an imageboard's read-only JSON API.
//!
//! This library can fetch:
//! - boards ([`Client::get_boards`])
//! - threads of a board ([`Client::get_threads`])
//! - archived thread ids ([`Client::get_archive`])
//! - the posts of a thread ([`Client::get_thread`])
//! - a board's catalog ([`Client::get_catalog`])
//!
//! While respecting:
//! - a minimum delay between the start of two requests (1 second by default),
//! - a cap on requests awaiting a response at once (8000 by default).
//!
//! Payloads are returned as [`LazyView`]s, which convert nested objects and
//! arrays only when they are read.
//!
//! ## Example: Printing the subject of a thread.
//!
//! ```rust,no_run
//! # type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
//! use lazy4chan::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::new();
//!     let posts = client.get_thread("po", 570368).await?;
//!
//!     // print thread's OP subject
//!     if let Some(op) = posts.first() {
//!         let subject = op.attr("sub")?.as_str().unwrap_or_default();
//!         println!("op says: {subject}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`LazyView`]: crate::lazy::LazyView

/// Client module contains [`Client`] and the route methods.
pub mod client;

/// Contains the [`Error`]s that can be returned by the library.
///
/// [`Error`]: crate::error::Error
pub mod error;

/// Request pacing and concurrency limiting.
pub mod gate;

/// Lazily converted views over decoded JSON.
pub mod lazy;

pub(crate) mod result;

pub use client::{Client, ClientBuilder};
pub use error::Error;
pub use gate::RequestGate;
pub use lazy::{LazyView, Node, Sequence};
pub use result::Result;
