//! # sovran-datastore
//!
//! An in-memory key/value store with change notification.
//!
//! `sovran-datastore` lets independently written components share state without
//! knowing about each other: one side writes values under string keys, the
//! other side subscribes to the keys it cares about and is told when they
//! change.
//!
//! ## Key Features
//!
//! - **Change-gated**: writing a structurally equal value is a no-op and emits nothing
//! - **Isolated**: values are copied on the way in, on the way out, and into every event
//! - **Synchronous**: listeners run in registration order before `set` returns
//! - **Re-entrant**: listeners may read, write, subscribe, and unsubscribe from inside a callback
//! - **Shareable**: `Store` is a cheap `Clone` handle built on `Arc<Mutex<_>>`
//!
//! ## Events
//!
//! Every change that is not `silent` emits two events, in this order:
//!
//! | Event              | Arguments        |
//! |--------------------|------------------|
//! | `"changed"`        | `[key, value]`   |
//! | `"changed::<key>"` | `[value]`        |
//!
//! A deleted key is announced with a `None` value.
//!
//! ## Usage Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use serde_json::json;
//! use sovran_datastore::{SetOptions, Store, StoreError};
//!
//! fn main() -> Result<(), StoreError> {
//!     let store = Store::create();
//!
//!     // Missing keys are not an error
//!     assert_eq!(store.get("theme")?, None);
//!
//!     store.set("theme", json!("dark"), SetOptions::default())?;
//!     store.set("window", json!({ "width": 800, "height": 600 }), SetOptions::default())?;
//!
//!     assert_eq!(store.get("theme")?, Some(json!("dark")));
//!
//!     // Several keys at once
//!     store.set_many(
//!         [("lang", json!("en-US")), ("beta", json!(false))],
//!         SetOptions::default(),
//!     )?;
//!     assert_eq!(store.keys()?, vec!["beta", "lang", "theme", "window"]);
//!
//!     // Delete a key
//!     store.unset("beta", SetOptions::default())?;
//!     assert!(!store.contains_key("beta")?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Watching a Key
//!
//! ```rust
//! use serde_json::json;
//! use sovran_datastore::{SetOptions, Store, StoreError};
//! use std::sync::{Arc, Mutex};
//!
//! fn main() -> Result<(), StoreError> {
//!     let store = Store::create();
//!     let renders = Arc::new(Mutex::new(Vec::new()));
//!
//!     let sink = Arc::clone(&renders);
//!     store.on_key_changed("theme", move |theme| {
//!         sink.lock().unwrap().push(theme.cloned());
//!         Ok(())
//!     })?;
//!
//!     store.set("theme", json!("dark"), SetOptions::default())?;
//!     store.set("theme", json!("dark"), SetOptions::default())?; // unchanged
//!     store.set("theme", json!("light"), SetOptions::silent())?; // not announced
//!
//!     assert_eq!(*renders.lock().unwrap(), vec![Some(json!("dark"))]);
//!     assert_eq!(store.get("theme")?, Some(json!("light")));
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Error Handling
//!
//! Listener failures reach the caller of `set`. The value is already stored by
//! then, and listeners after the failing one are skipped.
//!
//! ```rust
//! use serde_json::json;
//! use sovran_datastore::{SetOptions, Store, StoreError};
//!
//! let store = Store::create();
//! store
//!     .on_key_changed("port", |port| match port.and_then(|p| p.as_u64()) {
//!         Some(p) if p > 65535 => Err(format!("port {} out of range", p).into()),
//!         _ => Ok(()),
//!     })
//!     .unwrap();
//!
//! match store.set("port", json!(70000), SetOptions::default()) {
//!     Ok(()) => println!("stored"),
//!     Err(StoreError::Listener { event, source }) => println!("{} rejected: {}", event, source),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```

mod error;
mod notifier;
mod options;
mod store;

pub use error::{ListenerError, StoreError};
pub use notifier::{ListenerId, Notifier};
pub use options::SetOptions;
pub use store::{changed_event, Args, Store, CHANGED};

// Re-export the value type for convenience
pub use serde_json::Value;
