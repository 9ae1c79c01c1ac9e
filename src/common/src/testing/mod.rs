//! Test utilities for the registrar.
//!
//! Only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```

mod catalog;

pub use catalog::StaticCatalog;
