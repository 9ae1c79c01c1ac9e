pub mod catalog;
pub mod cli;
pub mod config;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{CatalogClient, CatalogError, CatalogInstance};
