//! # modelsync Testkit
//!
//! Testing utilities for modelsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a builder for entity graphs and ready-made scenarios
//! - **Fault injection**: [`FailingAdapter`], a storage wrapper that fails
//!   chosen saves or goes unavailable on demand
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use modelsync_testkit::generators::workspace_data;
//!
//! proptest! {
//!     #[test]
//!     fn counts_match(data in workspace_data()) {
//!         prop_assert_eq!(data.total_entities(), data.domains.len()
//!             + data.tables.len() + data.systems.len() + data.relationships.len());
//!     }
//! }
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;

pub use faults::FailingAdapter;
pub use fixtures::{init_tracing, orders_workspace, orphan_domain, WorkspaceBuilder};
