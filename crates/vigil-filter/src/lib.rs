//! Incident filters for Vigil.
//!
//! `vigil-filter` turns a structured [`FilterSpecification`] into the set of
//! incidents it selects. A specification constrains incidents along
//! independent dimensions:
//!
//! - **Source systems**: the incident's source is one of the listed IDs
//! - **Tags**: for every tag key, the incident carries one of the values
//! - **Tri-states**: `open`, `acked` and `stateful` are required, forbidden,
//!   or ignored
//! - **Max level**: the incident is at least as severe as `maxlevel`
//!
//! Dimensions are combined with AND. A specification without any constraint
//! deliberately selects nothing.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use vigil_filter::{FilterEngine, FilterSpecification};
//! use vigil_incident::{Incident, Tag};
//!
//! let incidents = vec![
//!     Incident::builder(1, Utc::now())
//!         .level(2)
//!         .tag(Arc::new(Tag::parse("environment=prod").unwrap()))
//!         .build(1)
//!         .unwrap(),
//! ];
//!
//! let spec = FilterSpecification::new()
//!     .with_tags(["environment=prod"])
//!     .maxlevel(5)
//!     .open(true);
//!
//! let matched = FilterEngine::matching(&spec, &incidents, Utc::now()).unwrap();
//! assert!(matched.contains(1));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod types;

pub use engine::FilterEngine;
pub use error::{FilterError, Result};
pub use types::{CompiledFilter, Filter, FilterId, FilterSpecification};
