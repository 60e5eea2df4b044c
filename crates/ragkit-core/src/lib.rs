//! ragkit-core - Core types and traits for ragkit
//!
//! This crate provides the storage and vector store contracts, the
//! backend-neutral [`Condition`] filter DSL, record encoding helpers and
//! the error and configuration types shared by every other crate.

pub mod condition;
pub mod config;
pub mod error;
pub mod record;
pub mod traits;
pub mod types;

pub use condition::{Condition, ConditionValue, FilterAdapter, Operator, Scalar};
pub use config::*;
pub use error::{RagError, Result};
pub use record::{Metadata, Record};
pub use traits::*;
pub use types::*;
