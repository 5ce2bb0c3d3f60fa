//! # Domain Module
//!
//! Core domain types for the registration pipeline.

pub mod draft;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use draft::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
