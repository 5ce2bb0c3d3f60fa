//! # Registration Pipeline Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs    # Drafts and sandbox wiring shared by the tests
//!     ├── scenarios.rs   # End-to-end runs against the sandbox ledger
//!     └── properties.rs  # proptest properties over planning and drafts
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p registry-tests
//! cargo test -p registry-tests integration::scenarios::
//! ```

pub mod integration;
