//! Prelude module - commonly used test utilities.
//!
//! Use `use tether_test::prelude::*;` to import all essential helpers.

// Surfaces
pub use crate::{LoopbackSurface, RecordingSurface};

// Harness
pub use crate::{eventually, setup_test_logging, setup_test_logging_default};

// Fixtures
pub use crate::{TestConfigFile, test_surface_id};
