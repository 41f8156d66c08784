//! Common test utilities for playlist-dl integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod stubs;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use stubs::*;
