//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one part of the
//! supervisor against the mock adapters in [`mock_hw`].  All tests run on
//! the host with no GPIO or I2C required.

mod interlock_tests;
mod mock_hw;
mod race_tests;
mod supervisor_tests;
