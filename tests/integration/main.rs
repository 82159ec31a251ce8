//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the shell or the
//! filesystem adapter against the fake board in `mock_board`. All tests
//! run on the host with no hardware attached.

mod fs_tests;
mod interrupt_tests;
mod shell_tests;
