//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the dispatcher end to end
//! against mock adapters.  All tests run on the host with no secure
//! element or flash required.

mod csr_tests;
mod import_tests;
mod mock_hw;
mod session_tests;
mod setup_tests;
