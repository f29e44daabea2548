//! Operator-facing activity logging.

pub mod run_log;
