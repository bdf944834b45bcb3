//! Scenario-based tests for matrix-pipeline

mod coverage_upload;
mod fail_fast;
mod matrix_expansion;
mod soft_fail;
