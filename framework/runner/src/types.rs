/// Recommended error type for code that drives the harness, such as a `main` function or a
/// workload set loader. Strategy runners report per-workload problems through
/// [exec_harness_core::prelude::ExecutionError] instead.
pub type HarnessResult<T> = anyhow::Result<T>;
