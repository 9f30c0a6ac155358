//! WASM oracle-program worker pool and on-disk program cache, `§4.5`.

pub mod adapter;
pub mod call_data;
pub mod error;
pub mod pool;
pub mod program_cache;
pub mod runtime;

pub use adapter::{HttpFetchResponse, HttpVmAdapter, VmAdapter};
pub use call_data::{build_env, VmCallData};
pub use error::WasmError;
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use program_cache::ProgramCache;
pub use runtime::{VmExecutionOutput, WasmRuntime};
