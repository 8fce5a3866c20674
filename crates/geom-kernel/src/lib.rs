pub mod builder;
pub mod config;
pub mod geometry;
pub mod mock_kernel;
pub mod traits;
pub mod types;

pub use config::KernelConfig;
pub use mock_kernel::MockKernel;
pub use traits::*;
pub use types::*;
