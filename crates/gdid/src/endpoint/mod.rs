#[allow(clippy::module_inception)]
mod endpoint;
mod registry;

pub use endpoint::*;
pub use registry::*;
