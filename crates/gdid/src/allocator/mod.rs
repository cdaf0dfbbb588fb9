#[allow(clippy::module_inception)]
mod allocator;
mod allocation;
mod cursor;

pub use allocation::*;
pub use allocator::*;
pub(crate) use cursor::*;
