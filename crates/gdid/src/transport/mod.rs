mod interface;
mod pool;

pub use interface::*;
pub use pool::*;
