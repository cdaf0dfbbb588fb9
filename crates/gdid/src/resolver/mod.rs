#[allow(clippy::module_inception)]
mod resolver;
mod shard_key;
mod table;

pub use resolver::*;
pub use shard_key::*;
pub use table::*;
