mod block;
mod id;
mod ledger;

pub use block::*;
pub use id::*;
pub use ledger::*;
