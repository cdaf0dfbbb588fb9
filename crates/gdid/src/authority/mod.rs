mod accessor;
mod interface;
mod local;
mod remote;

pub use accessor::*;
pub use interface::*;
pub use local::*;
pub use remote::*;
