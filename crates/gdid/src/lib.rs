#![doc = include_str!("../README.md")]

mod allocator;
mod atom;
mod authority;
mod client;
mod config;
mod endpoint;
mod error;
mod gdid;
mod pattern;
mod resolver;
mod transport;

pub use crate::allocator::*;
pub use crate::atom::*;
pub use crate::authority::*;
pub use crate::client::*;
pub use crate::config::*;
pub use crate::endpoint::*;
pub use crate::error::*;
pub use crate::gdid::*;
pub use crate::pattern::*;
pub use crate::resolver::*;
pub use crate::transport::*;
