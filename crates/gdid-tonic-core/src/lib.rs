#![doc = include_str!("../README.md")]

mod connector;
mod convert;
mod status;

pub use connector::*;
pub use status::*;
// Public re-export so downstream crates can reach the core types via
// `gdid_tonic_core::gdid`.
pub use gdid;

/// gRPC service and message definitions generated from `proto/gdid.proto`.
///
/// - [`gdid_authority_client::GdidAuthorityClient`] / [`gdid_authority_server::GdidAuthority`]
///   carry the single `AllocateBlock` call.
/// - [`AllocateBlockRequest`] and [`AllocateBlockResponse`] convert to and
///   from [`gdid::BlockRequest`] and [`gdid::GdidBlock`]. Responses are
///   validated on the way in.
pub mod proto {
    #![allow(clippy::all, clippy::pedantic)]
    tonic::include_proto!("gdid");

    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("gdid_descriptor");
}
