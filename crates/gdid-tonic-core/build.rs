//! Generates the gRPC client and server bindings for `proto/gdid.proto`.
//!
//! The file descriptor set is written next to the generated code so the server
//! can register it with the reflection service:
//!
//! ```rust
//! pub mod proto {
//!     tonic::include_proto!("gdid");
//!     pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("gdid_descriptor");
//! }
//! ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("gdid_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/gdid.proto");

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/gdid.proto"], &["proto"])
        .unwrap();
}
