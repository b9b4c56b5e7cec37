/// Builds the gRPC client and server code for the `crud.v1` and `stream.v1`
/// packages using `tonic-prost-build`.
///
/// # Byte Field Optimization
///
/// The `chunk` field in the `UploadFileRequest` message is explicitly marked
/// with `.bytes(...)` so uploads are deserialized as `Bytes` instead of
/// `Vec<u8>`. The server only measures chunks, so avoiding the copy keeps
/// large uploads cheap.
///
/// # Files and Paths
///
/// - Proto files: `proto/crud/v1/crud.proto`, `proto/stream/v1/stream.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/switchyard_descriptor.bin` (served by the
///   reflection service)
///
/// # Output
///
/// Generated code is accessible in Rust via:
///
/// ```rust,ignore
/// pub mod v1 {
///     tonic::include_proto!("crud.v1");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("switchyard_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    config
        .bytes([".stream.v1.UploadFileRequest.chunk"])
        .file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/crud/v1/crud.proto", "proto/stream/v1/stream.proto"],
        &["proto"],
    )?;

    Ok(())
}
