fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Source a protoc binary from the vendored crate when one is not already
    // available on the system (no system protoc / no network for apt here).
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
            std::env::set_var("PROTOC", protoc);
        }
    }
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &["src/network/messages/chord.proto"],
            &["src/network/messages/"],
        )?;
    Ok(())
}
