fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the Arrow Flight protocol subset this client consumes.
    tonic_prost_build::configure()
        .build_server(false) // Client only, no server code generation
        .build_transport(false) // Don't generate transport code (avoid naming conflicts)
        .compile_protos(&["proto/flight.proto"], &["proto"])?;

    Ok(())
}
