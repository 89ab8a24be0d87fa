// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(&["proto/tessera.proto"], &["proto"])?;
    println!("cargo:rerun-if-changed=proto/tessera.proto");
    Ok(())
}
