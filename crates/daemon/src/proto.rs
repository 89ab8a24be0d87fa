// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generated gRPC types and service traits. `build.rs` compiles
//! `proto/tessera.proto` via `tonic-build`; this module just brings the
//! output into scope under one path.

#![allow(clippy::all, clippy::pedantic)]

tonic::include_proto!("tessera");
