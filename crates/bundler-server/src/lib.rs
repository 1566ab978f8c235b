//! HTTP surface for the bundler pipeline: router assembly and handler
//! implementations. The binary in `main.rs` wires configuration,
//! providers and the store around this.

pub mod routes;
