//! Haetae CLI
//!
//! Wires the data, model, backend and evaluation crates into the
//! end-to-end workflow: preprocess raw corpora, split them, train an
//! adapter, score any backend, and serve the local model over HTTP.

pub mod cli;
pub mod commands;
pub mod config;
pub mod server;
