//! TrustChain CLI library: argument definitions and the REST client that
//! drives a running node.

pub mod cli;

pub use cli::{run, Cli, Commands};
