//! Configuration loading and the `rampartctl` command line.
#![allow(missing_docs)]

pub mod cli;
pub mod loader;
