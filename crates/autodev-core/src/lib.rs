pub mod artifact;
pub mod audit;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod git;
pub mod io;
pub mod paths;
pub mod security;
pub mod types;

pub use error::{AutodevError, Result};
