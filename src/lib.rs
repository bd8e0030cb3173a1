//! Command-line tools for spatial transcriptomics data produced by the ST pipeline.
//!
//! - [`clusters`]: tag cluster calling with `paraclu` / `paraclu-cut.sh`
//! - [`selection`]: filtering BED records by ST Viewer spot selections
//! - [`table`]: JSON hit records to a spot-by-gene count table

pub mod bed;
pub mod clusters;
pub mod error;
pub mod grouping;
pub mod output;
pub mod process;
pub mod selection;
pub mod table;

pub use error::{Error, Result};

/// Set up `env_logger` on stdout with `info` as the default level; `RUST_LOG` overrides it.
/// Errors still go to stderr through `main`'s returned `anyhow::Error`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .format_timestamp(None)
        .try_init();
}
