/**
Computes peak clusters from an ST pipeline BED file, grouping reads by strand-aware start site.

./count_clusters reads.bed --min-data-value 30 --output tag_clusters.bed
./count_clusters reads.bed.gz --disable-filter --paraclu-bin ~/bin/paraclu
 **/
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use st_analysis::clusters::{
    ClusterParams, ClusterPipeline, DEFAULT_MAX_CLUSTER_SIZE, DEFAULT_MIN_DATA_VALUE,
    DEFAULT_MIN_DENSITY_INCREASE, DEFAULT_OUTPUT,
};
use st_analysis::process::{Toolchain, PARACLU, PARACLU_CUT, SORT};

/// Call tag clusters on ST BED data with paraclu and optionally filter them with paraclu-cut
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// BED ST-data file (chromosome start end read score strand gene barcode ...)
    bed_file: PathBuf,

    /// Omits grouped entries whose total count is lower than this
    #[arg(long, default_value_t = DEFAULT_MIN_DATA_VALUE)]
    min_data_value: u64,

    /// Disable second filter (paraclu-cut)
    #[arg(long)]
    disable_filter: bool,

    /// Discard clusters whose size in positions is bigger than this
    #[arg(long, default_value_t = DEFAULT_MAX_CLUSTER_SIZE)]
    max_cluster_size: u64,

    /// Discard clusters whose density is lower than this
    #[arg(long, default_value_t = DEFAULT_MIN_DENSITY_INCREASE)]
    min_density_increase: f64,

    /// The name and path of the output file
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// sort executable
    #[arg(long, default_value = SORT)]
    sort_bin: PathBuf,

    /// paraclu executable
    #[arg(long, default_value = PARACLU)]
    paraclu_bin: PathBuf,

    /// paraclu-cut executable
    #[arg(long, default_value = PARACLU_CUT)]
    paraclu_cut_bin: PathBuf,

    /// Kill any external tool running longer than this many seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Directory for intermediate files (defaults to the system temp dir)
    #[arg(long)]
    tmp_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    st_analysis::init_logging();
    let args = Args::parse();

    let pipeline = ClusterPipeline {
        input: args.bed_file.clone(),
        output: args.output,
        params: ClusterParams {
            min_data_value: args.min_data_value,
            max_cluster_size: args.max_cluster_size,
            min_density_increase: args.min_density_increase,
            disable_filter: args.disable_filter,
        },
        tools: Toolchain {
            sort: args.sort_bin,
            paraclu: args.paraclu_bin,
            paraclu_cut: args.paraclu_cut_bin,
            timeout: args.timeout.map(Duration::from_secs),
        },
        tmp_dir: args.tmp_dir,
    };

    let report = pipeline
        .run()
        .with_context(|| format!("Failed to compute clusters for {:?}", args.bed_file))?;

    log::info!(
        "DONE! {} sites from {} records, output written to {:?}",
        report.sites,
        report.records,
        report.output
    );
    Ok(())
}
