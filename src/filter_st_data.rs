/**
Keeps the ST BED records whose spot coordinates are in one or more ST Viewer selections.

./filter_st_data reads.bed --barcodes-files selection1.txt selection2.txt --outfile selected.bed
 **/
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use st_analysis::bed::open_reader;
use st_analysis::output::{persist, temp_beside};
use st_analysis::selection::{default_output, filter_records, load_selection};

/// Filter an ST BED file by the spots selected in the ST Viewer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tab delimited file containing the ST data in BED format
    bed_file: PathBuf,

    /// Name of the output file (defaults to filtered_<bed_file name>)
    #[arg(long)]
    outfile: Option<PathBuf>,

    /// Tab delimited files containing a selection from the ST Viewer
    #[arg(long, num_args = 1.., required = true)]
    barcodes_files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    st_analysis::init_logging();
    let args = Args::parse();

    if !args.bed_file.is_file() {
        anyhow::bail!(
            "Input file {:?} not present or invalid format",
            args.bed_file
        );
    }

    let selection = load_selection(&args.barcodes_files).context("Failed to load selections")?;
    log::info!(
        "Loaded {} selected spots from {} file(s)",
        selection.len(),
        args.barcodes_files.len()
    );

    let outfile = args
        .outfile
        .clone()
        .unwrap_or_else(|| default_output(&args.bed_file));

    let reader = open_reader(&args.bed_file)?;
    let tmp = temp_beside(&outfile, ".filter_st_data")
        .with_context(|| format!("Failed to create {:?}", outfile))?;
    let summary = filter_records(reader, &selection, &mut BufWriter::new(tmp.as_file()))
        .map_err(|e| e.with_path(&args.bed_file).with_output_path(&outfile))
        .with_context(|| format!("Failed to filter {:?}", args.bed_file))?;
    persist(tmp, &outfile)?;

    log::info!(
        "Kept {} of {} records, output written to: {:?}",
        summary.kept,
        summary.total,
        outfile
    );
    Ok(())
}
