/**
Converts ST data in JSON format into a table with genes as columns and spots as rows.

./json_to_table --json-file st_data.json --outfile counts.tsv
 **/
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use st_analysis::output::{persist, temp_beside};
use st_analysis::table::{read_spot_hits, CountTable, DEFAULT_OUTPUT};

/// Convert an ST data JSON file into a spot by gene counts table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ST data file in JSON format
    #[arg(long)]
    json_file: PathBuf,

    /// Name of the output file
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    outfile: PathBuf,
}

fn main() -> Result<()> {
    st_analysis::init_logging();
    let args = Args::parse();

    let is_json = args.json_file.extension().map_or(false, |ext| ext == "json");
    if !args.json_file.is_file() || !is_json {
        anyhow::bail!(
            "Input file {:?} not present or invalid format",
            args.json_file
        );
    }

    let reader = BufReader::new(
        File::open(&args.json_file)
            .with_context(|| format!("Failed to read input file: {:?}", args.json_file))?,
    );
    let hits = read_spot_hits(reader).context("Failed to parse JSON")?;
    log::info!("Read {} records", hits.len());

    let table = CountTable::from_hits(hits);
    let tmp = temp_beside(&args.outfile, ".json_to_table")
        .with_context(|| format!("Failed to create {:?}", args.outfile))?;
    table
        .write_tsv(&mut BufWriter::new(tmp.as_file()))
        .map_err(|e| e.with_output_path(&args.outfile))?;
    persist(tmp, &args.outfile)?;

    log::info!(
        "Wrote {} spots x {} genes to: {:?}",
        table.n_spots(),
        table.n_genes(),
        args.outfile
    );
    Ok(())
}
