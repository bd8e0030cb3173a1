//! Tag cluster calling over ST reads.
//!
//! Reads are grouped by chromosome, strand and strand-aware start site, sorted, and handed
//! to `paraclu`. The raw clusters are optionally re-sorted and cut with `paraclu-cut.sh`.
//! Every intermediate lives in a [`NamedTempFile`] and is removed when the run ends, and
//! the destination is only written once the last stage has succeeded.

use std::io::BufWriter;
use std::path::PathBuf;

use tempfile::{Builder, NamedTempFile};

use crate::error::{Error, Result};
use crate::grouping::{count_sites, write_site_counts};
use crate::output::{persist, temp_beside};
use crate::process::{Toolchain, CLUSTER_SORT_KEYS, SITE_SORT_KEYS};

pub const DEFAULT_MIN_DATA_VALUE: u64 = 30;
pub const DEFAULT_MAX_CLUSTER_SIZE: u64 = 200;
pub const DEFAULT_MIN_DENSITY_INCREASE: f64 = 2.0;
pub const DEFAULT_OUTPUT: &str = "filtered_tag_clusters.bed";

const GROUPED_PREFIX: &str = "st_countClusters_grouped_reads";
const SORTED_PREFIX: &str = "st_countClusters_grouped_sorted_reads";
const PARACLU_PREFIX: &str = "st_countClusters_paraclu";
const FILTERED_PREFIX: &str = "st_countClusters_filtered";
const OUTPUT_PREFIX: &str = ".st_countClusters_output";

/// Thresholds handed verbatim to the external tools.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    pub min_data_value: u64,
    pub max_cluster_size: u64,
    pub min_density_increase: f64,
    pub disable_filter: bool,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            min_data_value: DEFAULT_MIN_DATA_VALUE,
            max_cluster_size: DEFAULT_MAX_CLUSTER_SIZE,
            min_density_increase: DEFAULT_MIN_DENSITY_INCREASE,
            disable_filter: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    GroupSites,
    SortSites,
    CallClusters,
    SortClusters,
    CutClusters,
}

/// What a finished run did.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub stages: Vec<Stage>,
    pub records: u64,
    pub excluded: u64,
    pub sites: usize,
    pub output: PathBuf,
}

impl PipelineReport {
    /// Number of times `stage` ran.
    pub fn runs(&self, stage: Stage) -> usize {
        self.stages.iter().filter(|s| **s == stage).count()
    }
}

#[derive(Debug, Clone)]
pub struct ClusterPipeline {
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: ClusterParams,
    pub tools: Toolchain,
    pub tmp_dir: Option<PathBuf>,
}

impl ClusterPipeline {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            params: ClusterParams::default(),
            tools: Toolchain::default(),
            tmp_dir: None,
        }
    }

    pub fn run(&self) -> Result<PipelineReport> {
        if !self.input.is_file() {
            return Err(Error::InvalidInput(format!(
                "input file {} not present or invalid format",
                self.input.display()
            )));
        }
        let mut report = PipelineReport::default();

        log::info!("Grouping entries by chromosome, strand and start site...");
        let counts = count_sites(&self.input)?;
        report.stages.push(Stage::GroupSites);
        report.records = counts.records;
        report.excluded = counts.excluded;
        report.sites = counts.len();
        log::info!(
            "Grouped {} records into {} sites ({} excluded)",
            counts.records,
            counts.len(),
            counts.excluded
        );

        log::info!("Writing grouped entries to a temp file...");
        let grouped = self.temp(GROUPED_PREFIX)?;
        {
            let mut writer = BufWriter::new(grouped.as_file());
            write_site_counts(&counts, &mut writer)
                .map_err(|e| e.with_output_path(grouped.path()))?;
        }
        drop(counts);

        log::info!("Sorting the grouped entries...");
        let sorted = self.temp(SORTED_PREFIX)?;
        self.tools.run(
            self.tools.sort_command(&SITE_SORT_KEYS, grouped.path()),
            sorted.as_file(),
        )?;
        report.stages.push(Stage::SortSites);

        log::info!("Making the peaks calling with paraclu...");
        let raw = if self.params.disable_filter {
            temp_beside(&self.output, OUTPUT_PREFIX)?
        } else {
            self.temp(PARACLU_PREFIX)?
        };
        self.tools.run(
            self.tools
                .paraclu_command(&self.params.min_data_value.to_string(), sorted.path()),
            raw.as_file(),
        )?;
        report.stages.push(Stage::CallClusters);

        let clusters = if self.params.disable_filter {
            log::info!("Cluster filtering disabled, keeping raw paraclu output");
            raw
        } else {
            log::info!("Filtering found clusters with paraclu-cut...");
            let resorted = self.temp(FILTERED_PREFIX)?;
            self.tools.run(
                self.tools.sort_command(&CLUSTER_SORT_KEYS, raw.path()),
                resorted.as_file(),
            )?;
            report.stages.push(Stage::SortClusters);

            let cut = temp_beside(&self.output, OUTPUT_PREFIX)?;
            self.tools.run(
                self.tools.paraclu_cut_command(
                    &self.params.max_cluster_size.to_string(),
                    &self.params.min_density_increase.to_string(),
                    resorted.path(),
                ),
                cut.as_file(),
            )?;
            report.stages.push(Stage::CutClusters);
            cut
        };

        persist(clusters, &self.output)?;
        log::info!("Clusters written to: {}", self.output.display());
        report.output = self.output.clone();
        Ok(report)
    }

    fn temp(&self, prefix: &str) -> Result<NamedTempFile> {
        let mut builder = Builder::new();
        builder.prefix(prefix);
        match &self.tmp_dir {
            Some(dir) => builder.tempfile_in(dir).map_err(|e| Error::io(e, dir)),
            None => builder.tempfile().map_err(Error::from),
        }
    }
}
