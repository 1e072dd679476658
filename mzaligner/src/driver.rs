use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mzfeatures::{
    calculate_quality_parameters, recalculate_derived_attributes, CenterMeasure, FeatureList,
    MobilityTolerance, RTTolerance,
};
use mzfeatures_align::{
    correlate_feature_list_with_progress, CorrelationParams, IsotopePatternMatchParams,
    JoinAligner, JoinAlignerParams, RowCorrelation, SpectralSimilarityParams,
};

use crate::args::{non_negative_float_f32, non_negative_float_f64, ArgCenterMeasure, Mode};
use crate::io::{read_feature_list, write_json, DocumentError, FeatureListDocument};
use crate::progress::ProgressRecord;
use crate::queue::{TaskOutcome, TaskQueue};
use crate::tolerance_args::ArgMZTolerance;

#[derive(Debug, Error)]
pub enum MZAlignerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] figment::Error),
    #[error("Failed to create the thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Task {name} failed: {message}")]
    TaskFailed { name: String, message: String },
    #[error("Task {0} was canceled")]
    Canceled(String),
}

/// The retained row correlations of one feature list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub feature_list: String,
    pub correlations: Vec<RowCorrelation>,
}

/// Correlate or align LC-MS feature lists.
///
/// Read feature list documents, optionally recalculate their descriptors and
/// quality parameters, then either merge them into one aligned feature list
/// or correlate the rows within each of them.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZAligner {
    /// What to do with the feature lists
    #[arg(value_enum)]
    pub mode: Mode,

    /// The feature list documents to read. Paths ending in `.gz` are read as gzip compressed JSON.
    #[arg(required = true)]
    pub input_files: Vec<PathBuf>,

    /// The path to write the output JSON to, or if '-' is passed, write to STDOUT.
    ///
    /// Paths ending in `.gz` are gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzaligner.toml` in the working directory.
    /// Environment variables prefixed with `MZALIGNER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use for reading and preparing feature lists, passing a
    /// value < 1 to use all available threads
    #[arg(short = 't', long = "threads", default_value_t = -1)]
    pub threads: i32,

    /// The maximum number of processing units to run at once
    #[arg(short = 'j', long = "max-running", default_value_t = 1)]
    pub max_running: usize,

    /// How to compute the center m/z of a feature when describing it
    #[arg(short = 'c', long = "center-measure", default_value = "avg")]
    pub center_measure: ArgCenterMeasure,

    /// Recalculate the derived attributes of every feature, even if the document stores them
    #[arg(long = "recalculate")]
    pub recalculate: bool,

    /// Calculate the FWHM, tailing factor and asymmetry factor of every feature
    #[arg(short = 'q', long = "quality")]
    pub quality: bool,

    /// The name of the aligned feature list
    #[arg(short = 'n', long = "list-name", default_value = "Aligned feature list")]
    pub list_name: String,

    /// The m/z tolerance for matching rows, denoted (absolute) or (absolute):(ppm)
    #[arg(
        short = 'm',
        long = "mz-tolerance",
        default_value_t = ArgMZTolerance::default(),
        value_parser = ArgMZTolerance::from_str,
        value_name = "ABS:PPM",
    )]
    pub mz_tolerance: ArgMZTolerance,

    /// The absolute retention time tolerance in minutes for matching rows
    #[arg(
        short = 'r',
        long = "rt-tolerance",
        default_value_t = 0.1,
        value_parser = non_negative_float_f32
    )]
    pub rt_tolerance: f32,

    /// The mobility tolerance for matching rows. Mobility is not compared when absent.
    #[arg(long = "mobility-tolerance", value_parser = non_negative_float_f32)]
    pub mobility_tolerance: Option<f32>,

    /// The weight of the m/z closeness in the alignment score
    #[arg(long = "mz-weight", default_value_t = 3.0, value_parser = non_negative_float_f64)]
    pub mz_weight: f64,

    /// The weight of the retention time closeness in the alignment score
    #[arg(long = "rt-weight", default_value_t = 1.0, value_parser = non_negative_float_f64)]
    pub rt_weight: f64,

    /// The weight of the mobility closeness in the alignment score
    #[arg(long = "mobility-weight", default_value_t = 1.0, value_parser = non_negative_float_f64)]
    pub mobility_weight: f64,

    /// Only align rows whose charge states agree, unknown charges match anything
    #[arg(long = "same-charge")]
    pub same_charge_required: bool,

    /// Only align rows that share an annotation, unannotated rows match anything
    #[arg(long = "same-id")]
    pub same_id_required: bool,

    #[arg(
        skip,
        help = "Require matching isotope patterns when aligning rows"
    )]
    #[serde(default)]
    pub isotope_pattern: Option<IsotopePatternMatchParams>,

    #[arg(
        skip,
        help = "Require similar spectra when aligning rows"
    )]
    #[serde(default)]
    pub spectral_similarity: Option<SpectralSimilarityParams>,

    #[arg(
        skip,
        help = "Specifies the thresholds of the row correlation"
    )]
    #[serde(default)]
    pub correlation: CorrelationParams,
}

impl MZAligner {
    /// Layer `mzaligner.toml` in the working directory, the `--config-file`
    /// and `MZALIGNER_` environment variables over the parsed arguments, each
    /// taking precedence over the previous
    pub fn configure(self) -> Result<Self, MZAlignerError> {
        let mut config =
            Figment::from(Serialized::defaults(&self)).merge(Toml::file("mzaligner.toml"));
        if let Some(path) = self.config_file.as_ref() {
            config = config.merge(Toml::file_exact(path));
        }
        Ok(config.merge(Env::prefixed("MZALIGNER_")).extract()?)
    }

    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZAlignerError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    fn center_measure(&self) -> CenterMeasure {
        self.center_measure.into()
    }

    pub fn alignment_params(&self) -> JoinAlignerParams {
        JoinAlignerParams {
            list_name: self.list_name.clone(),
            mz_tolerance: self.mz_tolerance.into(),
            rt_tolerance: RTTolerance::absolute(self.rt_tolerance),
            mobility_tolerance: self.mobility_tolerance.map(MobilityTolerance::new),
            mz_weight: self.mz_weight,
            rt_weight: self.rt_weight,
            mobility_weight: self.mobility_weight,
            same_charge_required: self.same_charge_required,
            same_id_required: self.same_id_required,
            isotope_pattern: self.isotope_pattern,
            spectral_similarity: self.spectral_similarity,
        }
    }

    fn prepare(&self, list: &mut FeatureList) {
        if self.recalculate {
            let measure = self.center_measure();
            list.features_mut()
                .for_each(|f| recalculate_derived_attributes(f, measure));
        }
        if self.quality {
            let n = calculate_quality_parameters(list);
            debug!("Calculated quality parameters for {n} features of {}", list.name());
        }
    }

    /// Read and prepare every input feature list in parallel
    fn load_feature_lists(
        &self,
        pool: &rayon::ThreadPool,
    ) -> Result<(Vec<FeatureList>, ProgressRecord), MZAlignerError> {
        let measure = self.center_measure();
        let loaded: Vec<(FeatureList, ProgressRecord)> = pool.install(|| {
            self.input_files
                .par_iter()
                .map(|path| -> Result<(FeatureList, ProgressRecord), MZAlignerError> {
                    let mut list = read_feature_list(path, measure)?;
                    self.prepare(&mut list);
                    let record =
                        ProgressRecord::from_read(list.num_rows(), list.features().count());
                    Ok((list, record))
                })
                .collect::<Result<Vec<_>, MZAlignerError>>()
        })?;
        let mut progress = ProgressRecord::default();
        let mut lists = Vec::with_capacity(loaded.len());
        for (list, record) in loaded {
            progress += record;
            lists.push(list);
        }
        Ok((lists, progress))
    }

    fn run_alignment(&self, lists: Vec<FeatureList>) -> Result<ProgressRecord, MZAlignerError> {
        let params = self.alignment_params();
        let mut queue = TaskQueue::new(self.max_running);
        queue.submit("join alignment", move |progress, cancel| {
            let aligner = JoinAligner::new(&lists, params).map_err(|e| e.to_string())?;
            info!("{}", aligner.description());
            aligner.run(progress, cancel).map_err(|e| e.to_string())
        });

        let mut progress = ProgressRecord::default();
        for (_, name, outcome) in queue.join() {
            match outcome {
                TaskOutcome::Finished(aligned) => {
                    progress.rows_written += aligned.num_rows();
                    write_json(
                        &self.output_file,
                        &FeatureListDocument::from_feature_list(&aligned),
                    )?;
                }
                TaskOutcome::Error(message) => {
                    return Err(MZAlignerError::TaskFailed { name, message })
                }
                TaskOutcome::Canceled => return Err(MZAlignerError::Canceled(name)),
            }
        }
        Ok(progress)
    }

    fn run_correlation(&self, lists: Vec<FeatureList>) -> Result<ProgressRecord, MZAlignerError> {
        let mut queue = TaskQueue::new(self.max_running);
        for list in lists {
            let params = self.correlation;
            let name = format!("correlate {}", list.name());
            queue.submit(name, move |progress, cancel| {
                let correlations =
                    correlate_feature_list_with_progress(&list, &params, progress, cancel)
                        .map_err(|e| e.to_string())?;
                Ok(CorrelationReport {
                    feature_list: list.name().to_string(),
                    correlations,
                })
            });
        }

        let mut progress = ProgressRecord::default();
        let mut reports = Vec::new();
        let mut failure = None;
        for (_, name, outcome) in queue.join() {
            match outcome {
                TaskOutcome::Finished(report) => {
                    progress.correlations += report.correlations.len();
                    reports.push(report);
                }
                TaskOutcome::Error(message) => {
                    progress.tasks_failed += 1;
                    failure.get_or_insert(MZAlignerError::TaskFailed { name, message });
                }
                TaskOutcome::Canceled => {
                    progress.tasks_failed += 1;
                    failure.get_or_insert(MZAlignerError::Canceled(name));
                }
            }
        }
        if let Some(err) = failure {
            warn!("{} correlation batches did not finish", progress.tasks_failed);
            return Err(err);
        }
        write_json(&self.output_file, &reports)?;
        Ok(progress)
    }

    pub fn main(&self) -> Result<(), MZAlignerError> {
        info!(
            "mzaligner v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("?")
        );
        match toml::to_string_pretty(self) {
            Ok(config) => debug!("Effective configuration:\n{config}"),
            Err(e) => debug!("Could not render the configuration: {e}"),
        }
        let start = Instant::now();
        let pool = self.create_threadpool()?;
        let (lists, mut progress) = self.load_feature_lists(&pool)?;
        info!(
            "Read {} feature lists with {} rows and {} features",
            progress.lists_read, progress.rows_read, progress.features_read
        );

        progress += match self.mode {
            Mode::Align => self.run_alignment(lists)?,
            Mode::Correlate => self.run_correlation(lists)?,
        };

        let elapsed = Instant::now() - start;
        match self.mode {
            Mode::Align => info!("Aligned Rows: {}", progress.rows_written),
            Mode::Correlate => info!("Correlations: {}", progress.correlations),
        }
        info!("Elapsed Time: {:0.3} seconds", elapsed.as_secs_f64());
        Ok(())
    }
}
