//! Batch driver
//!
//! Runs every standardised parameter row through numerator aggregation,
//! denominator building and standardisation. Rows run concurrently on the
//! tokio blocking pool; a failing or slow row is replaced by a placeholder
//! and never stops the batch.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use log::{error, info, warn};
use tokio::sync::Semaphore;

use crate::algorithm::denominator::{DenominatorRequest, build_denominator};
use crate::algorithm::dimensions::build_catalogue;
use crate::algorithm::numerator::{NumeratorRequest, aggregate_numerator};
use crate::algorithm::standardisation::{Lookups, RowLabels, StandardisationSettings, standardise};
use crate::config::PipelineConfig;
use crate::error::{BatchRowError, IndicatorError, Result};
use crate::lookup::{DeprivationLookup, EthnicityMapping, GeographyCrosswalk};
use crate::models::{EventRecord, ParameterRow, PopulationRecord, RateRecord};
use crate::source::{DataSource, RateSink};
use crate::utils::logging::{create_row_progress_bar, finish_progress_bar, log_row_outcome};

/// Outcome of one parameter row
pub type RowOutcome = (ParameterRow, std::result::Result<Vec<RateRecord>, BatchRowError>);

/// Inputs shared by every parameter row of a run
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub crosswalk: GeographyCrosswalk,
    pub ethnicity: EthnicityMapping,
    pub deprivation: DeprivationLookup,
    pub population: Vec<PopulationRecord>,
    pub events: Vec<EventRecord>,
}

impl ReferenceData {
    /// Load and index every input table except the parameters
    pub fn load(source: &dyn DataSource, config: &PipelineConfig) -> Result<Self> {
        let start = Instant::now();
        info!("Loading reference data from {}", source.describe());

        let crosswalk = GeographyCrosswalk::from_records(
            &config.crosswalk_release,
            &source.crosswalk()?,
            &source.localities()?,
        )?;
        let ethnicity = EthnicityMapping::from_records(&source.ethnicity()?);
        let deprivation = DeprivationLookup::from_scores(&source.imd_scores()?);
        let population = source.population()?;
        let events = source.events()?;

        info!(
            "Loaded {} wards ({}), {} population rows and {} events in {:?}",
            crosswalk.len(),
            crosswalk.release(),
            population.len(),
            events.len(),
            start.elapsed()
        );
        Ok(Self {
            crosswalk,
            ethnicity,
            deprivation,
            population,
            events,
        })
    }

    #[must_use]
    pub fn lookups(&self) -> Lookups<'_> {
        Lookups {
            crosswalk: &self.crosswalk,
            ethnicity: &self.ethnicity,
            deprivation: &self.deprivation,
        }
    }
}

/// Compute every rate for one parameter row
pub fn run_parameter_row(
    row: &ParameterRow,
    data: &ReferenceData,
    settings: &StandardisationSettings,
) -> Result<Vec<RateRecord>> {
    let gender = row.gender()?;
    let request = NumeratorRequest {
        indicator_id: row.indicator_id,
        reference_id: row.reference_id,
        min_age: row.min_age,
        max_age: row.max_age,
    };
    let numerator =
        aggregate_numerator(&data.events, &request, &data.crosswalk, &data.ethnicity)?;

    let age_bands = numerator.age_bands();
    let fiscal_years = numerator.fiscal_years();
    let denominator = build_denominator(
        &data.population,
        &DenominatorRequest {
            age_bands: &age_bands,
            fiscal_years: &fiscal_years,
            min_start: numerator.min_start,
            gender,
            target_las: &settings.target_las,
        },
        &data.crosswalk,
        &data.ethnicity,
        &data.deprivation,
    )?;

    let labels = RowLabels {
        indicator_id: row.indicator_id,
        reference_id: row.reference_id,
        gender,
        age_group: row.age_group.clone(),
    };
    Ok(standardise(
        &numerator,
        &denominator,
        data.lookups(),
        settings,
        &labels,
    ))
}

/// How the batch is scheduled
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_concurrent_rows: usize,
    pub row_timeout: Duration,
    pub show_progress: bool,
}

impl BatchOptions {
    #[must_use]
    pub fn from_config(config: &PipelineConfig, show_progress: bool) -> Self {
        Self {
            max_concurrent_rows: config.max_concurrent_rows.max(1),
            row_timeout: config.row_timeout(),
            show_progress,
        }
    }
}

/// Run rows concurrently; results come back in completion order
pub async fn run_batch(
    rows: Vec<ParameterRow>,
    data: Arc<ReferenceData>,
    settings: Arc<StandardisationSettings>,
    options: &BatchOptions,
) -> Vec<RowOutcome> {
    let work = move |row: &ParameterRow| run_parameter_row(row, &data, &settings);
    run_rows(rows, Arc::new(work), options).await
}

/// Schedule `work` over the rows with bounded concurrency and a per-row timeout
///
/// A row keeps its permit until its blocking task returns, so work that has
/// timed out still counts against `max_concurrent_rows`.
async fn run_rows<F>(rows: Vec<ParameterRow>, work: Arc<F>, options: &BatchOptions) -> Vec<RowOutcome>
where
    F: Fn(&ParameterRow) -> Result<Vec<RateRecord>> + Send + Sync + 'static,
{
    let limit = options.max_concurrent_rows.max(1);
    let permits = Arc::new(Semaphore::new(limit));
    let pb = create_row_progress_bar(rows.len() as u64, options.show_progress);
    let timeout = options.row_timeout;

    let outcomes = stream::iter(rows)
        .map(|row| {
            let work = Arc::clone(&work);
            let permits = Arc::clone(&permits);
            async move {
                let outcome = run_row_with_timeout(&row, work, permits, timeout).await;
                (row, outcome)
            }
        })
        .buffer_unordered(limit)
        .inspect(|_| pb.inc(1))
        .collect::<Vec<_>>()
        .await;

    finish_progress_bar(&pb, "parameter rows done");
    outcomes
}

async fn run_row_with_timeout<F>(
    row: &ParameterRow,
    work: Arc<F>,
    permits: Arc<Semaphore>,
    timeout: Duration,
) -> std::result::Result<Vec<RateRecord>, BatchRowError>
where
    F: Fn(&ParameterRow) -> Result<Vec<RateRecord>> + Send + Sync + 'static,
{
    let (indicator_id, reference_id) = (row.indicator_id, row.reference_id);
    let permit = permits
        .acquire_owned()
        .await
        .map_err(|e| BatchRowError::Aborted {
            indicator_id,
            reference_id,
            message: e.to_string(),
        })?;

    let start = Instant::now();
    let task_row = row.clone();
    // A timed-out task keeps running and holding its permit; its result is discarded
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        work(&task_row)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(rates))) => {
            log_row_outcome(indicator_id, reference_id, rates.len(), start.elapsed());
            Ok(rates)
        }
        Ok(Ok(Err(source))) => Err(BatchRowError::Failed {
            indicator_id,
            reference_id,
            source,
        }),
        Ok(Err(join_error)) => Err(BatchRowError::Aborted {
            indicator_id,
            reference_id,
            message: join_error.to_string(),
        }),
        Err(_) => Err(BatchRowError::TimedOut {
            indicator_id,
            reference_id,
            elapsed: start.elapsed(),
        }),
    }
}

/// Remove and return the first row error that is fatal to the whole run
fn take_fatal(outcomes: &mut Vec<RowOutcome>) -> Option<IndicatorError> {
    let index = outcomes
        .iter()
        .position(|(_, outcome)| outcome.as_ref().is_err_and(BatchRowError::is_fatal))?;
    match outcomes.swap_remove(index) {
        (_, Err(BatchRowError::Failed { source, .. })) => Some(source),
        _ => None,
    }
}

/// Counts describing one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows_total: usize,
    pub rows_succeeded: usize,
    pub rows_failed: usize,
    pub rows_timed_out: usize,
    pub placeholder_rows: usize,
    pub incomplete_dropped: usize,
    pub rates_written: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch Summary:")?;
        writeln!(f, "  Parameter rows: {}", self.rows_total)?;
        writeln!(f, "  Succeeded: {}", self.rows_succeeded)?;
        writeln!(f, "  Failed: {}", self.rows_failed)?;
        writeln!(f, "  Timed out: {}", self.rows_timed_out)?;
        writeln!(f, "  Placeholder rows: {}", self.placeholder_rows)?;
        writeln!(f, "  Incomplete periods dropped: {}", self.incomplete_dropped)?;
        write!(f, "  Rates written: {}", self.rates_written)
    }
}

/// Union row outcomes into the final rate table
///
/// Failed rows and rows without rates become one placeholder each. Rows whose
/// period has not fully elapsed by `as_of` are dropped. The result is sorted
/// so repeated runs write identical tables.
#[must_use]
pub fn collect_rates(outcomes: Vec<RowOutcome>, as_of: NaiveDate) -> (Vec<RateRecord>, BatchSummary) {
    let mut summary = BatchSummary {
        rows_total: outcomes.len(),
        ..Default::default()
    };
    let mut rates = Vec::new();

    for (row, outcome) in outcomes {
        match outcome {
            Ok(row_rates) if !row_rates.is_empty() => {
                summary.rows_succeeded += 1;
                rates.extend(row_rates);
            }
            Ok(_) => {
                warn!(
                    "indicator {} (reference {:?}) produced no rates",
                    row.indicator_id, row.reference_id
                );
                summary.rows_succeeded += 1;
                summary.placeholder_rows += 1;
                rates.push(RateRecord::placeholder(&row));
            }
            Err(e) => {
                error!("{e}");
                if matches!(e, BatchRowError::TimedOut { .. }) {
                    summary.rows_timed_out += 1;
                } else {
                    summary.rows_failed += 1;
                }
                summary.placeholder_rows += 1;
                rates.push(RateRecord::placeholder(&row));
            }
        }
    }

    let before = rates.len();
    rates.retain(|r| r.valid_to.is_none_or(|valid_to| valid_to < as_of));
    summary.incomplete_dropped = before - rates.len();

    rates.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    summary.rates_written = rates.len();
    (rates, summary)
}

type SortKey<'a> = (
    i64,
    Option<i64>,
    Option<&'a str>,
    Option<u8>,
    Option<&'a str>,
    Option<&'a str>,
    &'a str,
    &'a str,
    Option<&'a str>,
    Option<u8>,
);

fn sort_key(r: &RateRecord) -> SortKey<'_> {
    (
        r.indicator_id,
        r.reference_id,
        r.time_period.as_deref(),
        r.window_length,
        r.aggregation_type.as_deref(),
        r.aggregation_label.as_deref(),
        r.gender.as_str(),
        r.age_group.as_str(),
        r.ethnicity.as_deref(),
        r.imd_quintile,
    )
}

/// Load inputs, run every standardised parameter row and replace the rate table
///
/// Per-row failures become placeholder rows. A row that fails on an input or
/// output error aborts the run and leaves the existing rate table in place.
///
/// # Arguments
/// * `source` - Where the input tables are read from
/// * `sink` - Where the rate table is written
/// * `config` - Pipeline settings, validated before anything is read
/// * `show_progress` - Whether to draw a progress bar over the parameter rows
///
/// # Returns
/// * `Result<BatchSummary>` - Row and rate counts of the run
pub async fn run_pipeline(
    source: &dyn DataSource,
    sink: &dyn RateSink,
    config: &PipelineConfig,
    show_progress: bool,
) -> Result<BatchSummary> {
    config.validate()?;
    let settings = Arc::new(config.standardisation_settings()?);
    let data = Arc::new(ReferenceData::load(source, config)?);

    let parameters = source.parameters()?;
    let total_parameters = parameters.len();
    let rows = parameters
        .into_iter()
        .filter(ParameterRow::is_standardised)
        .collect_vec();
    info!(
        "Running {} of {} parameter rows (up to {} at a time)",
        rows.len(),
        total_parameters,
        config.max_concurrent_rows
    );
    if rows.is_empty() {
        warn!("No parameter rows need standardisation");
    }

    let options = BatchOptions::from_config(config, show_progress);
    let mut outcomes = run_batch(rows, data, settings, &options).await;
    if let Some(fatal) = take_fatal(&mut outcomes) {
        error!("Aborting run, rate table left unchanged: {fatal}");
        return Err(fatal);
    }
    let (rates, summary) = collect_rates(outcomes, config.as_of_date());

    sink.replace_rates(&rates)?;
    info!("{summary}");
    Ok(summary)
}

/// Build the demographic catalogue from the parameter age groups and write it
pub fn publish_dimensions(source: &dyn DataSource, sink: &dyn RateSink) -> Result<usize> {
    let age_groups = source
        .parameters()?
        .into_iter()
        .map(|p| p.age_group)
        .sorted()
        .dedup()
        .collect_vec();
    let ethnic_groups = EthnicityMapping::from_records(&source.ethnicity()?).broad_groups();

    let catalogue = build_catalogue(&age_groups, &ethnic_groups);
    sink.replace_dimensions(&catalogue)?;
    info!(
        "Wrote {} dimension entries for {} age groups and {} ethnic groups",
        catalogue.len(),
        age_groups.len(),
        ethnic_groups.len()
    );
    Ok(catalogue.len())
}
