//! # chartcalc - indicator pipeline for OHLC chart data
//!
//! Composable technical-indicator pipeline, pattern signals and a
//! discontinuous time index for annotating OHLC charts.
//!
//! ## Quick Start
//!
//! ```rust
//! use chartcalc::prelude::*;
//! use chrono::{Days, NaiveDate};
//!
//! // Parsed OHLC data (parsing/fetching happens upstream)
//! let start = NaiveDate::from_ymd_opt(2017, 1, 2).unwrap();
//! let days: Vec<OhlcRecord> = (0..60)
//!     .map(|d| {
//!         let px = 100.0 + d as f64 * 0.5;
//!         OhlcRecord::new(start + Days::new(d), px, px + 1.0, px - 1.0, px + 0.4, 1_000.0)
//!     })
//!     .collect();
//!
//! const EMA_12: FieldName = FieldName("ema12");
//! const EMA_26: FieldName = FieldName("ema26");
//! const LONG_SHORT: FieldName = FieldName("long_short");
//!
//! // Stages run in the given order; field dependencies are checked up front
//! let pipeline = PipelineBuilder::new()
//!     .add(BuiltinStage::Ema(EmaIndicator::new(WindowSize::new(12)?, EMA_12)))
//!     .add(BuiltinStage::Ema(EmaIndicator::new(WindowSize::new(26)?, EMA_26)))
//!     .add(BuiltinStage::EmaCross(EmaCrossDetector::new(EMA_12, EMA_26, LONG_SHORT)))
//!     .build()?;
//!
//! let decorated = pipeline.run(days)?;
//! let index = TimeIndex::build(decorated)?;
//!
//! // Extents over the visible tail of the chart
//! let visible = index.window(index.len() - 20, index.len())?;
//! let (low, high) = price_extent(visible)?;
//! assert!(low < high);
//! # Ok::<(), chartcalc::PipelineError>(())
//! ```

pub mod detectors;
pub mod extent;
pub mod indicators;
pub mod scale;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::{EmaCrossDetector, WindowedDetector},
        // Extents
        extent::{price_extent, volume_extent},
        // Indicators
        indicators::{ElderRayIndicator, EmaIndicator},
        // Parallel
        run_parallel,
        // Time index
        scale::{IndexEntry, TimeIndex},
        // Engine
        BuiltinStage,
        FieldName,
        FieldValue,
        OhlcRecord,
        Pipeline,
        PipelineBuilder,
        // Errors
        PipelineError,
        Result,
        RunFailure,
        RunOutput,
        Signal,
        Source,
        // Core trait
        Stage,
        WindowSize,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur during pipeline construction, execution or
/// index/extent queries
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Stage `{stage}` writes field `{field}` already reserved by an earlier stage")]
    DuplicateField {
        stage: &'static str,
        field: FieldName,
    },

    #[error("Stage `{stage}` reads field `{field}` that no earlier stage writes")]
    MissingDependency {
        stage: &'static str,
        field: FieldName,
    },

    #[error("Invalid OHLC at index {index}: {reason}")]
    InvalidOhlc { index: usize, reason: &'static str },

    #[error("Dates not strictly increasing at record {index}")]
    UnorderedData { index: usize },

    #[error("{what} = {value} out of range [0, {max})")]
    OutOfRange {
        what: &'static str,
        value: usize,
        max: usize,
    },

    #[error("Date {date} precedes the first indexed record")]
    DateBeforeRange { date: chrono::NaiveDate },

    #[error("Empty window")]
    EmptyWindow,
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Window size in records (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowSize(usize);

impl WindowSize {
    /// Create a new WindowSize, validating the value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PipelineError::InvalidValue("WindowSize must be > 0"));
        }
        Ok(Self(value))
    }

    /// Create a WindowSize from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for WindowSize {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for WindowSize {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        WindowSize::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// FIELDS & SIGNALS
// ============================================================

/// Typed key for a derived field written by a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldName(pub &'static str);

impl FieldName {
    /// Returns the string identifier
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl serde::Serialize for FieldName {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

/// Trading signal emitted by a windowed pattern detector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Signal {
    #[default]
    None,
    Long,
    Short,
}

impl Signal {
    #[inline]
    pub fn is_long(self) -> bool {
        matches!(self, Signal::Long)
    }

    #[inline]
    pub fn is_short(self) -> bool {
        matches!(self, Signal::Short)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        matches!(self, Signal::None)
    }
}

/// Value stored in a record's derived-field map
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub enum FieldValue {
    Num(f64),
    Signal(Signal),
}

impl FieldValue {
    #[inline]
    pub fn as_num(self) -> Option<f64> {
        match self {
            FieldValue::Num(v) => Some(v),
            FieldValue::Signal(_) => None,
        }
    }

    #[inline]
    pub fn as_signal(self) -> Option<Signal> {
        match self {
            FieldValue::Signal(s) => Some(s),
            FieldValue::Num(_) => None,
        }
    }
}

/// Price accessor used by indicators to extract a value from a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Source {
    Open,
    High,
    Low,
    #[default]
    Close,
    /// Median price: `(high + low) / 2`
    Hl2,
    /// Average price: `(open + high + low + close) / 4`
    Ohlc4,
}

impl Source {
    #[inline]
    pub fn extract(self, record: &OhlcRecord) -> f64 {
        match self {
            Source::Open => record.open,
            Source::High => record.high,
            Source::Low => record.low,
            Source::Close => record.close,
            Source::Hl2 => (record.high + record.low) / 2.0,
            Source::Ohlc4 => (record.open + record.high + record.low + record.close) / 4.0,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Source::Open => "Open",
            Source::High => "High",
            Source::Low => "Low",
            Source::Close => "Close",
            Source::Hl2 => "HL2",
            Source::Ohlc4 => "OHLC4",
        };
        f.write_str(name)
    }
}

// ============================================================
// OHLC RECORD
// ============================================================

use std::collections::HashMap;

use chrono::NaiveDate;

/// One trading period: calendar date, four prices, volume, plus the
/// derived fields written by pipeline stages.
///
/// The base fields are immutable once parsed; `derived` is append-only
/// and populated exactly once per field during a pipeline run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OhlcRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(skip)]
    derived: HashMap<FieldName, FieldValue>,
}

impl OhlcRecord {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            derived: HashMap::new(),
        }
    }

    /// Raw derived-field lookup
    #[inline]
    pub fn derived(&self, field: FieldName) -> Option<FieldValue> {
        self.derived.get(&field).copied()
    }

    /// Numeric derived field, `None` if absent or not numeric.
    /// Absence is distinct from a computed zero.
    #[inline]
    pub fn num(&self, field: FieldName) -> Option<f64> {
        self.derived(field).and_then(FieldValue::as_num)
    }

    /// Signal derived field; missing fields read as [`Signal::None`]
    #[inline]
    pub fn signal(&self, field: FieldName) -> Signal {
        self.derived(field)
            .and_then(FieldValue::as_signal)
            .unwrap_or(Signal::None)
    }

    /// Store a numeric derived value. Field ownership across stages is
    /// validated at pipeline construction.
    #[inline]
    pub fn set_num(&mut self, field: FieldName, value: f64) {
        self.derived.insert(field, FieldValue::Num(value));
    }

    /// Store a signal derived value
    #[inline]
    pub fn set_signal(&mut self, field: FieldName, signal: Signal) {
        self.derived.insert(field, FieldValue::Signal(signal));
    }

    /// Validate OHLC consistency
    pub fn validate(&self) -> Result<()> {
        if self.high < self.low {
            return Err(PipelineError::InvalidOhlc {
                index: 0,
                reason: "high < low",
            });
        }
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(PipelineError::InvalidOhlc {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(PipelineError::InvalidOhlc {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        Ok(())
    }
}

// ============================================================
// STAGE TRAIT
// ============================================================

/// A pipeline stage: an indicator or pattern detector applied over the
/// whole series.
///
/// Stages are pure functions of their input and configuration. They
/// declare the derived fields they read and write so the pipeline can
/// validate ordering and field ownership before any data is processed.
pub trait Stage: Send + Sync {
    /// Short stage kind name used in error messages
    fn name(&self) -> &'static str;

    /// Derived fields this stage reads (must be written by earlier stages)
    fn reads(&self) -> Vec<FieldName> {
        Vec::new()
    }

    /// Derived fields this stage writes (must not collide with other stages)
    fn writes(&self) -> Vec<FieldName>;

    /// Decorate the series in ascending record order
    fn apply(&self, series: &mut [OhlcRecord]) -> Result<()>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN STAGES - generated via macro
// ============================================================

use detectors::EmaCrossDetector;
use indicators::{ElderRayIndicator, EmaIndicator};

/// Macro to generate the BuiltinStage enum without boilerplate
macro_rules! define_builtin_stages {
    (
        $(
            $variant:ident($stage:ty)
        ),* $(,)?
    ) => {
        /// All builtin stages - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinStage {
            $($variant($stage)),*
        }

        impl BuiltinStage {
            #[inline]
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(s) => Stage::name(s)),*
                }
            }

            #[inline]
            pub fn reads(&self) -> Vec<FieldName> {
                match self {
                    $(Self::$variant(s) => Stage::reads(s)),*
                }
            }

            #[inline]
            pub fn writes(&self) -> Vec<FieldName> {
                match self {
                    $(Self::$variant(s) => Stage::writes(s)),*
                }
            }

            #[inline]
            pub fn apply(&self, series: &mut [OhlcRecord]) -> Result<()> {
                match self {
                    $(Self::$variant(s) => Stage::apply(s, series)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(s) => Stage::validate_config(s)),*
                }
            }
        }
    };
}

define_builtin_stages! {
    Ema(EmaIndicator),
    ElderRay(ElderRayIndicator),
    EmaCross(EmaCrossDetector),
}

// ============================================================
// PIPELINE
// ============================================================

/// Pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub validate_data: bool,
}

enum StageSlot {
    Builtin(BuiltinStage),
    Custom(Box<dyn Stage>),
}

impl StageSlot {
    fn name(&self) -> &'static str {
        match self {
            StageSlot::Builtin(s) => s.name(),
            StageSlot::Custom(s) => s.name(),
        }
    }

    fn reads(&self) -> Vec<FieldName> {
        match self {
            StageSlot::Builtin(s) => s.reads(),
            StageSlot::Custom(s) => s.reads(),
        }
    }

    fn writes(&self) -> Vec<FieldName> {
        match self {
            StageSlot::Builtin(s) => s.writes(),
            StageSlot::Custom(s) => s.writes(),
        }
    }

    fn apply(&self, series: &mut [OhlcRecord]) -> Result<()> {
        match self {
            StageSlot::Builtin(s) => s.apply(series),
            StageSlot::Custom(s) => s.apply(series),
        }
    }

    fn validate_config(&self) -> Result<()> {
        match self {
            StageSlot::Builtin(s) => s.validate_config(),
            StageSlot::Custom(s) => s.validate_config(),
        }
    }
}

/// Ordered indicator/detector pipeline.
///
/// Stages run strictly in the order they were added; each stage sees the
/// output of the previous one. The pipeline holds no state across `run`
/// calls, so identical input and stage configuration produce identical
/// output.
pub struct Pipeline {
    stages: Vec<StageSlot>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Decorate a series with every configured stage.
    ///
    /// Consumes the input and either returns the fully decorated sequence
    /// or fails without exposing partial output. The returned sequence is
    /// safe to share read-only with any number of consumers.
    pub fn run(&self, mut series: Vec<OhlcRecord>) -> Result<Vec<OhlcRecord>> {
        if self.config.validate_data {
            validate_records(&series)?;
        }

        for stage in &self.stages {
            stage.apply(&mut series)?;
        }

        Ok(series)
    }

    /// Re-run the pipeline after new trailing records arrive.
    ///
    /// Recomputes the full series rather than patching the tail; output is
    /// identical to `run` over the concatenated raw input because every
    /// stage overwrites its own fields deterministically.
    pub fn run_appended(
        &self,
        mut series: Vec<OhlcRecord>,
        tail: impl IntoIterator<Item = OhlcRecord>,
    ) -> Result<Vec<OhlcRecord>> {
        series.extend(tail);
        self.run(series)
    }

    /// Derived fields produced by the configured stages, in stage order
    pub fn output_fields(&self) -> Vec<FieldName> {
        self.stages.iter().flat_map(StageSlot::writes).collect()
    }
}

fn validate_records(series: &[OhlcRecord]) -> Result<()> {
    for (i, record) in series.iter().enumerate() {
        record.validate().map_err(|e| match e {
            PipelineError::InvalidOhlc { reason, .. } => {
                PipelineError::InvalidOhlc { index: i, reason }
            }
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`Pipeline`] instances.
///
/// `build()` validates each stage's configuration and statically checks
/// the declared read/write field sets: a read of a field no earlier stage
/// writes is a [`PipelineError::MissingDependency`], and two stages
/// writing the same field is a [`PipelineError::DuplicateField`]. Both
/// are rejected before any data is processed.
pub struct PipelineBuilder {
    stages: Vec<StageSlot>,
    config: PipelineConfig,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            config: PipelineConfig::default(),
        }
    }

    /// Append a builtin stage (enum dispatch fast path)
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, stage: BuiltinStage) -> Self {
        self.stages.push(StageSlot::Builtin(stage));
        self
    }

    /// Append a custom stage (vtable slow path)
    pub fn add_custom<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(StageSlot::Custom(Box::new(stage)));
        self
    }

    /// Enable/disable OHLC consistency validation before each run
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let mut written: std::collections::HashSet<FieldName> = std::collections::HashSet::new();

        for stage in &self.stages {
            stage.validate_config()?;

            for field in stage.reads() {
                if !written.contains(&field) {
                    return Err(PipelineError::MissingDependency {
                        stage: stage.name(),
                        field,
                    });
                }
            }
            for field in stage.writes() {
                if !written.insert(field) {
                    return Err(PipelineError::DuplicateField {
                        stage: stage.name(),
                        field,
                    });
                }
            }
        }

        Ok(Pipeline {
            stages: self.stages,
            config: self.config,
        })
    }
}

// ============================================================
// PARALLEL RUNS
// ============================================================

use rayon::prelude::*;

/// Decorated output for a single instrument
#[derive(Debug)]
pub struct RunOutput {
    pub symbol: String,
    pub series: Vec<OhlcRecord>,
}

/// Failure for a single instrument
#[derive(Debug)]
pub struct RunFailure {
    pub symbol: String,
    pub error: PipelineError,
}

/// Run one pipeline over multiple instruments in parallel.
///
/// Instruments are independent: each run owns its series and no state is
/// shared, so this is safe without locking.
pub fn run_parallel<'a, I>(pipeline: &Pipeline, instruments: I) -> (Vec<RunOutput>, Vec<RunFailure>)
where
    I: IntoParallelIterator<Item = (&'a str, Vec<OhlcRecord>)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, series)| {
            pipeline
                .run(series)
                .map(|series| RunOutput {
                    symbol: symbol.to_string(),
                    series,
                })
                .map_err(|error| RunFailure {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => failures.push(e),
        }
    }

    (successes, failures)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    const EMA_2: FieldName = FieldName("ema2");
    const EMA_4: FieldName = FieldName("ema4");
    const SIG: FieldName = FieldName("sig");

    fn date(d: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 1, 2).unwrap() + Days::new(d)
    }

    fn record(d: u64, close: f64) -> OhlcRecord {
        OhlcRecord::new(date(d), close, close + 1.0, close - 1.0, close, 1000.0)
    }

    fn series(closes: &[f64]) -> Vec<OhlcRecord> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| record(i as u64, c))
            .collect()
    }

    #[test]
    fn test_window_size_validation() {
        assert!(WindowSize::new(1).is_ok());
        assert!(WindowSize::new(100).is_ok());
        assert!(WindowSize::new(0).is_err());
    }

    #[test]
    fn test_signal_default_is_none() {
        assert_eq!(Signal::default(), Signal::None);
        assert!(Signal::Long.is_long());
        assert!(Signal::Short.is_short());
        assert!(!Signal::Long.is_none());
    }

    #[test]
    fn test_derived_absence_vs_zero() {
        let mut r = record(0, 100.0);
        assert_eq!(r.num(EMA_2), None);
        r.set_num(EMA_2, 0.0);
        assert_eq!(r.num(EMA_2), Some(0.0));
    }

    #[test]
    fn test_signal_accessor_defaults_to_none() {
        let mut r = record(0, 100.0);
        assert_eq!(r.signal(SIG), Signal::None);
        r.set_signal(SIG, Signal::Long);
        assert_eq!(r.signal(SIG), Signal::Long);
        // Numeric field read as signal stays None
        r.set_num(EMA_2, 1.0);
        assert_eq!(r.signal(EMA_2), Signal::None);
    }

    #[test]
    fn test_source_extract() {
        let r = OhlcRecord::new(date(0), 10.0, 20.0, 5.0, 15.0, 1000.0);
        assert_eq!(Source::Open.extract(&r), 10.0);
        assert_eq!(Source::Close.extract(&r), 15.0);
        assert_eq!(Source::Hl2.extract(&r), 12.5);
        assert_eq!(Source::Ohlc4.extract(&r), 12.5);
    }

    #[test]
    fn test_record_validate() {
        assert!(record(0, 100.0).validate().is_ok());

        let inverted = OhlcRecord::new(date(0), 10.0, 5.0, 20.0, 15.0, 0.0);
        assert!(inverted.validate().is_err());

        let nan = OhlcRecord::new(date(0), f64::NAN, 20.0, 5.0, 15.0, 0.0);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_builder_rejects_duplicate_field() {
        let result = PipelineBuilder::new()
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(2),
                EMA_2,
            )))
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(4),
                EMA_2,
            )))
            .build();

        assert!(matches!(
            result,
            Err(PipelineError::DuplicateField { field: EMA_2, .. })
        ));
    }

    #[test]
    fn test_builder_rejects_missing_dependency() {
        // Crossover scheduled before the EMAs it reads
        let result = PipelineBuilder::new()
            .add(BuiltinStage::EmaCross(EmaCrossDetector::new(
                EMA_2, EMA_4, SIG,
            )))
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(2),
                EMA_2,
            )))
            .build();

        assert!(matches!(
            result,
            Err(PipelineError::MissingDependency { field: EMA_2, .. })
        ));
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let pipeline = PipelineBuilder::new().build().unwrap();
        let input = series(&[100.0, 101.0, 102.0]);
        let output = pipeline.run(input.clone()).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_run_decorates_in_order() {
        let pipeline = PipelineBuilder::new()
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(2),
                EMA_2,
            )))
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(4),
                EMA_4,
            )))
            .add(BuiltinStage::EmaCross(EmaCrossDetector::new(
                EMA_2, EMA_4, SIG,
            )))
            .build()
            .unwrap();

        let output = pipeline
            .run(series(&[100.0, 101.0, 102.0, 103.0, 104.0]))
            .unwrap();

        assert_eq!(output.len(), 5);
        assert!(output[4].num(EMA_2).is_some());
        assert!(output[4].num(EMA_4).is_some());
        // Signal field written on every record once the detector ran
        assert_eq!(output[0].signal(SIG), Signal::None);
    }

    #[test]
    fn test_run_is_deterministic() {
        let pipeline = PipelineBuilder::new()
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(3),
                EMA_2,
            )))
            .build()
            .unwrap();

        let input = series(&[100.0, 102.0, 101.0, 105.0, 103.0, 108.0]);
        let a = pipeline.run(input.clone()).unwrap();
        let b = pipeline.run(input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_data_reports_index() {
        let pipeline = PipelineBuilder::new().validate_data(true).build().unwrap();

        let mut input = series(&[100.0, 101.0]);
        input.push(OhlcRecord::new(date(2), 10.0, 5.0, 20.0, 15.0, 0.0));

        match pipeline.run(input) {
            Err(PipelineError::InvalidOhlc { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected InvalidOhlc, got {other:?}"),
        }
    }

    #[test]
    fn test_run_appended_matches_full_recompute() {
        let pipeline = PipelineBuilder::new()
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(3),
                EMA_2,
            )))
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(4),
                EMA_4,
            )))
            .add(BuiltinStage::EmaCross(EmaCrossDetector::new(
                EMA_2, EMA_4, SIG,
            )))
            .build()
            .unwrap();

        let closes = [100.0, 101.0, 99.0, 103.0, 104.0, 102.0, 107.0, 105.0];
        let full_series = series(&closes);
        let (head, tail) = full_series.split_at(5);

        let decorated_head = pipeline.run(head.to_vec()).unwrap();
        let appended = pipeline
            .run_appended(decorated_head, tail.to_vec())
            .unwrap();

        let full = pipeline.run(full_series).unwrap();
        assert_eq!(appended, full);
    }

    #[test]
    fn test_custom_stage() {
        struct MarkAll;

        impl Stage for MarkAll {
            fn name(&self) -> &'static str {
                "mark_all"
            }

            fn writes(&self) -> Vec<FieldName> {
                vec![SIG]
            }

            fn apply(&self, series: &mut [OhlcRecord]) -> Result<()> {
                for record in series {
                    record.set_signal(SIG, Signal::Long);
                }
                Ok(())
            }
        }

        let pipeline = PipelineBuilder::new().add_custom(MarkAll).build().unwrap();
        let output = pipeline.run(series(&[100.0, 101.0])).unwrap();
        assert!(output.iter().all(|r| r.signal(SIG).is_long()));
    }

    #[test]
    fn test_output_fields_in_stage_order() {
        let pipeline = PipelineBuilder::new()
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(2),
                EMA_2,
            )))
            .add(BuiltinStage::EmaCross(EmaCrossDetector::new(
                EMA_2, EMA_2, SIG,
            )))
            .build()
            .unwrap();

        assert_eq!(pipeline.output_fields(), vec![EMA_2, SIG]);
    }

    #[test]
    fn test_run_parallel() {
        let pipeline = PipelineBuilder::new()
            .add(BuiltinStage::Ema(EmaIndicator::new(
                WindowSize::new_const(2),
                EMA_2,
            )))
            .build()
            .unwrap();

        let instruments = vec![
            ("MSFT", series(&[100.0, 101.0, 102.0])),
            ("AAPL", series(&[50.0, 51.0, 52.0])),
        ];

        let (outputs, failures) = run_parallel(&pipeline, instruments);
        assert_eq!(outputs.len(), 2);
        assert!(failures.is_empty());
        assert!(outputs.iter().all(|o| o.series[2].num(EMA_2).is_some()));
    }

    #[test]
    fn test_record_serde_skips_derived() {
        let mut r = record(0, 100.0);
        r.set_num(EMA_2, 42.0);

        let json = serde_json::to_string(&r).unwrap();
        let back: OhlcRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(back.date, r.date);
        assert_eq!(back.close, r.close);
        assert_eq!(back.num(EMA_2), None);
    }
}
