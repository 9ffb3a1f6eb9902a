//! Windowed pattern detectors
//!
//! A detector slides a fixed-size window across the decorated series
//! with stride 1 and writes a [`Signal`](crate::Signal) to the last
//! record of each full window. Records before the first full window,
//! and windows whose required input fields are still warming up, get
//! [`Signal::None`](crate::Signal::None). Output depends only on window
//! contents; no state is carried between windows.

mod crossover;

pub use crossover::EmaCrossDetector;

use crate::{FieldName, OhlcRecord, PipelineError, Result, Signal, Stage, WindowSize};

/// Detector driven by a caller-supplied accumulator closure.
///
/// The accumulator sees one full window of decorated records and may
/// return a signal; `None` is stored as [`Signal::None`]. The window
/// must span at least two records, since a single-record "window"
/// cannot witness a transition.
///
/// # Example
///
/// ```rust
/// use chartcalc::prelude::*;
///
/// const SMA_GAP: FieldName = FieldName("sma_gap");
/// let detector = WindowedDetector::new(
///     "close_jump",
///     WindowSize::new(2)?,
///     vec![],
///     SMA_GAP,
///     |window: &[OhlcRecord]| {
///         (window[1].close > window[0].close * 1.05).then_some(Signal::Long)
///     },
/// )?;
/// # let _ = detector;
/// # Ok::<(), chartcalc::PipelineError>(())
/// ```
pub struct WindowedDetector<F> {
    name: &'static str,
    window: WindowSize,
    reads: Vec<FieldName>,
    output: FieldName,
    accumulator: F,
}

impl<F> WindowedDetector<F>
where
    F: Fn(&[OhlcRecord]) -> Option<Signal> + Send + Sync,
{
    pub fn new(
        name: &'static str,
        window: WindowSize,
        reads: Vec<FieldName>,
        output: FieldName,
        accumulator: F,
    ) -> Result<Self> {
        if window.get() < 2 {
            return Err(PipelineError::InvalidValue(
                "detector window must span at least 2 records",
            ));
        }
        Ok(Self {
            name,
            window,
            reads,
            output,
            accumulator,
        })
    }
}

impl<F> Stage for WindowedDetector<F>
where
    F: Fn(&[OhlcRecord]) -> Option<Signal> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn reads(&self) -> Vec<FieldName> {
        self.reads.clone()
    }

    fn writes(&self) -> Vec<FieldName> {
        vec![self.output]
    }

    fn apply(&self, series: &mut [OhlcRecord]) -> Result<()> {
        let window = self.window.get();

        for i in 0..series.len() {
            let signal = if i + 1 >= window {
                let slice = &series[i + 1 - window..=i];
                let ready = self
                    .reads
                    .iter()
                    .all(|f| slice.iter().all(|r| r.derived(*f).is_some()));
                if ready {
                    (self.accumulator)(slice).unwrap_or(Signal::None)
                } else {
                    Signal::None
                }
            } else {
                Signal::None
            };
            series[i].set_signal(self.output, signal);
        }

        Ok(())
    }
}
