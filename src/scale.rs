//! Discontinuous time index
//!
//! Charts render trading records at equal visual spacing regardless of
//! calendar gaps, so the axis is indexed by ordinal position rather than
//! by date: a Friday and the following Monday sit on adjacent ordinals.
//! The index is the single source of truth for position↔date mapping,
//! shared by extent queries and any downstream renderer.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::{OhlcRecord, PipelineError, Result};

/// One position on the ordinal axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub ordinal: usize,
    pub date: NaiveDate,
}

/// Gap-free ordinal index over a decorated series.
///
/// Built once per computation pass over the shared read-only output of a
/// pipeline run. Ordinals are a bijection with record positions:
/// strictly increasing by 1, no gaps.
#[derive(Debug, Clone)]
pub struct TimeIndex {
    series: Arc<[OhlcRecord]>,
}

impl TimeIndex {
    /// Build the index, validating that dates are strictly increasing.
    ///
    /// Unordered input fails with [`PipelineError::UnorderedData`] naming
    /// the offending record; the index never sorts, since sorting would
    /// hide an upstream data-integrity bug.
    pub fn build(series: impl Into<Arc<[OhlcRecord]>>) -> Result<Self> {
        let series = series.into();

        for i in 1..series.len() {
            if series[i].date <= series[i - 1].date {
                return Err(PipelineError::UnorderedData { index: i });
            }
        }

        Ok(Self { series })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Ordinal of the record at `date`, or of the nearest preceding
    /// record when no record carries that exact date.
    ///
    /// Fails with [`PipelineError::DateBeforeRange`] if `date` precedes
    /// the first record.
    pub fn ordinal_of(&self, date: NaiveDate) -> Result<usize> {
        let after = self.series.partition_point(|r| r.date <= date);
        if after == 0 {
            return Err(PipelineError::DateBeforeRange { date });
        }
        Ok(after - 1)
    }

    /// Date of the record at `ordinal`
    pub fn date_of(&self, ordinal: usize) -> Result<NaiveDate> {
        self.series
            .get(ordinal)
            .map(|r| r.date)
            .ok_or(PipelineError::OutOfRange {
                what: "ordinal",
                value: ordinal,
                max: self.series.len(),
            })
    }

    /// Records in the ordinal range `[from, to)`, e.g. the currently
    /// visible slice of a chart
    pub fn window(&self, from: usize, to: usize) -> Result<&[OhlcRecord]> {
        if to > self.series.len() {
            return Err(PipelineError::OutOfRange {
                what: "window end",
                value: to,
                max: self.series.len(),
            });
        }
        if from >= to {
            return Err(PipelineError::EmptyWindow);
        }
        Ok(&self.series[from..to])
    }

    /// All entries in ordinal order
    pub fn entries(&self) -> impl Iterator<Item = IndexEntry> + '_ {
        self.series.iter().enumerate().map(|(ordinal, r)| IndexEntry {
            ordinal,
            date: r.date,
        })
    }

    /// The underlying decorated series
    #[inline]
    pub fn records(&self) -> &[OhlcRecord] {
        &self.series
    }

    /// Cheap shared handle to the series for further consumers
    #[inline]
    pub fn share(&self) -> Arc<[OhlcRecord]> {
        Arc::clone(&self.series)
    }
}
