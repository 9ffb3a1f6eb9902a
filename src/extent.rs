//! Extent calculator
//!
//! Pure reductions over a visible record window, feeding axis scaling
//! downstream. A zero-length window is an error, never a silent
//! degenerate range.

use crate::{OhlcRecord, PipelineError, Result};

/// Price range `(min low, max high)` across the window
pub fn price_extent(window: &[OhlcRecord]) -> Result<(f64, f64)> {
    if window.is_empty() {
        return Err(PipelineError::EmptyWindow);
    }

    let extent = window.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), r| {
        (min.min(r.low), max.max(r.high))
    });

    Ok(extent)
}

/// Volume range `(min, max)` across the window
pub fn volume_extent(window: &[OhlcRecord]) -> Result<(f64, f64)> {
    if window.is_empty() {
        return Err(PipelineError::EmptyWindow);
    }

    let extent = window.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), r| {
        (min.min(r.volume), max.max(r.volume))
    });

    Ok(extent)
}
