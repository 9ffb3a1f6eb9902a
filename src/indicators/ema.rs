//! Exponential moving average

use crate::{FieldName, OhlcRecord, Result, Source, Stage, WindowSize};

/// Exponential Moving Average stage.
///
/// Uses the standard smoothing factor `α = 2 / (window + 1)`. The first
/// `window` source values are averaged into an SMA seed assigned to the
/// record at index `window - 1`; earlier records get no value, so a
/// missing field is distinguishable from a computed zero. From index
/// `window` onward:
///
/// ```text
/// ema[i] = α × value[i] + (1 − α) × ema[i−1]
/// ```
///
/// With `window == 1` (α = 1) the EMA degenerates to the source value
/// itself.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub window: WindowSize,
    pub field: FieldName,
    pub source: Source,
}

impl EmaIndicator {
    /// EMA over closing prices
    pub fn new(window: WindowSize, field: FieldName) -> Self {
        Self {
            window,
            field,
            source: Source::Close,
        }
    }

    /// EMA over a custom price source
    pub fn with_source(window: WindowSize, field: FieldName, source: Source) -> Self {
        Self {
            window,
            field,
            source,
        }
    }
}

impl Stage for EmaIndicator {
    fn name(&self) -> &'static str {
        "ema"
    }

    fn writes(&self) -> Vec<FieldName> {
        vec![self.field]
    }

    fn apply(&self, series: &mut [OhlcRecord]) -> Result<()> {
        let window = self.window.get();
        if series.len() < window {
            return Ok(());
        }

        #[allow(clippy::cast_precision_loss)]
        let alpha = 2.0 / (window + 1) as f64;

        let seed = series[..window]
            .iter()
            .map(|r| self.source.extract(r))
            .sum::<f64>()
            / window as f64;
        series[window - 1].set_num(self.field, seed);

        let mut prev = seed;
        for record in series[window..].iter_mut() {
            let value = self.source.extract(record);
            let ema = alpha.mul_add(value - prev, prev);
            record.set_num(self.field, ema);
            prev = ema;
        }

        Ok(())
    }
}

impl std::fmt::Display for EmaIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EMA({}, {})", self.window.get(), self.source)
    }
}
