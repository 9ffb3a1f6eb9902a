//! EMA crossover detector

use crate::{FieldName, OhlcRecord, Result, Signal, Stage};

/// Moving-average crossover detector over a two-record window.
///
/// Compares a short- and long-period EMA field on consecutive records:
/// [`Signal::Long`] when the short EMA crosses from below to above the
/// long EMA, [`Signal::Short`] on the opposite cross, [`Signal::None`]
/// otherwise. Equal EMAs are not a strict cross and yield no signal.
#[derive(Debug, Clone)]
pub struct EmaCrossDetector {
    pub short_field: FieldName,
    pub long_field: FieldName,
    pub signal_field: FieldName,
}

impl EmaCrossDetector {
    pub fn new(short_field: FieldName, long_field: FieldName, signal_field: FieldName) -> Self {
        Self {
            short_field,
            long_field,
            signal_field,
        }
    }

    fn cross(&self, prev: &OhlcRecord, now: &OhlcRecord) -> Option<Signal> {
        let prev_short = prev.num(self.short_field)?;
        let prev_long = prev.num(self.long_field)?;
        let now_short = now.num(self.short_field)?;
        let now_long = now.num(self.long_field)?;

        if prev_short < prev_long && now_short > now_long {
            return Some(Signal::Long);
        }
        if prev_short > prev_long && now_short < now_long {
            return Some(Signal::Short);
        }
        None
    }
}

impl Stage for EmaCrossDetector {
    fn name(&self) -> &'static str {
        "ema_cross"
    }

    fn reads(&self) -> Vec<FieldName> {
        vec![self.short_field, self.long_field]
    }

    fn writes(&self) -> Vec<FieldName> {
        vec![self.signal_field]
    }

    fn apply(&self, series: &mut [OhlcRecord]) -> Result<()> {
        for i in 0..series.len() {
            let signal = if i >= 1 {
                self.cross(&series[i - 1], &series[i])
                    .unwrap_or(Signal::None)
            } else {
                Signal::None
            };
            series[i].set_signal(self.signal_field, signal);
        }
        Ok(())
    }
}
