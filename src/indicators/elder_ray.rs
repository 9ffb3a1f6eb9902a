//! Elder Ray oscillator

use crate::{FieldName, OhlcRecord, Result, Stage};

/// Elder Ray stage: bull and bear power relative to a previously
/// computed EMA field.
///
/// ```text
/// bull[i] = high[i] − ema[i]
/// bear[i] = low[i]  − ema[i]
/// ```
///
/// Declares a read dependency on `ema_field`, so scheduling it before
/// the corresponding EMA stage fails pipeline construction. Records
/// where the EMA is still warming up get no value.
#[derive(Debug, Clone)]
pub struct ElderRayIndicator {
    pub ema_field: FieldName,
    pub bull_field: FieldName,
    pub bear_field: FieldName,
}

impl ElderRayIndicator {
    pub fn new(ema_field: FieldName, bull_field: FieldName, bear_field: FieldName) -> Self {
        Self {
            ema_field,
            bull_field,
            bear_field,
        }
    }
}

impl Stage for ElderRayIndicator {
    fn name(&self) -> &'static str {
        "elder_ray"
    }

    fn reads(&self) -> Vec<FieldName> {
        vec![self.ema_field]
    }

    fn writes(&self) -> Vec<FieldName> {
        vec![self.bull_field, self.bear_field]
    }

    fn apply(&self, series: &mut [OhlcRecord]) -> Result<()> {
        for record in series.iter_mut() {
            if let Some(ema) = record.num(self.ema_field) {
                let (high, low) = (record.high, record.low);
                record.set_num(self.bull_field, high - ema);
                record.set_num(self.bear_field, low - ema);
            }
        }
        Ok(())
    }
}
