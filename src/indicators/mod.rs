//! Indicator stages
//!
//! Indicators decorate each record with one or more numeric derived
//! fields computed from a window of preceding records. Recurrence state
//! lives on the local scan inside `apply`, never on the stage itself, so
//! two instances of the same indicator with different windows are fully
//! independent.

mod elder_ray;
mod ema;

pub use elder_ray::ElderRayIndicator;
pub use ema::EmaIndicator;
