//! Shared test doubles for the dg rules engine.

mod clock;
mod rng;

pub use clock::{FixedClock, fixed_now};
pub use rng::{MockRng, SequenceRng};
