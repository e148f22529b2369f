//! dg Character: patients, ghosts, and the economy between them.
//!
//! A patient is the human a player plays; a ghost is the entity that
//! inhabits a patient and carries a snapshot of the patient it came from.
//! Patients disclose only their soul-color archive (the SWAP file); ghost
//! origin fields stay hidden until the DM unlocks them.

pub mod domain;
