#![deny(missing_docs)]
#![doc = "Leaf types for the generic Monte Carlo sampler: errors, seeded RNG, cyclic time points, sign scalars and cross-worker reductions."]

pub mod comm;
pub mod errors;
pub mod rng;
pub mod sign;
pub mod time;

pub use comm::{gather, Communicator, SingleProcess, ThreadComm};
pub use errors::{ErrorInfo, McError};
pub use num_complex::Complex64;
pub use rng::{derive_substream_seed, RngHandle, KNOWN_GENERATORS};
pub use sign::Sign;
pub use time::{TimePoint, MAX_TICK};
