//! Queue ordering and projections.
//!
//! Pipeline: full record set → ordering policy → snapshot (waiting list,
//! current patient, called patients, stats)

mod ordering;
mod projection;

pub use ordering::*;
pub use projection::*;
