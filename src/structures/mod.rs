mod config;
mod geo;
mod schedule;
mod segment;
mod snapshot;
mod station;
mod status;

pub use config::*;
pub use geo::*;
pub use schedule::*;
pub use segment::*;
pub use snapshot::*;
pub use station::*;
pub use status::*;
