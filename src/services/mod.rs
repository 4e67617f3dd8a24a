pub mod crowd;
pub mod data_store;

pub use crowd::*;
pub use data_store::*;
