pub mod delay;
pub mod position;
pub mod timeline;

pub use delay::*;
pub use position::*;
pub use timeline::*;
