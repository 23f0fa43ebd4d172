//! Safe SQL builder: identifiers from model declarations only, values as parameters.

mod builder;
pub mod criteria;
pub mod dialect;
pub mod params;

pub use builder::*;
pub use criteria::*;
pub use dialect::Dialect;
pub use params::*;
