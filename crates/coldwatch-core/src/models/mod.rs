//! Data models for Coldwatch

mod alert;
mod query;
mod reading;

pub use alert::*;
pub use query::*;
pub use reading::*;
