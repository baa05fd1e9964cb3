//! Market data aggregate: candles, series, parsing, validation and indicators.

pub mod entities;
pub mod indicator_engine;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use indicator_engine::*;
pub use services::*;
pub use value_objects::*;
