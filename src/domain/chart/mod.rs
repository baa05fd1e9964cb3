//! Chart aggregate: viewport transform, history, selection and drawings.

pub mod entities;
pub mod history;
pub mod selection;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use history::*;
pub use selection::*;
pub use value_objects::*;
