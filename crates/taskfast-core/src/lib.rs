pub mod config;
pub mod error;
pub mod fields;
pub mod normalize;
pub mod types;

pub use config::TaskfastConfig;
pub use error::{Result, TaskfastError};
pub use fields::TaskFields;
pub use types::*;
