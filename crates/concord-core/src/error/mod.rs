//! Model errors - failures while decoding protocol data into domain types

mod model_error;

pub use model_error::ModelError;
