pub mod error;
pub mod response;
pub mod token;
pub mod validate;

pub use error::AppError;
