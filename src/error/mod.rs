pub mod app_error;

pub use self::app_error::AppError;
