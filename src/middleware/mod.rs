pub mod error_detail;
pub mod request_logger;

pub use error_detail::expose_error_detail;
pub use request_logger::{request_logger_middleware, RequestLogSettings};
