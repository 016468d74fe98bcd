pub mod period;
pub mod request;

pub use period::Period;
pub use request::{apply_request, ReportApi, ReportRequest};
