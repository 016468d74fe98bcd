pub mod catalog;
pub mod descriptor;
pub mod evaluator;
pub mod format;
pub mod quotient;

pub use descriptor::{ComputeRule, Gate, MetricDescriptor};
pub use evaluator::{Evaluation, Evaluator};
pub use format::{format_percentage, pretty_time_from_seconds, FormatRule, RenderContext};
pub use quotient::safe_divide;
