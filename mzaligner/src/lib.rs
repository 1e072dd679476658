mod args;
mod driver;
pub mod io;
mod progress;
pub mod queue;
mod tolerance_args;

pub use args::{ArgCenterMeasure, Mode};
pub use driver::{CorrelationReport, MZAligner, MZAlignerError};
pub use io::{read_feature_list, write_json, DocumentError, FeatureListDocument};
pub use progress::ProgressRecord;
pub use queue::{TaskEvent, TaskId, TaskOutcome, TaskQueue};
pub use tolerance_args::{ArgMZTolerance, MZToleranceParseError};
