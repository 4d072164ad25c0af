pub mod metrics;
pub mod reader;

pub use metrics::{DeltaMetrics, OperationType};
pub use reader::{DeltaLogReader, DeltaLogTable};
