pub mod batch;
pub mod category_day;
pub mod retry_queue;

pub use batch::{BatchKey, FinalizedBatch};
pub use category_day::{sanitize_category, CategoryDayBatcher, IngestError, UNKNOWN_CATEGORY};
pub use retry_queue::{ParkOutcome, RetryQueue, RetryStats};
