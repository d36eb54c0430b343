pub mod fs;
pub mod memory;
pub mod traits;
pub mod webhdfs;
pub mod writer;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use traits::{BlobStore, StorageError};
pub use webhdfs::WebHdfsStore;
pub use writer::{
    encode_records, BatchWriter, PathLayout, RetryPolicy, RetryingWriter, WriteError,
    WriteOutcome,
};
