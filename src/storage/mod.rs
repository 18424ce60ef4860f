pub mod blob;

pub use blob::{BlobStorage, LocalBlobStorage, MemoryBlobStorage};
