//! Content adapters - where episodes and campaigns are read from

mod fs_source;

pub use fs_source::{ContentScan, FsContentSource, RejectedFile};
