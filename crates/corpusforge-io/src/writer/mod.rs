//! Writers: framed archive and remote bulk-index.

pub mod archive_writer;
pub mod bulk_index;

pub use archive_writer::ArchiveWriter;
pub use bulk_index::{BulkClient, BulkIndexWriter};
