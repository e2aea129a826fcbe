//! Dump readers: gzip line-pair and bz2 XML.

pub mod archive_record;
pub mod line_pair;
pub mod xml_dump;

pub use archive_record::ArchiveRecordReader;
pub use line_pair::LinePairReader;
pub use xml_dump::XmlDumpReader;
