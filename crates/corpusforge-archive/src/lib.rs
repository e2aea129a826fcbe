//! Framed, content-addressed binary archive container.
//!
//! corpusforge batches (raw records, extracted text, chunks, or embeddings,
//! all serialized to bytes by the caller) are stored as a sequence of
//! length-prefixed frames followed by a JSON footer. The footer is written
//! last, and a reader refuses to open a file that does not end in the
//! footer's magic bytes — so a process killed mid-write leaves behind a
//! file that is structurally unreadable rather than silently truncated.
//!
//! Layout:
//!
//! ```text
//! [MAGIC: 8 bytes]
//! [frame 0][frame 1]...[frame N-1]
//! [footer JSON][footer JSON len: u64 LE][FOOTER_MAGIC: 8 bytes]
//! ```
//!
//! Each frame is:
//!
//! ```text
//! [batch_id: u32 LE][record_count: u32 LE]
//! ([record_len: u32 LE][record bytes]) * record_count
//! ```

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAGIC: &[u8; 8] = b"CFARCH01";
const FOOTER_MAGIC: &[u8; 8] = b"CFFOOTR1";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("bad magic bytes: not a corpusforge archive")]
    BadMagic,
    #[error("archive footer missing or corrupt: write was interrupted")]
    MissingFooter,
    #[error("footer json error: {0}")]
    Footer(#[from] serde_json::Error),
}

/// Footer metadata written once, at `close()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Footer {
    metadata: ArchiveMetadata,
    batch_count: u32,
}

/// Write-mode handle. Batches must be appended in ascending id order
/// (enforced by the caller via a monotonic counter); `close()` must be
/// called for the file to become readable.
pub struct ArchiveWriter {
    file: BufWriter<File>,
    next_batch_id: u32,
    metadata: ArchiveMetadata,
    closed: bool,
}

impl ArchiveWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut file = BufWriter::new(file);
        file.write_all(MAGIC)?;
        Ok(Self {
            file,
            next_batch_id: 0,
            metadata: ArchiveMetadata::default(),
            closed: false,
        })
    }

    /// Appends one batch of records and returns its assigned batch id.
    /// A batch with zero records is not written and does not consume an id,
    /// so batch ids stay dense from zero even when the final residual
    /// accumulator in a writer loop happens to be empty.
    pub fn append_batch(&mut self, records: &[Vec<u8>]) -> Result<Option<u32>, ArchiveError> {
        if records.is_empty() {
            return Ok(None);
        }
        let batch_id = self.next_batch_id;
        self.file.write_all(&batch_id.to_le_bytes())?;
        self.file
            .write_all(&(records.len() as u32).to_le_bytes())?;
        for record in records {
            self.file
                .write_all(&(record.len() as u32).to_le_bytes())?;
            self.file.write_all(record)?;
        }
        self.next_batch_id += 1;
        Ok(Some(batch_id))
    }

    /// Sets the footer metadata. May be called at any point before `close`.
    pub fn set_metadata(&mut self, metadata: serde_json::Map<String, serde_json::Value>) {
        self.metadata.fields = metadata;
    }

    /// Writes the footer and flushes. The archive is unreadable until this
    /// returns successfully.
    pub fn close(mut self) -> Result<(), ArchiveError> {
        let footer = Footer {
            metadata: self.metadata.clone(),
            batch_count: self.next_batch_id,
        };
        let footer_bytes = serde_json::to_vec(&footer)?;
        self.file.write_all(&footer_bytes)?;
        self.file
            .write_all(&(footer_bytes.len() as u64).to_le_bytes())?;
        self.file.write_all(FOOTER_MAGIC)?;
        self.file.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("ArchiveWriter dropped without close(); file will be unreadable");
        }
    }
}

/// Read-mode handle. Opening fails unless the footer is present and intact.
pub struct ArchiveReader {
    file: BufReader<File>,
    metadata: ArchiveMetadata,
    batch_offsets: BTreeMap<u32, u64>,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < (MAGIC.len() + 8 + FOOTER_MAGIC.len()) as u64 {
            return Err(ArchiveError::MissingFooter);
        }

        file.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ArchiveError::BadMagic);
        }

        file.seek(SeekFrom::End(-(FOOTER_MAGIC.len() as i64)))?;
        let mut footer_magic = [0u8; 8];
        file.read_exact(&mut footer_magic)?;
        if &footer_magic != FOOTER_MAGIC {
            return Err(ArchiveError::MissingFooter);
        }

        file.seek(SeekFrom::End(-(FOOTER_MAGIC.len() as i64) - 8))?;
        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let footer_len = u64::from_le_bytes(len_bytes);

        let footer_start = len - FOOTER_MAGIC.len() as u64 - 8 - footer_len;
        file.seek(SeekFrom::Start(footer_start))?;
        let mut footer_bytes = vec![0u8; footer_len as usize];
        file.read_exact(&mut footer_bytes)?;
        let footer: Footer = serde_json::from_slice(&footer_bytes)?;

        // Walk the frames from just past the file magic up to the footer,
        // indexing each batch's offset so batches can be read in order.
        let mut batch_offsets = BTreeMap::new();
        let mut pos = MAGIC.len() as u64;
        file.seek(SeekFrom::Start(pos))?;
        let mut reader = BufReader::new(file.try_clone()?);
        while pos < footer_start {
            let mut id_bytes = [0u8; 4];
            reader.read_exact(&mut id_bytes)?;
            let batch_id = u32::from_le_bytes(id_bytes);
            batch_offsets.insert(batch_id, pos);

            let mut count_bytes = [0u8; 4];
            reader.read_exact(&mut count_bytes)?;
            let record_count = u32::from_le_bytes(count_bytes);
            pos += 8;

            for _ in 0..record_count {
                let mut rl_bytes = [0u8; 4];
                reader.read_exact(&mut rl_bytes)?;
                let record_len = u32::from_le_bytes(rl_bytes) as u64;
                reader.seek_relative(record_len as i64)?;
                pos += 4 + record_len;
            }
        }

        if batch_offsets.len() != footer.batch_count as usize {
            return Err(ArchiveError::MissingFooter);
        }

        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            file: BufReader::new(file),
            metadata: footer.metadata,
            batch_offsets,
        })
    }

    pub fn metadata(&self) -> &ArchiveMetadata {
        &self.metadata
    }

    pub fn batch_count(&self) -> usize {
        self.batch_offsets.len()
    }

    /// Reads one batch's records, given its id.
    pub fn read_batch(&mut self, batch_id: u32) -> Result<Vec<Vec<u8>>, ArchiveError> {
        let offset = *self
            .batch_offsets
            .get(&batch_id)
            .ok_or(ArchiveError::MissingFooter)?;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut id_bytes = [0u8; 4];
        self.file.read_exact(&mut id_bytes)?;
        let mut count_bytes = [0u8; 4];
        self.file.read_exact(&mut count_bytes)?;
        let record_count = u32::from_le_bytes(count_bytes);

        let mut records = Vec::with_capacity(record_count as usize);
        for _ in 0..record_count {
            let mut rl_bytes = [0u8; 4];
            self.file.read_exact(&mut rl_bytes)?;
            let record_len = u32::from_le_bytes(rl_bytes) as usize;
            let mut buf = vec![0u8; record_len];
            self.file.read_exact(&mut buf)?;
            records.push(buf);
        }
        Ok(records)
    }

    /// Iterates over all batches in ascending batch-id order.
    pub fn iter_batches(&mut self) -> impl Iterator<Item = Result<Vec<Vec<u8>>, ArchiveError>> + '_ {
        let ids: Vec<u32> = self.batch_offsets.keys().copied().collect();
        ids.into_iter().map(move |id| self.read_batch(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_batch_order_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cfa");

        let mut writer = ArchiveWriter::create(&path).unwrap();
        let b0 = writer
            .append_batch(&[b"hello".to_vec(), b"world".to_vec()])
            .unwrap();
        let b1 = writer.append_batch(&[b"second".to_vec()]).unwrap();
        let mut meta = serde_json::Map::new();
        meta.insert("data_source".into(), serde_json::json!("wikipedia"));
        writer.set_metadata(meta);
        writer.close().unwrap();

        assert_eq!(b0, Some(0));
        assert_eq!(b1, Some(1));

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert_eq!(reader.batch_count(), 2);
        assert_eq!(
            reader.metadata().fields.get("data_source").unwrap(),
            "wikipedia"
        );
        let batches: Vec<_> = reader.iter_batches().collect::<Result<_, _>>().unwrap();
        assert_eq!(batches[0], vec![b"hello".to_vec(), b"world".to_vec()]);
        assert_eq!(batches[1], vec![b"second".to_vec()]);
    }

    #[test]
    fn empty_residual_batch_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cfa");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        writer.append_batch(&[b"only".to_vec()]).unwrap();
        let residual = writer.append_batch(&[]).unwrap();
        assert_eq!(residual, None);
        writer.close().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert_eq!(reader.batch_count(), 1);
    }

    #[test]
    fn file_without_footer_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incomplete.cfa");
        {
            let mut writer = ArchiveWriter::create(&path).unwrap();
            writer.append_batch(&[b"orphan".to_vec()]).unwrap();
            // deliberately dropped without close(): no footer is written
        }
        let result = ArchiveReader::open(&path);
        assert!(result.is_err());
    }
}
