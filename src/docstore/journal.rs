//! Append-only journal for durable document writes.
//!
//! Every mutation is framed and fsynced before it is applied in memory.
//! On open, the journal is replayed to rebuild the document tree. A torn or
//! corrupt frame ends replay; everything before it is kept.

use crate::error::{Result, WalletError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"WJN\0";

/// Current journal format version.
const JOURNAL_VERSION: u8 = 1;

/// Magic plus version byte.
const HEADER_BYTES: u64 = 5;

/// Upper bound on a single frame.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// A single journal entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub op: JournalOp,
    /// Seconds since Unix epoch when the entry was written.
    pub written_at: u64,
}

/// Mutations recorded in the journal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JournalOp {
    /// Create or replace a document. `fields` is a JSON object;
    /// `stamped` is the server timestamp assigned by this write, if any.
    Put {
        user: String,
        collection: String,
        id: String,
        fields: Vec<u8>,
        stamped: Option<i64>,
    },
    /// Remove a document.
    Delete {
        user: String,
        collection: String,
        id: String,
    },
    /// Remove a user's whole subtree.
    DeleteUser { user: String },
    /// Last server timestamp handed out, written by compaction.
    Clock { last: i64 },
}

/// Journal file manager.
pub struct Journal {
    path: PathBuf,
    next_seq: Mutex<u64>,
    writer: Mutex<BufWriter<File>>,
}

impl Journal {
    /// Create or open a journal, returning it with the entries to replay.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<JournalEntry>)> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let file = File::open(&path)?;
            let mut reader = BufReader::new(file);
            Self::read_header(&mut reader)?;

            let mut entries = Vec::new();
            let mut valid_end = HEADER_BYTES;
            loop {
                match Self::read_entry(&mut reader) {
                    Ok((entry, frame_len)) => {
                        entries.push(entry);
                        valid_end += frame_len;
                    }
                    Err(WalletError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        break
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "journal replay stopped early");
                        break;
                    }
                }
            }

            // Drop the unreadable tail so later appends stay reachable.
            let file = OpenOptions::new().write(true).open(&path)?;
            if file.metadata()?.len() > valid_end {
                tracing::warn!(path = %path.display(), valid_end, "truncating journal tail");
                file.set_len(valid_end)?;
                file.sync_all()?;
            }
            entries
        } else {
            Self::write_fresh(&path)?;
            Vec::new()
        };

        let next_seq = entries.iter().map(|e| e.seq).max().unwrap_or(0) + 1;
        let writer = BufWriter::new(OpenOptions::new().append(true).open(&path)?);

        Ok((
            Self {
                path,
                next_seq: Mutex::new(next_seq),
                writer: Mutex::new(writer),
            },
            entries,
        ))
    }

    /// Append an operation (returns sequence number).
    pub fn append(&self, op: JournalOp) -> Result<u64> {
        let mut next_seq = self.next_seq.lock();
        let seq = *next_seq;

        let entry = JournalEntry {
            seq,
            op,
            written_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };

        let mut writer = self.writer.lock();
        Self::write_entry(&mut *writer, &entry)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        *next_seq += 1;
        Ok(seq)
    }

    /// Replace the journal with a minimal set of operations.
    ///
    /// Writes to a temporary file and renames it over the journal.
    pub fn compact(&self, ops: impl IntoIterator<Item = JournalOp>) -> Result<()> {
        let mut next_seq = self.next_seq.lock();
        let mut writer = self.writer.lock();

        let tmp_path = self.path.with_extension("compact");
        Self::write_fresh(&tmp_path)?;
        let mut seq = 1;
        {
            let mut tmp = BufWriter::new(OpenOptions::new().append(true).open(&tmp_path)?);
            for op in ops {
                let entry = JournalEntry {
                    seq,
                    op,
                    written_at: 0,
                };
                Self::write_entry(&mut tmp, &entry)?;
                seq += 1;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        *writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        *next_seq = seq;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_fresh(path: &Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(JOURNAL_MAGIC)?;
        file.write_all(&[JOURNAL_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn read_header(reader: &mut impl Read) -> Result<()> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != JOURNAL_MAGIC {
            return Err(WalletError::InvalidFormat("Invalid journal magic".into()));
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != JOURNAL_VERSION {
            return Err(WalletError::InvalidFormat(format!(
                "Unsupported journal version: {}",
                version[0]
            )));
        }
        Ok(())
    }

    fn write_entry(writer: &mut impl Write, entry: &JournalEntry) -> Result<()> {
        let encoded = rmp_serde::to_vec(entry)?;

        let len = encoded.len() as u32;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&encoded)?;
        writer.write_all(&crc32fast::hash(&encoded).to_le_bytes())?;

        Ok(())
    }

    /// Read one frame, returning the entry and the frame's size in bytes.
    fn read_entry(reader: &mut impl Read) -> Result<(JournalEntry, u64)> {
        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_FRAME_BYTES {
            return Err(WalletError::Corruption("journal frame too large".into()));
        }

        let mut encoded = vec![0u8; len];
        reader.read_exact(&mut encoded)?;

        let mut checksum_bytes = [0u8; 4];
        reader.read_exact(&mut checksum_bytes)?;
        if u32::from_le_bytes(checksum_bytes) != crc32fast::hash(&encoded) {
            return Err(WalletError::Corruption("journal checksum mismatch".into()));
        }

        let entry = rmp_serde::from_slice(&encoded)?;
        Ok((entry, (len + 8) as u64))
    }
}
