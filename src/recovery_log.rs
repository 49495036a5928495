// src/recovery_log.rs

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::Bytes;
use hashbrown::HashMap;
use log::info;

use crate::codec::LENGTH_PREFIX_LEN;
use crate::error::{MoldError, Result};

pub struct RecoveryLog {
    file: File,
    index: HashMap<u64, (u64, u32)>, // seq -> (offset, record len incl. prefix)
    last_written: u64,
    next_offset: u64,
}

impl RecoveryLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(path)?;

        let mut index = HashMap::new();
        let mut offset: u64 = 0;
        let mut seq: u64 = 0;

        file.seek(SeekFrom::Start(0))?;
        let mut reader = std::io::BufReader::new(&file);
        loop {
            let mut len_buf = [0u8; LENGTH_PREFIX_LEN];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(MoldError::LogIoError(e)),
            }
            let len = u16::from_be_bytes(len_buf) as u32;
            let mut payload = vec![0u8; len as usize];
            if reader.read_exact(&mut payload).is_err() {
                // Truncated trailing record from a crash mid-write; stop here.
                break;
            }
            seq += 1;
            let record_len = LENGTH_PREFIX_LEN as u32 + len;
            index.insert(seq, (offset, record_len));
            offset += record_len as u64;
        }

        file.seek(SeekFrom::End(0))?;
        info!("recovery log opened at {:?}: last_written={}", path, seq);

        Ok(Self { file, index, last_written: seq, next_offset: offset })
    }

    pub fn last_written(&self) -> u64 {
        self.last_written
    }

    pub fn append(&mut self, encoded: &Bytes) -> Result<u64> {
        self.file.write_all(encoded)?;
        self.file.flush()?;
        self.file.sync_data()?;

        self.last_written += 1;
        let seq = self.last_written;
        self.index.insert(seq, (self.next_offset, encoded.len() as u32));
        self.next_offset += encoded.len() as u64;
        Ok(seq)
    }

    pub fn read(&mut self, seq: u64) -> Result<Bytes> {
        if seq == 0 || seq > self.last_written {
            return Err(MoldError::NotFound { seq, last_written: self.last_written });
        }
        let &(offset, len) = self
            .index
            .get(&seq)
            .ok_or(MoldError::NotFound { seq, last_written: self.last_written })?;
        let mut buf = vec![0u8; len as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(Bytes::from(buf))
    }

    // Truncates at `last_written`; never returns more than `count` entries.
    pub fn read_range(&mut self, seq: u64, count: u16) -> Result<Vec<Bytes>> {
        if seq == 0 || seq > self.last_written {
            return Ok(Vec::new());
        }
        let last = seq.saturating_add(count as u64).min(self.last_written + 1);
        let mut out = Vec::with_capacity((last - seq) as usize);
        for s in seq..last {
            out.push(self.read(s)?);
        }
        Ok(out)
    }
}
