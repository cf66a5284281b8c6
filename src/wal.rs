use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::Event;

/// Bytes of framing around each payload: the length prefix and the CRC.
const FRAME_OVERHEAD: usize = 8;

/// Upper bound on a single payload. A larger length prefix can only come from
/// a torn or corrupted write.
const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

fn write_record(writer: &mut impl Write, event: &Event) -> io::Result<usize> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(payload.len() + FRAME_OVERHEAD)
}

/// Why reading stopped before end of file.
#[derive(Debug, PartialEq, Eq)]
enum TailDamage {
    Truncated,
    BadChecksum,
    Undecodable,
    Oversized(usize),
}

/// `Ok(None)` at a clean end of file.
fn read_record(reader: &mut impl Read) -> io::Result<Result<Option<Event>, TailDamage>> {
    let mut len_buf = [0u8; 4];
    match read_full(reader, &mut len_buf)? {
        0 => return Ok(Ok(None)),
        4 => {}
        _ => return Ok(Err(TailDamage::Truncated)),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_RECORD_LEN {
        return Ok(Err(TailDamage::Oversized(len)));
    }

    let mut payload = vec![0u8; len];
    let mut crc_buf = [0u8; 4];
    if read_full(reader, &mut payload)? != len || read_full(reader, &mut crc_buf)? != 4 {
        return Ok(Err(TailDamage::Truncated));
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(Err(TailDamage::BadChecksum));
    }
    Ok(bincode::deserialize(&payload)
        .map(Some)
        .map_err(|_| TailDamage::Undecodable))
}

/// Like `read_exact`, but reports how many bytes were read before EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Append-only journal of [`Event`] records.
///
/// Each record is `[u32 len][bincode payload][u32 crc32]`, little-endian.
/// Replay stops at the first damaged record; everything before it is kept.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    bytes_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
            bytes_since_compact: 0,
        })
    }

    /// Buffer one record. Nothing is durable until [`Wal::flush_sync`].
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        let written = write_record(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        self.bytes_since_compact += written as u64;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn compact_tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write a snapshot to the side file and fsync it. Does not touch the
    /// live log.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_tmp_path(path))?);
        for event in events {
            write_record(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the snapshot over the live log and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        fs::rename(Self::compact_tmp_path(&self.path), &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        self.bytes_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    pub fn bytes_since_compact(&self) -> u64 {
        self.bytes_since_compact
    }

    /// Every intact record, in append order. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        loop {
            match read_record(&mut reader)? {
                Ok(Some(event)) => events.push(event),
                Ok(None) => break,
                Err(damage) => {
                    warn!(
                        "{}: discarding log tail after {} records ({damage:?})",
                        path.display(),
                        events.len()
                    );
                    break;
                }
            }
        }
        Ok(events)
    }
}
