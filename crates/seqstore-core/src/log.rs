//! Append-only message log: a body file of raw bytes plus a header file of
//! `seqnum,offset,size` lines, with an in-memory index rebuilt from the
//! header on every open.
//!
//! # Recovery
//!
//! The header scan keeps the longest well-formed prefix. The first line that
//! is not exactly three unsigned decimal fields terminated by `\n` ends the
//! scan, and that line plus everything after it is left out of the index.
//! The header file only shrinks in one case: an unterminated last line
//! directly after the good prefix is a torn append and is cut, so a crash in
//! the middle of an append costs at most the message being written. Any
//! other damage stays on disk untouched.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::file_store::{open_or_create, remove_if_exists};

/// Where a message's bytes live in the body file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLocation {
    pub offset: u64,
    pub size: usize,
}

/// Render one header line, including the trailing newline.
pub fn format_header_line(seq_num: u64, location: MessageLocation) -> String {
    format!("{},{},{}\n", seq_num, location.offset, location.size)
}

/// Parse one header line. The line must still carry its `\n`.
pub fn parse_header_line(line: &str) -> Option<(u64, MessageLocation)> {
    let body = line.strip_suffix('\n')?;
    let mut fields = body.split(',');
    let seq_num = parse_field::<u64>(fields.next()?)?;
    let offset = parse_field::<u64>(fields.next()?)?;
    let size = parse_field::<usize>(fields.next()?)?;
    if fields.next().is_some() {
        return None;
    }
    Some((seq_num, MessageLocation { offset, size }))
}

fn parse_field<T: std::str::FromStr>(field: &str) -> Option<T> {
    // `str::parse` tolerates a leading '+', the header format does not.
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Lazy reader over header records that stops at the first malformed line.
pub struct HeaderRecords<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: usize,
    valid_len: u64,
    done: bool,
    torn: bool,
}

impl<R: BufRead> HeaderRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_number: 0,
            valid_len: 0,
            done: false,
            torn: false,
        }
    }

    /// Number of lines consumed so far, including a rejected one.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Bytes covered by the records accepted so far.
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// `true` once the scan has stopped, whether at end of file or at a bad line.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// `true` if the scan stopped at a line with no `\n`, which can only be
    /// the last line of the input.
    pub fn stopped_at_torn_line(&self) -> bool {
        self.torn
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> Iterator for HeaderRecords<R> {
    type Item = std::io::Result<(u64, MessageLocation)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                self.line_number += 1;
                let record = std::str::from_utf8(&self.buf)
                    .ok()
                    .and_then(parse_header_line);
                match record {
                    Some(record) => {
                        self.valid_len += self.buf.len() as u64;
                        Some(Ok(record))
                    }
                    None => {
                        self.done = true;
                        self.torn = !self.buf.ends_with(b"\n");
                        None
                    }
                }
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// The open body and header handles.
#[derive(Debug)]
struct LogHandles {
    body: File,
    header: File,
}

/// Body/header file pair plus the seq_num → location index.
#[derive(Debug)]
pub struct FileLog {
    body_path: PathBuf,
    header_path: PathBuf,
    index: BTreeMap<u64, MessageLocation>,
    handles: Option<LogHandles>,
}

impl FileLog {
    pub fn new(body_path: impl Into<PathBuf>, header_path: impl Into<PathBuf>) -> Self {
        Self {
            body_path: body_path.into(),
            header_path: header_path.into(),
            index: BTreeMap::new(),
            handles: None,
        }
    }

    pub fn body_path(&self) -> &Path {
        &self.body_path
    }

    pub fn header_path(&self) -> &Path {
        &self.header_path
    }

    /// Number of distinct sequence numbers in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn location(&self, seq_num: u64) -> Option<MessageLocation> {
        self.index.get(&seq_num).copied()
    }

    /// Replace the index with whatever the header file describes.
    ///
    /// A missing header file yields an empty index. Bytes after the last
    /// accepted record are truncated away. Returns the number of header
    /// records accepted (duplicates included).
    pub fn rebuild_index(&mut self) -> StoreResult<usize> {
        self.index.clear();

        let file = match File::open(&self.header_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.header_path.display(), "no header file, index is empty");
                return Ok(0);
            }
            Err(e) => return Err(StoreError::io("opening", &self.header_path, e)),
        };

        let mut records = HeaderRecords::new(BufReader::new(file));
        let mut accepted = 0;
        for record in records.by_ref() {
            let (seq_num, location) =
                record.map_err(|e| StoreError::io("reading", &self.header_path, e))?;
            // Later entries for the same seq_num win.
            self.index.insert(seq_num, location);
            accepted += 1;
        }

        let valid_len = records.valid_len();
        let line = records.line_number();
        let torn = records.stopped_at_torn_line();
        let file_len = records
            .into_inner()
            .get_ref()
            .metadata()
            .map_err(|e| StoreError::io("inspecting", &self.header_path, e))?
            .len();
        if file_len > valid_len {
            if torn {
                warn!(
                    path = %self.header_path.display(),
                    line,
                    recovered = accepted,
                    dropped_bytes = file_len - valid_len,
                    "header ends in a torn record; truncating"
                );
                self.truncate_header(valid_len)?;
            } else {
                warn!(
                    path = %self.header_path.display(),
                    line,
                    recovered = accepted,
                    ignored_bytes = file_len - valid_len,
                    "header scan stopped at malformed record; later records ignored"
                );
                self.terminate_header()?;
            }
        }
        debug!(
            path = %self.header_path.display(),
            records = accepted,
            messages = self.index.len(),
            "message index rebuilt"
        );
        Ok(accepted)
    }

    fn truncate_header(&self, len: u64) -> StoreResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(&self.header_path)
            .map_err(|e| StoreError::io("opening", &self.header_path, e))?;
        file.set_len(len)
            .map_err(|e| StoreError::io("truncating", &self.header_path, e))?;
        file.sync_all()
            .map_err(|e| StoreError::io("flushing", &self.header_path, e))
    }

    /// Append a `\n` if the header does not end with one, so the next record
    /// starts on its own line.
    fn terminate_header(&self) -> StoreResult<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.header_path)
            .map_err(|e| StoreError::io("opening", &self.header_path, e))?;
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|e| StoreError::io("reading", &self.header_path, e))?;
        if last[0] == b'\n' {
            return Ok(());
        }
        file.write_all(b"\n")
            .map_err(|e| StoreError::io("writing", &self.header_path, e))?;
        file.sync_all()
            .map_err(|e| StoreError::io("flushing", &self.header_path, e))
    }

    /// Open (creating if needed) the body and header files for read/write.
    ///
    /// Both handles are installed together; if the second open fails the
    /// first is dropped before returning.
    pub fn open(&mut self) -> StoreResult<()> {
        let body = open_or_create(&self.body_path)?;
        let header = open_or_create(&self.header_path)?;
        self.handles = Some(LogHandles { body, header });
        Ok(())
    }

    /// Release both handles. The index is left untouched.
    pub fn close(&mut self) {
        self.handles = None;
    }

    pub fn is_open(&self) -> bool {
        self.handles.is_some()
    }

    /// Append `msg` as `seq_num` and flush both files to stable storage.
    pub fn save(&mut self, seq_num: u64, msg: &[u8]) -> StoreResult<()> {
        let handles = self.handles.as_mut().ok_or(StoreError::Closed)?;

        let offset = handles
            .body
            .seek(SeekFrom::End(0))
            .map_err(|e| StoreError::io("seeking to end of", &self.body_path, e))?;
        handles
            .body
            .write_all(msg)
            .map_err(|e| StoreError::io("writing", &self.body_path, e))?;

        let location = MessageLocation {
            offset,
            size: msg.len(),
        };
        handles
            .header
            .seek(SeekFrom::End(0))
            .map_err(|e| StoreError::io("seeking to end of", &self.header_path, e))?;
        handles
            .header
            .write_all(format_header_line(seq_num, location).as_bytes())
            .map_err(|e| StoreError::io("writing", &self.header_path, e))?;

        self.index.insert(seq_num, location);

        handles
            .body
            .sync_all()
            .map_err(|e| StoreError::io("flushing", &self.body_path, e))?;
        handles
            .header
            .sync_all()
            .map_err(|e| StoreError::io("flushing", &self.header_path, e))?;
        Ok(())
    }

    /// Fetch the bytes stored for `seq_num`, or `None` if it was never saved.
    pub fn get(&self, seq_num: u64) -> StoreResult<Option<Vec<u8>>> {
        let Some(location) = self.location(seq_num) else {
            return Ok(None);
        };
        self.read_at(location).map(Some)
    }

    /// All stored messages with `begin <= seq_num <= end`, in order.
    /// Sequence numbers that were never saved are skipped.
    pub fn get_range(&self, begin: u64, end: u64) -> StoreResult<Vec<Vec<u8>>> {
        if begin > end {
            return Ok(Vec::new());
        }
        self.index
            .range(begin..=end)
            .map(|(_, location)| self.read_at(*location))
            .collect()
    }

    fn read_at(&self, location: MessageLocation) -> StoreResult<Vec<u8>> {
        let handles = self.handles.as_ref().ok_or(StoreError::Closed)?;
        let body_len = handles
            .body
            .metadata()
            .map_err(|e| StoreError::io("inspecting", &self.body_path, e))?
            .len();
        // Check the claimed extent before allocating for it.
        let in_bounds = u64::try_from(location.size)
            .ok()
            .and_then(|size| location.offset.checked_add(size))
            .is_some_and(|end| end <= body_len);
        if !in_bounds {
            return Err(StoreError::io(
                "reading",
                &self.body_path,
                std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!(
                        "record at offset {} with size {} extends past end of body ({body_len} bytes)",
                        location.offset, location.size
                    ),
                ),
            ));
        }

        let mut body = &handles.body;
        body.seek(SeekFrom::Start(location.offset))
            .map_err(|e| StoreError::io("seeking in", &self.body_path, e))?;
        let mut msg = vec![0u8; location.size];
        body.read_exact(&mut msg)
            .map_err(|e| StoreError::io("reading", &self.body_path, e))?;
        Ok(msg)
    }

    /// Release the handles, delete both files and forget the index.
    pub fn remove(&mut self) -> StoreResult<()> {
        self.close();
        self.index.clear();
        remove_if_exists(&self.body_path)?;
        remove_if_exists(&self.header_path)
    }
}

// ── tests ────────────────────────────────────────────────────────────
