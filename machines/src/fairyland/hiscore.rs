//! High-score persistence.
//!
//! The firmware keeps its top-10 table in work RAM. Every frame the keeper
//! checksums that table; when it changes, the entries are merged into the
//! persisted leaderboard. On the first successful read after boot, the
//! persisted leaderboard is written back into RAM so a fresh power-on
//! shows the saved scores.
//!
//! RAM layout at 0xE600: ten 3-byte packed-BCD scores, then ten 6-byte
//! space-padded names. The top score is mirrored at 0xE0F0.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use cathode_core::core::AddressSpace;
use cathode_core::core::checksum::crc32;
use log::{debug, info};
use thiserror::Error;

use super::main_board::VRAM_BASE;

pub const SCORE_TABLE: u32 = 0xE600;
pub const TOP_SCORE_MIRROR: u32 = 0xE0F0;
pub const TABLE_ENTRIES: usize = 10;
pub const SCORE_BYTES: usize = 3;
pub const NAME_LEN: usize = 6;
const NAMES_OFFSET: u32 = (TABLE_ENTRIES * SCORE_BYTES) as u32;
pub const TABLE_LEN: usize = TABLE_ENTRIES * (SCORE_BYTES + NAME_LEN);

/// Text the firmware shows in the score screen header.
const MARKER: &[u8; 3] = b"TOP";
const MARKER_ROW: u32 = 3;
const MARKER_COL: u32 = 12;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("score file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("score data: {0}")]
    Parse(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreEntry {
    pub score: u32,
    /// At most [`NAME_LEN`] single-byte characters, trailing spaces trimmed.
    pub name: String,
}

impl fmt::Display for ScoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:<width$}", self.score, self.name, width = NAME_LEN)
    }
}

/// Serialize as newline-delimited `"<score> <name>"` records. Names are
/// written one byte per character, space-padded to [`NAME_LEN`].
pub fn to_bytes(entries: &[ScoreEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend_from_slice(entry.score.to_string().as_bytes());
        out.push(b' ');
        let start = out.len();
        out.extend(entry.name.chars().map(|c| u8::try_from(c).unwrap_or(b'?')));
        while out.len() - start < NAME_LEN {
            out.push(b' ');
        }
        out.push(b'\n');
    }
    out
}

pub fn parse_bytes(data: &[u8]) -> Result<Vec<ScoreEntry>, PersistenceError> {
    let mut entries = Vec::new();
    for (n, line) in data.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.trim_ascii().is_empty() {
            continue;
        }
        let (score, name) = match line.iter().position(|&b| b == b' ') {
            Some(at) => (&line[..at], &line[at + 1..]),
            None => (line, &[][..]),
        };
        let score = std::str::from_utf8(score)
            .map_err(|e| e.to_string())
            .and_then(|s| s.parse::<u32>().map_err(|e| e.to_string()))
            .map_err(|e| PersistenceError::Parse(format!("line {}: {e}", n + 1)))?;
        entries.push(ScoreEntry {
            score,
            name: name.trim_ascii_end().iter().map(|&b| b as char).collect(),
        });
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Durable home of the leaderboard.
pub trait ScoreStore {
    fn load(&mut self) -> Result<Vec<ScoreEntry>, PersistenceError>;
    fn save(&mut self, entries: &[ScoreEntry]) -> Result<(), PersistenceError>;
}

/// Record file, replaced atomically on save.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScoreStore for FileStore {
    fn load(&mut self) -> Result<Vec<ScoreEntry>, PersistenceError> {
        match std::fs::read(&self.path) {
            Ok(data) => parse_bytes(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, entries: &[ScoreEntry]) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, to_bytes(entries))?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store. Clones share the same contents, so a test can keep a
/// handle after giving one to a machine.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryContents>>,
}

#[derive(Default)]
struct MemoryContents {
    entries: Vec<ScoreEntry>,
    saves: usize,
}

impl MemoryStore {
    pub fn with_entries(entries: Vec<ScoreEntry>) -> Self {
        let store = Self::default();
        store.inner.borrow_mut().entries = entries;
        store
    }

    pub fn entries(&self) -> Vec<ScoreEntry> {
        self.inner.borrow().entries.clone()
    }

    /// Number of completed saves.
    pub fn saves(&self) -> usize {
        self.inner.borrow().saves
    }
}

impl ScoreStore for MemoryStore {
    fn load(&mut self) -> Result<Vec<ScoreEntry>, PersistenceError> {
        Ok(self.entries())
    }

    fn save(&mut self, entries: &[ScoreEntry]) -> Result<(), PersistenceError> {
        let mut inner = self.inner.borrow_mut();
        inner.entries = entries.to_vec();
        inner.saves += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RAM encoding
// ---------------------------------------------------------------------------

fn decode_bcd(bytes: &[u8]) -> Option<u32> {
    bytes.iter().try_fold(0u32, |acc, &b| {
        let (hi, lo) = (b >> 4, b & 0x0F);
        (hi <= 9 && lo <= 9).then(|| acc * 100 + (hi * 10 + lo) as u32)
    })
}

fn encode_bcd(value: u32) -> [u8; SCORE_BYTES] {
    let mut out = [0u8; SCORE_BYTES];
    let mut v = value.min(999_999);
    for byte in out.iter_mut().rev() {
        let pair = (v % 100) as u8;
        *byte = ((pair / 10) << 4) | (pair % 10);
        v /= 100;
    }
    out
}

/// Read the RAM table. Empty slots (score 0) are left out.
pub fn decode_table(ram: &AddressSpace) -> Result<Vec<ScoreEntry>, PersistenceError> {
    let table = ram.slice(SCORE_TABLE, TABLE_LEN);
    let (scores, names) = table.split_at(TABLE_ENTRIES * SCORE_BYTES);
    let mut entries = Vec::with_capacity(TABLE_ENTRIES);
    for (i, (score, name)) in scores
        .chunks_exact(SCORE_BYTES)
        .zip(names.chunks_exact(NAME_LEN))
        .enumerate()
    {
        let score = decode_bcd(score).ok_or_else(|| {
            PersistenceError::Parse(format!("entry {i}: invalid BCD {score:02X?}"))
        })?;
        if score == 0 {
            continue;
        }
        let name: String = name.iter().map(|&b| b as char).collect();
        entries.push(ScoreEntry {
            score,
            name: name.trim_end().to_string(),
        });
    }
    Ok(entries)
}

/// Write `entries` (already sorted) into the RAM table and the top-score
/// mirror. Unused slots are zeroed.
pub fn encode_table(ram: &mut AddressSpace, entries: &[ScoreEntry]) {
    for i in 0..TABLE_ENTRIES {
        let entry = entries.get(i);
        let score = encode_bcd(entry.map_or(0, |e| e.score));
        ram.load(SCORE_TABLE + (i * SCORE_BYTES) as u32, &score);

        let mut name = [b' '; NAME_LEN];
        if let Some(e) = entry {
            for (slot, c) in name.iter_mut().zip(e.name.chars()) {
                *slot = u8::try_from(c).unwrap_or(b'?');
            }
        }
        ram.load(SCORE_TABLE + NAMES_OFFSET + (i * NAME_LEN) as u32, &name);
    }
    let top = entries.first().map_or(0, |e| e.score);
    ram.load(TOP_SCORE_MIRROR, &encode_bcd(top));
}

/// Is the score screen's "TOP" header on screen?
pub fn marker_visible(ram: &AddressSpace) -> bool {
    MARKER.iter().enumerate().all(|(i, &c)| {
        let cell = VRAM_BASE as u32 + (MARKER_ROW * 32 + MARKER_COL + i as u32) * 2;
        ram.read_byte(cell) == c
    })
}

/// Merge into a score-deduplicated list, highest first, at most ten.
pub fn merge(known: &[ScoreEntry], fresh: &[ScoreEntry]) -> Vec<ScoreEntry> {
    let mut merged: Vec<ScoreEntry> = Vec::with_capacity(known.len() + fresh.len());
    for entry in known.iter().chain(fresh) {
        if !merged.iter().any(|e| e.score == entry.score) {
            merged.push(entry.clone());
        }
    }
    merged.sort_by(|a, b| b.score.cmp(&a.score));
    merged.truncate(TABLE_ENTRIES);
    merged
}

// ---------------------------------------------------------------------------
// Keeper
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// Table checksum unchanged.
    Unchanged,
    /// Score screen not showing; table left alone.
    Skipped,
    /// Table read; `saved` tells whether the leaderboard was written out.
    Read { saved: bool },
    /// Table unchanged or skipped, but an earlier failed save went through.
    Flushed,
}

pub struct HiscoreKeeper {
    store: Box<dyn ScoreStore>,
    known: Vec<ScoreEntry>,
    last_checksum: Option<u32>,
    /// The persisted leaderboard has been written back into RAM.
    seeded: bool,
    /// `known` differs from what the store last accepted.
    dirty: bool,
}

impl HiscoreKeeper {
    /// Load the persisted leaderboard. A store that cannot be read starts
    /// empty; the error is returned alongside for the caller to report.
    pub fn open(mut store: Box<dyn ScoreStore>) -> (Self, Option<PersistenceError>) {
        let (known, error) = match store.load() {
            Ok(entries) => (merge(&[], &entries), None),
            Err(e) => (Vec::new(), Some(e)),
        };
        debug!("{} persisted high scores", known.len());
        let keeper = Self {
            store,
            known,
            last_checksum: None,
            seeded: false,
            dirty: false,
        };
        (keeper, error)
    }

    /// Per-frame check of the RAM table. A save that fails stays pending
    /// and is retried on every later call until the store accepts it.
    pub fn observe(&mut self, ram: &mut AddressSpace) -> Result<Observation, PersistenceError> {
        let observation = self.inspect(ram)?;
        if !self.dirty {
            return Ok(observation);
        }
        self.store.save(&self.known)?;
        self.dirty = false;
        Ok(match observation {
            Observation::Read { .. } => Observation::Read { saved: true },
            _ => Observation::Flushed,
        })
    }

    fn inspect(&mut self, ram: &mut AddressSpace) -> Result<Observation, PersistenceError> {
        let checksum = crc32(ram.slice(SCORE_TABLE, TABLE_LEN));
        if self.last_checksum == Some(checksum) {
            return Ok(Observation::Unchanged);
        }
        if self.seeded && !marker_visible(ram) {
            return Ok(Observation::Skipped);
        }

        // Remember failures too, so a corrupt table is reported once
        self.last_checksum = Some(checksum);
        let fresh = decode_table(ram)?;

        let merged = merge(&self.known, &fresh);
        // The first read after boot is always written out
        self.dirty |= !self.seeded || merged != self.known;
        self.known = merged;

        if !self.seeded {
            encode_table(ram, &self.known);
            self.seeded = true;
            self.last_checksum = Some(crc32(ram.slice(SCORE_TABLE, TABLE_LEN)));
            info!("high-score table seeded with {} entries", self.known.len());
        }
        Ok(Observation::Read { saved: false })
    }

    /// Forget RAM state so the next boot is seeded again.
    pub fn reset(&mut self) {
        self.last_checksum = None;
        self.seeded = false;
    }
}
