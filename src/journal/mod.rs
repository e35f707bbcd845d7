//! Append-only history journal with periodic flush to disk

mod record;

pub use record::{
    JournalEvent, JournalHeader, CONTEXT_LEN, EVENT_SIZE, HEADER_SIZE, JOURNAL_MAGIC,
    JOURNAL_VERSION, PAYLOAD_LEN,
};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bytemuck::Zeroable;
use tracing::{debug, error, info};

use crate::core::config::JournalParams;
use crate::core::error::{CivError, Result};

/// Typed tags written into `JournalEvent::kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum EventKind {
    TickCompleted = 1,
    SettlementFounded = 2,
    SettlementPromoted = 3,
    SettlementRevolted = 4,
    SettlementDestroyed = 5,
    UnitSpawned = 6,
    Combat = 7,
    ConquestCompleted = 8,
    WarDeclared = 9,
    PeaceSigned = 10,
    TreatySigned = 11,
    TreatyExpired = 12,
    LanguageSplit = 13,
    LanguageExtinct = 14,
    AssimilationStage = 15,
    GovernmentCrisis = 16,
    GovernmentRenamed = 17,
    StatureChanged = 18,
    BillResolved = 19,
    Breakthrough = 20,
    Outbreak = 21,
    NationAdded = 22,
    SimulationSaved = 23,
    SimulationLoaded = 24,
    ResolutionClosed = 25,
}

impl EventKind {
    pub const ALL: [EventKind; 25] = [
        EventKind::TickCompleted,
        EventKind::SettlementFounded,
        EventKind::SettlementPromoted,
        EventKind::SettlementRevolted,
        EventKind::SettlementDestroyed,
        EventKind::UnitSpawned,
        EventKind::Combat,
        EventKind::ConquestCompleted,
        EventKind::WarDeclared,
        EventKind::PeaceSigned,
        EventKind::TreatySigned,
        EventKind::TreatyExpired,
        EventKind::LanguageSplit,
        EventKind::LanguageExtinct,
        EventKind::AssimilationStage,
        EventKind::GovernmentCrisis,
        EventKind::GovernmentRenamed,
        EventKind::StatureChanged,
        EventKind::BillResolved,
        EventKind::Breakthrough,
        EventKind::Outbreak,
        EventKind::NationAdded,
        EventKind::SimulationSaved,
        EventKind::SimulationLoaded,
        EventKind::ResolutionClosed,
    ];

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::TickCompleted => "tick",
            EventKind::SettlementFounded => "settlement-founded",
            EventKind::SettlementPromoted => "settlement-promoted",
            EventKind::SettlementRevolted => "settlement-revolted",
            EventKind::SettlementDestroyed => "settlement-destroyed",
            EventKind::UnitSpawned => "unit-spawned",
            EventKind::Combat => "combat",
            EventKind::ConquestCompleted => "conquest",
            EventKind::WarDeclared => "war-declared",
            EventKind::PeaceSigned => "peace",
            EventKind::TreatySigned => "treaty-signed",
            EventKind::TreatyExpired => "treaty-expired",
            EventKind::LanguageSplit => "language-split",
            EventKind::LanguageExtinct => "language-extinct",
            EventKind::AssimilationStage => "assimilation-stage",
            EventKind::GovernmentCrisis => "government-crisis",
            EventKind::GovernmentRenamed => "government-renamed",
            EventKind::StatureChanged => "stature-changed",
            EventKind::BillResolved => "bill-resolved",
            EventKind::Breakthrough => "breakthrough",
            EventKind::Outbreak => "outbreak",
            EventKind::NationAdded => "nation-added",
            EventKind::SimulationSaved => "saved",
            EventKind::SimulationLoaded => "loaded",
            EventKind::ResolutionClosed => "resolution-closed",
        }
    }
}

/// In-memory event log, optionally mirrored to a file
#[derive(Debug)]
pub struct Journal {
    events: Vec<JournalEvent>,
    path: Option<PathBuf>,
    flush_interval: usize,
    unflushed: usize,
    clock: u32,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(&JournalParams::default())
    }
}

impl Journal {
    pub fn new(params: &JournalParams) -> Self {
        Self {
            events: Vec::with_capacity(params.initial_capacity),
            path: None,
            flush_interval: params.flush_interval.max(1),
            unflushed: 0,
            clock: 0,
        }
    }

    /// Mirror the log to `path`; every `flush_interval` records the file is rewritten
    pub fn attach_file(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Advance the timestamp stamped on new records; it never goes backwards
    pub fn set_clock(&mut self, ts: u32) {
        self.clock = self.clock.max(ts);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[JournalEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &JournalEvent> {
        self.events.iter()
    }

    pub fn last(&self) -> Option<&JournalEvent> {
        self.events.last()
    }

    /// Append one record and return its sequence id
    pub fn log(&mut self, kind: u32, context: &str, data: &[u8]) -> Result<u64> {
        if self.events.len() == self.events.capacity() {
            let additional = self.events.capacity().max(1);
            self.events.try_reserve(additional).map_err(|e| {
                CivError::OutOfMemory(format!("journal growth to {} records: {e}", self.events.len() + additional))
            })?;
        }

        let seq = self.events.len() as u64 + 1;
        self.events
            .push(JournalEvent::new(seq, self.clock, kind, context, data));
        self.unflushed += 1;

        if self.path.is_some() && self.unflushed >= self.flush_interval {
            if let Err(e) = self.flush() {
                error!("[Journal] Auto-flush failed: {}", e);
                return Err(e);
            }
        }
        Ok(seq)
    }

    /// Typed convenience over [`Journal::log`]
    pub fn record(&mut self, kind: EventKind, context: &str, data: &[u8]) -> Result<u64> {
        self.log(kind.tag(), context, data)
    }

    /// Rewrite the attached file with the header and every record so far
    pub fn flush(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Err(CivError::InvalidState("journal has no file attached".into()));
        };
        self.write_to(&path)?;
        self.unflushed = 0;
        debug!("[Journal] Flushed {} events to {}", self.events.len(), path.display());
        Ok(())
    }

    /// Write a standalone copy without touching the attached path
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut header = JournalHeader::zeroed();
        header.magic = JOURNAL_MAGIC;
        header.version = JOURNAL_VERSION;
        header.count = self.events.len() as u64;

        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(bytemuck::bytes_of(&header))?;
        out.write_all(bytemuck::cast_slice(&self.events))?;
        out.flush()?;
        Ok(())
    }

    /// Read a journal file; later logs continue the sequence
    pub fn load(path: &Path, params: &JournalParams) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE {
            return Err(CivError::InvalidArgument(format!(
                "journal {} is truncated ({} bytes)",
                path.display(),
                bytes.len()
            )));
        }
        let header: JournalHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
        if header.magic != JOURNAL_MAGIC {
            return Err(CivError::InvalidArgument(format!(
                "journal {} has bad magic {:#010x}",
                path.display(),
                header.magic
            )));
        }

        let body = &bytes[HEADER_SIZE..];
        let declared = usize::try_from(header.count)
            .ok()
            .and_then(|count| count.checked_mul(EVENT_SIZE).map(|len| (count, len)));
        let count = match declared {
            Some((count, len)) if len <= body.len() => count,
            _ => {
                return Err(CivError::InvalidArgument(format!(
                    "journal {} declares {} events but holds {}",
                    path.display(),
                    header.count,
                    body.len() / EVENT_SIZE
                )))
            }
        };

        let mut journal = Self::new(params);
        journal.events.try_reserve(count).map_err(|e| {
            CivError::OutOfMemory(format!("loading {count} journal records: {e}"))
        })?;
        for chunk in body.chunks_exact(EVENT_SIZE).take(count) {
            let event: JournalEvent = bytemuck::pod_read_unaligned(chunk);
            journal.clock = journal.clock.max(event.timestamp);
            journal.events.push(event);
        }
        info!("[Journal] Loaded {} events from {}", count, path.display());
        Ok(journal)
    }

    pub fn count_by_type(&self, kind: u32) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Event counts keyed by tag
    pub fn histogram(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for e in &self.events {
            *counts.entry(e.kind).or_insert(0) += 1;
        }
        counts
    }
}
