//! On-disk journal records

use bytemuck::{Pod, Zeroable};

/// 'CJDB'
pub const JOURNAL_MAGIC: u32 = 0x434A_4442;
pub const JOURNAL_VERSION: u32 = 1;
pub const CONTEXT_LEN: usize = 128;
pub const PAYLOAD_LEN: usize = 256;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct JournalHeader {
    pub magic: u32,
    pub version: u32,
    pub count: u64,
    pub reserved: [u8; 32],
}

pub const HEADER_SIZE: usize = std::mem::size_of::<JournalHeader>();

/// Fixed-size event: 408 bytes
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct JournalEvent {
    pub seq: u64,
    pub timestamp: u32,
    pub kind: u32,
    pub context: [u8; CONTEXT_LEN],
    pub data: [u8; PAYLOAD_LEN],
    pub data_size: u64,
}

pub const EVENT_SIZE: usize = std::mem::size_of::<JournalEvent>();

impl JournalEvent {
    /// Build a record; context and payload are truncated to fit
    pub fn new(seq: u64, timestamp: u32, kind: u32, context: &str, data: &[u8]) -> Self {
        let mut event = JournalEvent::zeroed();
        event.seq = seq;
        event.timestamp = timestamp;
        event.kind = kind;

        // Keep a trailing NUL and never split a UTF-8 sequence
        let mut end = context.len().min(CONTEXT_LEN - 1);
        while !context.is_char_boundary(end) {
            end -= 1;
        }
        event.context[..end].copy_from_slice(&context.as_bytes()[..end]);

        let n = data.len().min(PAYLOAD_LEN);
        event.data[..n].copy_from_slice(&data[..n]);
        event.data_size = n as u64;
        event
    }

    pub fn context(&self) -> &str {
        let end = self.context.iter().position(|b| *b == 0).unwrap_or(CONTEXT_LEN);
        std::str::from_utf8(&self.context[..end]).unwrap_or("")
    }

    pub fn data(&self) -> &[u8] {
        let n = (self.data_size as usize).min(PAYLOAD_LEN);
        &self.data[..n]
    }
}

impl std::fmt::Debug for JournalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalEvent")
            .field("seq", &self.seq)
            .field("timestamp", &self.timestamp)
            .field("kind", &self.kind)
            .field("context", &self.context())
            .field("data_size", &self.data_size)
            .finish()
    }
}
