//! State layout: the single persisted record of the vault
//!
//! The record outlives every logic replacement. Its encoding is append-only:
//! each schema version contributes one segment, written after all earlier
//! ones, and no segment is ever reordered, retyped or removed.
//!
//! ```text
//! magic "CSTL" | format u16 | schema_version u32 | segment_count u32
//!   ( segment_len u32 | bincode(segment) ) * segment_count
//! sha256(all preceding bytes)
//! ```
//!
//! All integers are little-endian. A reader decodes the segments it knows and
//! keeps the rest as opaque bytes, re-emitting them unchanged on the next
//! write. Logic built against an older schema therefore finds its own fields
//! at the same position in a newer record and never drops the newer fields.

use custody_types::{Address, Amount, AssetId, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::errors::{MigrationError, StoreError};
use crate::ledger::CustodyLedger;
use crate::security::CircuitBreaker;

/// Leading bytes of every layout record.
pub const LAYOUT_MAGIC: [u8; 4] = *b"CSTL";

/// Framing format version. Independent of the schema version.
pub const LAYOUT_FORMAT: u16 = 1;

/// Number of segments this build knows how to decode.
pub const KNOWN_SEGMENTS: u32 = 2;

/// Byte length of the fixed header.
pub const HEADER_LEN: usize = 4 + 2 + 4 + 4;

const CHECKSUM_LEN: usize = 32;

/// Segment 1 (schema v1): identity and balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSegment {
    pub owner: Address,
    pub balances: CustodyLedger,
}

/// Segment 2 (schema v2): limiter parameters, circuit breaker, withdrawal
/// history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsSegment {
    /// `0` means no cap.
    pub max_per_operation: Amount,
    /// Seconds. `0` means no delay.
    pub min_interval: u64,
    pub breaker: CircuitBreaker,
    /// Missing or `0` means never operated on.
    pub last_operation_at: BTreeMap<AssetId, Timestamp>,
}

impl LimitsSegment {
    /// Fresh segment: active breaker, empty history.
    pub fn new(max_per_operation: Amount, min_interval: u64) -> Self {
        Self {
            max_per_operation,
            min_interval,
            breaker: CircuitBreaker::new(),
            last_operation_at: BTreeMap::new(),
        }
    }
}

/// Decoded view of the persisted record.
#[derive(Debug, Clone, PartialEq)]
pub struct StateLayout {
    schema_version: u32,
    core: CoreSegment,
    limits: Option<LimitsSegment>,
    /// Segments beyond what the reader decoded, in original order.
    retained: Vec<Vec<u8>>,
}

impl StateLayout {
    /// The layout before genesis: schema 0, no segments.
    pub fn uninitialized() -> Self {
        Self {
            schema_version: 0,
            core: CoreSegment::default(),
            limits: None,
            retained: Vec::new(),
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn is_initialized(&self) -> bool {
        self.schema_version > 0
    }

    pub fn owner(&self) -> &Address {
        &self.core.owner
    }

    pub fn ledger(&self) -> &CustodyLedger {
        &self.core.balances
    }

    pub fn ledger_mut(&mut self) -> &mut CustodyLedger {
        &mut self.core.balances
    }

    /// The v2 segment. Absent on a v1 record or when read by a v1-only reader.
    pub fn limits(&self) -> Result<&LimitsSegment, MigrationError> {
        self.limits.as_ref().ok_or(MigrationError::MissingSegment {
            segment: 2,
            schema_version: self.schema_version,
        })
    }

    pub fn limits_mut(&mut self) -> Result<&mut LimitsSegment, MigrationError> {
        let schema_version = self.schema_version;
        self.limits.as_mut().ok_or(MigrationError::MissingSegment {
            segment: 2,
            schema_version,
        })
    }

    /// Install the v2 segment. Used by the v2 migration to seed its fields.
    pub fn install_limits(&mut self, segment: LimitsSegment) {
        self.limits = Some(segment);
    }

    /// Append an opaque segment after all existing ones. Used by migrations
    /// whose segment this build does not decode.
    pub fn append_segment(&mut self, bytes: Vec<u8>) {
        self.retained.push(bytes);
    }

    /// Total segments this layout will encode.
    pub fn segment_count(&self) -> usize {
        let core = usize::from(self.is_initialized());
        let limits = usize::from(self.limits.is_some());
        core + limits + self.retained.len()
    }

    /// Opaque segments carried through unchanged.
    pub fn retained_segments(&self) -> &[Vec<u8>] {
        &self.retained
    }

    pub(crate) fn initialize(&mut self, owner: Address) {
        self.core.owner = owner;
        self.schema_version = 1;
    }

    pub(crate) fn set_schema_version(&mut self, version: u32) {
        self.schema_version = version;
    }

    // ───────────────────────── Encoding ─────────────────────────

    /// Serialize to the framed, checksummed record.
    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        let mut segments: Vec<Vec<u8>> = Vec::with_capacity(self.segment_count());
        if self.is_initialized() {
            segments.push(bincode::serialize(&self.core)?);
        }
        if let Some(limits) = &self.limits {
            segments.push(bincode::serialize(limits)?);
        }
        segments.extend(self.retained.iter().cloned());

        let count = u32::try_from(segments.len())
            .map_err(|_| StoreError::Encoding("too many segments".to_string()))?;

        let mut out = Vec::with_capacity(
            HEADER_LEN + segments.iter().map(|s| s.len() + 4).sum::<usize>() + CHECKSUM_LEN,
        );
        out.extend_from_slice(&LAYOUT_MAGIC);
        out.extend_from_slice(&LAYOUT_FORMAT.to_le_bytes());
        out.extend_from_slice(&self.schema_version.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        for segment in &segments {
            let len = u32::try_from(segment.len())
                .map_err(|_| StoreError::Encoding("segment exceeds 4 GiB".to_string()))?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(segment);
        }
        let digest = Sha256::digest(&out);
        out.extend_from_slice(&digest);
        Ok(out)
    }

    /// Decode with every segment this build knows.
    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        Self::decode_known(bytes, KNOWN_SEGMENTS)
    }

    /// Decode as a reader that only knows the first `known_segments`
    /// segments. Everything after them is retained as opaque bytes.
    pub fn decode_known(bytes: &[u8], known_segments: u32) -> Result<Self, StoreError> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(corrupt("record shorter than header and checksum"));
        }
        let (body, stored) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let computed = Sha256::digest(body);
        if computed.as_slice() != stored {
            return Err(StoreError::ChecksumMismatch {
                expected: hex::encode(stored),
                actual: format!("{:x}", computed),
            });
        }

        let mut cursor = Cursor::new(body);
        if cursor.take(4)? != LAYOUT_MAGIC {
            return Err(corrupt("bad magic"));
        }
        let format = cursor.read_u16()?;
        if format != LAYOUT_FORMAT {
            return Err(StoreError::UnsupportedFormat(format));
        }
        let schema_version = cursor.read_u32()?;
        let segment_count = cursor.read_u32()?;

        if segment_count < schema_version {
            return Err(corrupt(&format!(
                "schema v{} needs {} segments, record has {}",
                schema_version, schema_version, segment_count
            )));
        }
        if schema_version == 0 && segment_count > 0 {
            return Err(corrupt("uninitialized record carries segments"));
        }

        let known = known_segments.clamp(1, KNOWN_SEGMENTS);
        let mut layout = Self::uninitialized();
        layout.schema_version = schema_version;

        for index in 1..=segment_count {
            let len = cursor.read_u32()? as usize;
            let raw = cursor.take(len)?;
            match index {
                1 if index <= known => layout.core = bincode::deserialize(raw)?,
                2 if index <= known => layout.limits = Some(bincode::deserialize(raw)?),
                _ => layout.retained.push(raw.to_vec()),
            }
        }

        if !cursor.is_empty() {
            return Err(corrupt("trailing bytes after last segment"));
        }
        Ok(layout)
    }
}

fn corrupt(reason: &str) -> StoreError {
    StoreError::Corrupt {
        reason: reason.to_string(),
    }
}

/// Bounds-checked reader over the record body.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StoreError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| corrupt("truncated record"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, StoreError> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32, StoreError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }
}
