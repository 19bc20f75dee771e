//! Log record types and serialization.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::Collection;
use crate::types::{SequenceNumber, TransactionId};

/// Magic bytes opening every log record.
pub(crate) const LOG_MAGIC: [u8; 4] = *b"GWAL";

/// Current log format version.
pub(crate) const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

/// Type byte of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Start of a commit group.
    Begin = 1,
    /// Full image of an inserted or updated record.
    Put = 2,
    /// End of a commit group; the group is durable.
    Commit = 3,
    /// A group that must be ignored.
    Abort = 4,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Put),
            3 => Some(Self::Commit),
            4 => Some(Self::Abort),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A record in the write-ahead log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Start of a commit group.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Full image of a record written by the group.
    Put {
        /// Transaction ID.
        txid: TransactionId,
        /// Collection of the record.
        collection: Collection,
        /// Record ID.
        entity_id: EntityId,
        /// CBOR bytes of the record.
        payload: Vec<u8>,
    },

    /// End of a commit group.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence assigned to the commit.
        sequence: SequenceNumber,
    },

    /// A group that was started but must not be replayed.
    Abort {
        /// Transaction ID.
        txid: TransactionId,
    },
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Begin { .. } => LogRecordType::Begin,
            Self::Put { .. } => LogRecordType::Put,
            Self::Commit { .. } => LogRecordType::Commit,
            Self::Abort { .. } => LogRecordType::Abort,
        }
    }

    /// Returns the transaction the record belongs to.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid }
            | Self::Put { txid, .. }
            | Self::Commit { txid, .. }
            | Self::Abort { txid } => *txid,
        }
    }

    /// Serializes the record payload (without envelope).
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Begin { txid } | Self::Abort { txid } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
            }
            Self::Put {
                txid,
                collection,
                entity_id,
                payload,
            } => {
                let len = u32::try_from(payload.len())
                    .map_err(|_| CoreError::encode("record payload too large"))?;
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.push(collection.as_byte());
                buf.extend_from_slice(entity_id.as_bytes());
                buf.extend_from_slice(&len.to_le_bytes());
                buf.extend_from_slice(payload);
            }
            Self::Commit { txid, sequence } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
        }
        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// `offset` is only used for error reporting.
    pub fn decode_payload(
        record_type: LogRecordType,
        payload: &[u8],
        offset: u64,
    ) -> CoreResult<Self> {
        let mut reader = PayloadReader {
            payload,
            cursor: 0,
            offset,
        };

        let record = match record_type {
            LogRecordType::Begin => Self::Begin {
                txid: TransactionId::new(reader.u64()?),
            },
            LogRecordType::Abort => Self::Abort {
                txid: TransactionId::new(reader.u64()?),
            },
            LogRecordType::Commit => Self::Commit {
                txid: TransactionId::new(reader.u64()?),
                sequence: SequenceNumber::new(reader.u64()?),
            },
            LogRecordType::Put => {
                let txid = TransactionId::new(reader.u64()?);
                let byte = reader.take(1)?[0];
                let collection = Collection::from_byte(byte).ok_or_else(|| {
                    CoreError::log_corruption(offset, format!("unknown collection {byte}"))
                })?;
                let mut id = [0u8; 16];
                id.copy_from_slice(reader.take(16)?);
                let len = reader.u32()? as usize;
                let payload = reader.take(len)?.to_vec();
                Self::Put {
                    txid,
                    collection,
                    entity_id: EntityId::from_bytes(id),
                    payload,
                }
            }
        };

        if reader.cursor != payload.len() {
            return Err(CoreError::log_corruption(
                offset,
                format!(
                    "trailing bytes in {:?} record: expected {}, got {}",
                    record_type,
                    reader.cursor,
                    payload.len()
                ),
            ));
        }
        Ok(record)
    }

    /// Serializes the record with its envelope.
    pub fn encode_frame(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::encode("log record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&LOG_MAGIC);
        data.extend_from_slice(&LOG_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
    offset: u64,
}

impl<'a> PayloadReader<'a> {
    fn take(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(n)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| CoreError::log_corruption(self.offset, "unexpected end of payload"))?;
        let bytes = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }
}

/// Computes the CRC-32 (IEEE) checksum of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
