//! `dump-log` command.
//!
//! Reads the log file directly without locking or replaying it, so it also
//! works on a store that refuses to open.

use crate::output::{emit, Format};
use gigmarket_core::{LogRecord, StoreDir, WriteAheadLog};
use gigmarket_storage::FileBackend;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Log record representation for output.
#[derive(Debug, Serialize)]
pub struct LogRecordInfo {
    /// Offset in the log file.
    pub offset: u64,
    /// Record type.
    pub record_type: &'static str,
    /// Transaction ID.
    pub txid: u64,
    /// Collection (put records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Entity ID (put records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Commit sequence (commit records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Payload size in bytes (put records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
}

impl LogRecordInfo {
    fn from_record(offset: u64, record: &LogRecord) -> Self {
        let mut row = Self {
            offset,
            record_type: "",
            txid: record.txid().as_u64(),
            collection: None,
            entity_id: None,
            sequence: None,
            payload_size: None,
        };
        match record {
            LogRecord::Begin { .. } => row.record_type = "BEGIN",
            LogRecord::Put {
                collection,
                entity_id,
                payload,
                ..
            } => {
                row.record_type = "PUT";
                row.collection = Some(collection.to_string());
                row.entity_id = Some(entity_id.to_string());
                row.payload_size = Some(payload.len());
            }
            LogRecord::Commit { sequence, .. } => {
                row.record_type = "COMMIT";
                row.sequence = Some(sequence.as_u64());
            }
            LogRecord::Abort { .. } => row.record_type = "ABORT",
        }
        row
    }
}

pub fn run(
    path: &Path,
    limit: Option<usize>,
    start_offset: u64,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = StoreDir::log_path_in(path);
    if !log_path.exists() {
        return Err(format!("log file not found: {}", log_path.display()).into());
    }

    info!("Reading log records from {:?}", log_path);
    let log = WriteAheadLog::new(Box::new(FileBackend::open(&log_path)?), false);
    let records: Vec<LogRecordInfo> = log
        .read_all()?
        .iter()
        .filter(|(offset, _)| *offset >= start_offset)
        .take(limit.unwrap_or(usize::MAX))
        .map(|(offset, record)| LogRecordInfo::from_record(*offset, record))
        .collect();

    emit(format, &records, |records| {
        for r in records {
            let mut line = format!("{:>10}  {:<6} txn:{}", r.offset, r.record_type, r.txid);
            if let (Some(collection), Some(id)) = (&r.collection, &r.entity_id) {
                line.push_str(&format!("  {collection} {id}"));
            }
            if let Some(size) = r.payload_size {
                line.push_str(&format!("  ({size} bytes)"));
            }
            if let Some(seq) = r.sequence {
                line.push_str(&format!("  seq:{seq}"));
            }
            println!("{line}");
        }
        println!("{} record(s)", records.len());
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigmarket_core::{Collection, EntityId, SequenceNumber, TransactionId};

    #[test]
    fn put_rows_carry_entity_details() {
        let id = EntityId::new();
        let record = LogRecord::Put {
            txid: TransactionId::new(7),
            collection: Collection::Bids,
            entity_id: id,
            payload: vec![0; 12],
        };
        let row = LogRecordInfo::from_record(40, &record);
        assert_eq!(row.record_type, "PUT");
        assert_eq!(row.txid, 7);
        assert_eq!(row.entity_id, Some(id.to_string()));
        assert_eq!(row.payload_size, Some(12));
        assert_eq!(row.sequence, None);
    }

    #[test]
    fn commit_rows_skip_entity_fields_in_json() {
        let record = LogRecord::Commit {
            txid: TransactionId::new(7),
            sequence: SequenceNumber::new(3),
        };
        let json = serde_json::to_value(LogRecordInfo::from_record(0, &record)).unwrap();
        assert_eq!(json["record_type"], "COMMIT");
        assert_eq!(json["sequence"], 3);
        assert!(json.get("entity_id").is_none());
    }

    #[test]
    fn missing_log_is_an_error() {
        let dir = std::env::temp_dir().join(format!("gigmarket-missing-{}", EntityId::new()));
        assert!(run(&dir, None, 0, Format::Text).is_err());
    }
}
