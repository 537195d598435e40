use std::{
    fmt,
    fs::File,
    io::{Read, Write},
    path::Path,
    str::FromStr,
};

use csv::{ReaderBuilder, StringRecord, Trim, Writer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const STORE_TYPE: &str = "Store Type";

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Missing column: {0}")]
    MissingColumn(&'static str),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Malformed record: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of the throughput table, immutable once loaded
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreRecord {
    #[serde(rename = "Store Type")]
    pub store_type: String,
    #[serde(rename = "# Store Nodes")]
    pub store_nodes: u32,
    #[serde(rename = "# Concurrent Requests")]
    pub concurrent_requests: u32,
    #[serde(rename = "Record Size (bytes)")]
    pub record_size: u64,
    #[serde(rename = "Num Records Generated")]
    pub records_generated: u64,
    #[serde(rename = "Write Records/s")]
    pub write_records_per_sec: f64,
    #[serde(rename = "Sigma Write Records/s", alias = "σ Write Records/s")]
    pub sigma_write_records_per_sec: f64,
    #[serde(rename = "Write MB/s")]
    pub write_mb_per_sec: f64,
    #[serde(rename = "Sigma Write MB/s", alias = "σ Write MB/s")]
    pub sigma_write_mb_per_sec: f64,
    #[serde(rename = "Read Records/s")]
    pub read_records_per_sec: f64,
    #[serde(rename = "Sigma Read Records/s", alias = "σ Read Records/s")]
    pub sigma_read_records_per_sec: f64,
    #[serde(rename = "Reads MB/s")]
    pub read_mb_per_sec: f64,
    #[serde(rename = "Sigma Reads MB/s", alias = "σ Reads MB/s")]
    pub sigma_read_mb_per_sec: f64,
}

impl StoreRecord {
    /// Column headers in file order
    pub fn headers() -> impl Iterator<Item = &'static str> {
        std::iter::once(STORE_TYPE).chain(Field::ALL.into_iter().map(Field::header))
    }

    /// The row as written by [`write_records`]: integers verbatim, floats with three decimals
    pub fn to_row(&self) -> Vec<String> {
        std::iter::once(self.store_type.clone())
            .chain(Field::ALL.into_iter().map(|field| {
                let value = field.value(self);
                if field.is_integer() {
                    format!("{value}")
                } else {
                    format!("{value:.3}")
                }
            }))
            .collect()
    }
}

/// A numeric column of [`StoreRecord`]. Serializes as its header and
/// deserializes from a header, a header alias or its short name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Field {
    #[serde(rename = "# Store Nodes")]
    StoreNodes,
    #[serde(rename = "# Concurrent Requests")]
    ConcurrentRequests,
    #[serde(rename = "Record Size (bytes)")]
    RecordSize,
    #[serde(rename = "Num Records Generated")]
    RecordsGenerated,
    #[serde(rename = "Write Records/s")]
    WriteRecords,
    #[serde(rename = "Sigma Write Records/s")]
    SigmaWriteRecords,
    #[serde(rename = "Write MB/s")]
    WriteMb,
    #[serde(rename = "Sigma Write MB/s")]
    SigmaWriteMb,
    #[serde(rename = "Read Records/s")]
    ReadRecords,
    #[serde(rename = "Sigma Read Records/s")]
    SigmaReadRecords,
    #[serde(rename = "Reads MB/s")]
    ReadMb,
    #[serde(rename = "Sigma Reads MB/s")]
    SigmaReadMb,
}

impl Field {
    /// Every field, in column order
    pub const ALL: [Field; 12] = [
        Field::StoreNodes,
        Field::ConcurrentRequests,
        Field::RecordSize,
        Field::RecordsGenerated,
        Field::WriteRecords,
        Field::SigmaWriteRecords,
        Field::WriteMb,
        Field::SigmaWriteMb,
        Field::ReadRecords,
        Field::SigmaReadRecords,
        Field::ReadMb,
        Field::SigmaReadMb,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Field::StoreNodes => "# Store Nodes",
            Field::ConcurrentRequests => "# Concurrent Requests",
            Field::RecordSize => "Record Size (bytes)",
            Field::RecordsGenerated => "Num Records Generated",
            Field::WriteRecords => "Write Records/s",
            Field::SigmaWriteRecords => "Sigma Write Records/s",
            Field::WriteMb => "Write MB/s",
            Field::SigmaWriteMb => "Sigma Write MB/s",
            Field::ReadRecords => "Read Records/s",
            Field::SigmaReadRecords => "Sigma Read Records/s",
            Field::ReadMb => "Reads MB/s",
            Field::SigmaReadMb => "Sigma Reads MB/s",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::StoreNodes => "store_nodes",
            Field::ConcurrentRequests => "concurrency",
            Field::RecordSize => "record_size",
            Field::RecordsGenerated => "records_generated",
            Field::WriteRecords => "write_records",
            Field::SigmaWriteRecords => "sigma_write_records",
            Field::WriteMb => "write_mb",
            Field::SigmaWriteMb => "sigma_write_mb",
            Field::ReadRecords => "read_records",
            Field::SigmaReadRecords => "sigma_read_records",
            Field::ReadMb => "read_mb",
            Field::SigmaReadMb => "sigma_read_mb",
        }
    }

    /// Alternative headers written by the measurement reporter
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::SigmaWriteRecords => &["σ Write Records/s"],
            Field::SigmaWriteMb => &["σ Write MB/s"],
            Field::SigmaReadRecords => &["σ Read Records/s"],
            Field::SigmaReadMb => &["σ Reads MB/s"],
            _ => &[],
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Field::StoreNodes
                | Field::ConcurrentRequests
                | Field::RecordSize
                | Field::RecordsGenerated
        )
    }

    pub fn value(self, record: &StoreRecord) -> f64 {
        match self {
            Field::StoreNodes => record.store_nodes as f64,
            Field::ConcurrentRequests => record.concurrent_requests as f64,
            Field::RecordSize => record.record_size as f64,
            Field::RecordsGenerated => record.records_generated as f64,
            Field::WriteRecords => record.write_records_per_sec,
            Field::SigmaWriteRecords => record.sigma_write_records_per_sec,
            Field::WriteMb => record.write_mb_per_sec,
            Field::SigmaWriteMb => record.sigma_write_mb_per_sec,
            Field::ReadRecords => record.read_records_per_sec,
            Field::SigmaReadRecords => record.sigma_read_records_per_sec,
            Field::ReadMb => record.read_mb_per_sec,
            Field::SigmaReadMb => record.sigma_read_mb_per_sec,
        }
    }

    fn matches_header(self, header: &str) -> bool {
        self.header() == header || self.aliases().contains(&header)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl TryFrom<String> for Field {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Field {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Field::ALL
            .into_iter()
            .find(|field| field.matches_header(s) || field.name() == s)
            .ok_or_else(|| RecordError::UnknownField(s.to_owned()))
    }
}

pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<StoreRecord>, RecordError> {
    read_records(File::open(path)?)
}

/// Parses a throughput table, failing on the first missing column or malformed row
pub fn read_records<R: Read>(reader: R) -> Result<Vec<StoreRecord>, RecordError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    check_headers(reader.headers()?)?;

    let records = reader
        .deserialize()
        .collect::<Result<Vec<StoreRecord>, _>>()?;
    debug!("Loaded {} records", records.len());
    Ok(records)
}

fn check_headers(headers: &StringRecord) -> Result<(), RecordError> {
    if !headers.iter().any(|h| h == STORE_TYPE) {
        return Err(RecordError::MissingColumn(STORE_TYPE));
    }
    for field in Field::ALL {
        if !headers.iter().any(|h| field.matches_header(h)) {
            return Err(RecordError::MissingColumn(field.header()));
        }
    }
    Ok(())
}

pub fn write_records<W: Write>(writer: W, records: &[StoreRecord]) -> Result<(), RecordError> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record(StoreRecord::headers())?;
    for record in records {
        writer.write_record(record.to_row())?;
    }
    writer.flush()?;
    Ok(())
}
