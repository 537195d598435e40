use std::{fmt, io::Read};

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::StoreRecord;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug)]
pub enum MeasurementError {
    #[error("No read measurement for {0}")]
    Unpaired(String),
    #[error("Average duration must be positive: {0}")]
    NonPositiveAverage(String),
    #[error("Malformed measurement: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    #[serde(alias = "Write")]
    Write,
    #[serde(alias = "Read")]
    Read,
}

/// Timing of one batch of writes or reads against a store
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Measurement {
    #[serde(rename = "Store Type")]
    pub store_type: String,
    #[serde(rename = "# Store Nodes")]
    pub store_nodes: u32,
    #[serde(rename = "Record Size (bytes)")]
    pub record_size: u64,
    #[serde(rename = "Num Records")]
    pub num_records: u64,
    #[serde(rename = "# Concurrent Requests")]
    pub concurrency: u32,
    #[serde(rename = "Subject")]
    pub subject: Subject,
    /// Seconds
    #[serde(rename = "Average (s)")]
    pub average: f64,
    /// Seconds
    #[serde(rename = "Std Deviation (s)")]
    pub std_deviation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub records_per_sec: f64,
    pub sigma_records_per_sec: f64,
    pub mb_per_sec: f64,
    pub sigma_mb_per_sec: f64,
}

impl Measurement {
    fn key(&self) -> (&str, u32, u64, u64, u32) {
        (
            &self.store_type,
            self.store_nodes,
            self.record_size,
            self.num_records,
            self.concurrency,
        )
    }

    pub fn throughput(&self) -> Result<Throughput, MeasurementError> {
        if self.average.is_nan() || self.average <= 0.0 {
            return Err(MeasurementError::NonPositiveAverage(self.to_string()));
        }
        let records_per_sec = self.num_records as f64 / self.average;
        let sigma_records_per_sec = records_per_sec * self.std_deviation / self.average;
        let size = self.record_size as f64;
        Ok(Throughput {
            records_per_sec,
            sigma_records_per_sec,
            mb_per_sec: records_per_sec * size / BYTES_PER_MB,
            sigma_mb_per_sec: sigma_records_per_sec * size / BYTES_PER_MB,
        })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = match self.subject {
            Subject::Write => "Write",
            Subject::Read => "Read",
        };
        write!(
            f,
            "{subject}: {} {} node(s), {}bytes size, {} records, {} concurrency",
            self.store_nodes, self.store_type, self.record_size, self.num_records, self.concurrency
        )
    }
}

pub fn read_measurements<R: Read>(reader: R) -> Result<Vec<Measurement>, MeasurementError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let measurements = reader
        .deserialize()
        .collect::<Result<Vec<Measurement>, _>>()?;
    debug!("Loaded {} measurements", measurements.len());
    Ok(measurements)
}

/// Builds one throughput row per write measurement, paired with the first unused
/// read of the same configuration. Rows come out in write order.
pub fn summarize(measurements: &[Measurement]) -> Result<Vec<StoreRecord>, MeasurementError> {
    let (writes, reads): (Vec<_>, Vec<_>) = measurements
        .iter()
        .partition(|m| m.subject == Subject::Write);
    let mut used = vec![false; reads.len()];

    let mut records = Vec::with_capacity(writes.len());
    for write in writes {
        let idx = (0..reads.len())
            .find(|&i| !used[i] && reads[i].key() == write.key())
            .ok_or_else(|| MeasurementError::Unpaired(write.to_string()))?;
        used[idx] = true;

        let w = write.throughput()?;
        let r = reads[idx].throughput()?;
        debug!("{write}");
        records.push(StoreRecord {
            store_type: write.store_type.clone(),
            store_nodes: write.store_nodes,
            concurrent_requests: write.concurrency,
            record_size: write.record_size,
            records_generated: write.num_records,
            write_records_per_sec: w.records_per_sec,
            sigma_write_records_per_sec: w.sigma_records_per_sec,
            write_mb_per_sec: w.mb_per_sec,
            sigma_write_mb_per_sec: w.sigma_mb_per_sec,
            read_records_per_sec: r.records_per_sec,
            sigma_read_records_per_sec: r.sigma_records_per_sec,
            read_mb_per_sec: r.mb_per_sec,
            sigma_read_mb_per_sec: r.sigma_mb_per_sec,
        });
    }

    for (read, _) in reads.iter().zip(&used).filter(|(_, used)| !**used) {
        warn!("Ignoring read without a matching write: {read}");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Store Type,# Store Nodes,Record Size (bytes),Num Records,# Concurrent Requests,Subject,Average (s),Std Deviation (s)";

    #[test]
    fn derives_throughput() {
        let data = format!(
            "{HEADER}\nETCD,3,1024,1000,10,write,2,0.5\nETCD,3,1024,1000,10,read,0.5,0.25\n"
        );
        let measurements = read_measurements(data.as_bytes()).unwrap();
        let records = summarize(&measurements).unwrap();
        assert_eq!(records.len(), 1);

        let row = &records[0];
        assert_eq!(row.store_type, "ETCD");
        assert_eq!(row.store_nodes, 3);
        assert_eq!(row.concurrent_requests, 10);
        assert_eq!(row.record_size, 1024);
        assert_eq!(row.records_generated, 1000);
        assert_eq!(row.write_records_per_sec, 500.0);
        assert_eq!(row.sigma_write_records_per_sec, 125.0);
        assert_eq!(row.write_mb_per_sec, 0.48828125);
        assert_eq!(row.sigma_write_mb_per_sec, 0.1220703125);
        assert_eq!(row.read_records_per_sec, 2000.0);
        assert_eq!(row.sigma_read_records_per_sec, 1000.0);
        assert_eq!(row.read_mb_per_sec, 1.953125);
        assert_eq!(row.sigma_read_mb_per_sec, 0.9765625);
    }

    #[test]
    fn pairs_by_configuration() {
        let data = format!(
            "{HEADER}\nETCD,1,128,100,1,Write,1,0\nETCD,1,256,100,1,Write,1,0\nETCD,1,256,100,1,Read,0.5,0\nETCD,1,128,100,1,Read,0.25,0\n"
        );
        let records = summarize(&read_measurements(data.as_bytes()).unwrap()).unwrap();
        let pairs = records
            .iter()
            .map(|r| (r.record_size, r.read_records_per_sec))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![(128, 400.0), (256, 200.0)]);
    }

    #[test]
    fn unpaired_write_fails() {
        let data = format!("{HEADER}\nETCD,1,128,100,1,write,1,0\nETCD,3,128,100,1,read,1,0\n");
        let err = summarize(&read_measurements(data.as_bytes()).unwrap()).unwrap_err();
        assert!(matches!(err, MeasurementError::Unpaired(_)));
        assert_eq!(
            err.to_string(),
            "No read measurement for Write: 1 ETCD node(s), 128bytes size, 100 records, 1 concurrency"
        );
    }

    #[test]
    fn zero_average_fails() {
        let data = format!("{HEADER}\nETCD,1,128,100,1,write,0,0\nETCD,1,128,100,1,read,1,0\n");
        let err = summarize(&read_measurements(data.as_bytes()).unwrap()).unwrap_err();
        assert!(matches!(err, MeasurementError::NonPositiveAverage(_)));
    }

    #[test]
    fn nan_average_fails() {
        let data = format!("{HEADER}\nETCD,1,128,100,1,write,1,0\nETCD,1,128,100,1,read,NaN,0\n");
        let err = summarize(&read_measurements(data.as_bytes()).unwrap()).unwrap_err();
        assert!(matches!(err, MeasurementError::NonPositiveAverage(_)));
    }

    #[test]
    fn unknown_subject_fails() {
        let data = format!("{HEADER}\nETCD,1,128,100,1,delete,1,0\n");
        assert!(matches!(
            read_measurements(data.as_bytes()),
            Err(MeasurementError::Csv(_))
        ));
    }
}
