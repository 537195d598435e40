use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use crate::record::{Field, StoreRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub err: f64,
}

/// The records of one (node count, category value) combination, in file order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub store: String,
    pub node_count: u32,
    pub category: u64,
    /// Position in the node count list, picks the color
    pub node_index: usize,
    /// Position in the category list, picks the line style
    pub category_index: usize,
    pub points: Vec<Point>,
}

impl Series {
    pub fn label(&self) -> String {
        format!("{} {}n {}", self.store, self.node_count, self.category)
    }
}

/// Which records to pick and which of their columns to plot
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub store: &'a str,
    pub category: Field,
    pub x: Field,
    pub y: Field,
    pub err: Field,
}

impl Selection<'_> {
    fn matches(&self, record: &StoreRecord, node_count: u32, category: u64) -> bool {
        record.store_type == self.store
            && record.store_nodes == node_count
            && self.category.value(record) == category as f64
    }

    fn point(&self, record: &StoreRecord) -> Point {
        Point {
            x: self.x.value(record),
            y: self.y.value(record),
            err: self.err.value(record),
        }
    }
}

/// Groups `records` by node count (outer) and category value (inner).
///
/// Points keep the order the records were loaded in. Combinations without any
/// matching record are left out.
pub fn select_series(
    records: &[StoreRecord],
    selection: &Selection<'_>,
    node_counts: &[u32],
    categories: &[u64],
) -> Vec<Series> {
    node_counts
        .iter()
        .copied()
        .enumerate()
        .cartesian_product(categories.iter().copied().enumerate())
        .filter_map(|((node_index, node_count), (category_index, category))| {
            let points = records
                .iter()
                .filter(|record| selection.matches(record, node_count, category))
                .map(|record| selection.point(record))
                .collect::<Vec<_>>();
            if points.is_empty() {
                debug!(
                    "No {} records for {node_count} node(s), {} = {category}",
                    selection.store, selection.category
                );
                return None;
            }
            Some(Series {
                store: selection.store.to_owned(),
                node_count,
                category,
                node_index,
                category_index,
                points,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(store: &str, nodes: u32, concurrency: u32, size: u64, write: f64, sigma: f64) -> StoreRecord {
        StoreRecord {
            store_type: store.to_owned(),
            store_nodes: nodes,
            concurrent_requests: concurrency,
            record_size: size,
            records_generated: 1000,
            write_records_per_sec: write,
            sigma_write_records_per_sec: sigma,
            write_mb_per_sec: 0.0,
            sigma_write_mb_per_sec: 0.0,
            read_records_per_sec: 0.0,
            sigma_read_records_per_sec: 0.0,
            read_mb_per_sec: 0.0,
            sigma_read_mb_per_sec: 0.0,
        }
    }

    fn by_concurrency(store: &str) -> Selection<'_> {
        Selection {
            store,
            category: Field::ConcurrentRequests,
            x: Field::RecordSize,
            y: Field::WriteRecords,
            err: Field::SigmaWriteRecords,
        }
    }

    #[test]
    fn one_series_per_category() {
        let records = vec![
            record("ETCD", 1, 1, 128, 100.0, 5.0),
            record("ETCD", 1, 30, 128, 80.0, 4.0),
        ];
        let series = select_series(&records, &by_concurrency("ETCD"), &[1], &[1, 30]);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label(), "ETCD 1n 1");
        assert_eq!(
            series[0].points,
            vec![Point {
                x: 128.0,
                y: 100.0,
                err: 5.0
            }]
        );
        assert_eq!(series[1].label(), "ETCD 1n 30");
        assert_eq!(
            series[1].points,
            vec![Point {
                x: 128.0,
                y: 80.0,
                err: 4.0
            }]
        );
        assert_ne!(series[0].category_index, series[1].category_index);
    }

    #[test]
    fn no_match_yields_nothing() {
        let records = vec![record("ETCD", 1, 1, 128, 100.0, 5.0)];
        assert!(select_series(&records, &by_concurrency("Zookeeper"), &[1], &[1]).is_empty());
        assert!(select_series(&records, &by_concurrency("ETCD"), &[3], &[1]).is_empty());
        assert!(select_series(&[], &by_concurrency("ETCD"), &[1], &[1]).is_empty());
    }

    #[test]
    fn keeps_file_order() {
        let records = vec![
            record("ETCD", 1, 1, 1024, 50.0, 1.0),
            record("Zookeeper", 1, 1, 128, 70.0, 1.0),
            record("ETCD", 1, 1, 128, 100.0, 1.0),
            record("ETCD", 1, 1, 4096, 20.0, 1.0),
        ];
        let series = select_series(&records, &by_concurrency("ETCD"), &[1], &[1]);
        let xs = series[0].points.iter().map(|p| p.x).collect::<Vec<_>>();
        assert_eq!(xs, vec![1024.0, 128.0, 4096.0]);
    }

    #[test]
    fn node_counts_are_the_outer_loop() {
        let records = vec![
            record("ETCD", 5, 1, 128, 100.0, 1.0),
            record("ETCD", 1, 30, 128, 100.0, 1.0),
            record("ETCD", 5, 30, 128, 100.0, 1.0),
        ];
        let series = select_series(&records, &by_concurrency("ETCD"), &[1, 5], &[1, 30]);
        let keys = series
            .iter()
            .map(|s| (s.node_index, s.category_index))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![(0, 1), (1, 0), (1, 1)]);
        assert_eq!(series[1].label(), "ETCD 5n 1");
    }
}
