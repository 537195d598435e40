use std::{ops::Range, path::Path};

use common::{
    config::{Config, Settings},
    plot::Plot,
    record::{Field, StoreRecord},
};
use eyre::{Result, bail};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod grid;

use grid::{Figure, LegendPosition, Scale, throughput_panels};
pub use grid::Layer;

/// The ETCD vs Zookeeper report: one combined figure plus two figures per store
pub const DEFAULT_REPORT: &str = include_str!("../report.yaml");

const RECORD_SIZE_RANGE: Range<f64> = 64.0..8192.0;
const CONCURRENCY_RANGE: Range<f64> = 0.0..32.0;
const RECORD_SIZE_DESC: &str = "Record Size (bytes)";
const CONCURRENCY_DESC: &str = "# Concurrent Requests";

pub fn default_config() -> Result<Config> {
    Config::from_yaml(DEFAULT_REPORT)
}

fn per_store_line_width() -> u32 {
    2
}

fn render_all(
    figures: &[Figure<'_>],
    records: &[StoreRecord],
    plot_path: &Path,
    settings: &Settings,
) -> Result<()> {
    debug!("Rendering {} figures", figures.len());
    figures
        .par_iter()
        .map(|figure| figure.render(records, plot_path, settings))
        .collect::<Result<Vec<_>>>()?;
    Ok(())
}

/// Every store overlaid on one figure, x = record size, one line per concurrency level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedPerformance {
    #[serde(default = "CombinedPerformance::default_filename")]
    pub filename: String,
    pub stores: Vec<Layer>,
    pub node_counts: Vec<u32>,
    pub concurrency: Vec<u64>,
}

impl CombinedPerformance {
    fn default_filename() -> String {
        "combined.pdf".to_owned()
    }

    pub fn figure(&self) -> Figure<'_> {
        Figure {
            title: "Combined Performance".to_owned(),
            filename: self.filename.clone(),
            panels: throughput_panels(
                Field::RecordSize,
                RECORD_SIZE_DESC,
                RECORD_SIZE_RANGE,
                Scale::Log,
                None,
            ),
            layers: self.stores.clone(),
            node_counts: &self.node_counts,
            category: Field::ConcurrentRequests,
            categories: &self.concurrency,
        }
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for CombinedPerformance {
    fn outputs(&self) -> Vec<String> {
        vec![self.filename.clone()]
    }

    async fn plot(
        &self,
        records: &[StoreRecord],
        plot_path: &Path,
        settings: &Settings,
    ) -> Result<()> {
        self.figure().render(records, plot_path, settings)?;
        Ok(())
    }
}

/// One figure per store, x = record size, one line per concurrency level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceByRecordSize {
    pub stores: Vec<String>,
    pub node_counts: Vec<u32>,
    pub concurrency: Vec<u64>,
    #[serde(default = "per_store_line_width")]
    pub line_width: u32,
}

impl PerformanceByRecordSize {
    pub fn figures(&self) -> Vec<Figure<'_>> {
        self.stores
            .iter()
            .map(|store| Figure {
                title: format!("{store} Performance By Record Size"),
                filename: format!("{store}_store_performance_by_record_size.pdf"),
                panels: throughput_panels(
                    Field::RecordSize,
                    RECORD_SIZE_DESC,
                    RECORD_SIZE_RANGE,
                    Scale::Log,
                    Some(LegendPosition::UpperRight),
                ),
                layers: vec![Layer {
                    name: store.clone(),
                    line_width: self.line_width,
                }],
                node_counts: &self.node_counts,
                category: Field::ConcurrentRequests,
                categories: &self.concurrency,
            })
            .collect()
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for PerformanceByRecordSize {
    fn outputs(&self) -> Vec<String> {
        self.figures().into_iter().map(|f| f.filename).collect()
    }

    async fn plot(
        &self,
        records: &[StoreRecord],
        plot_path: &Path,
        settings: &Settings,
    ) -> Result<()> {
        render_all(&self.figures(), records, plot_path, settings)
    }
}

/// One figure per store, x = concurrency, one line per record size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceByConcurrency {
    pub stores: Vec<String>,
    pub node_counts: Vec<u32>,
    pub record_sizes: Vec<u64>,
    #[serde(default = "per_store_line_width")]
    pub line_width: u32,
}

impl PerformanceByConcurrency {
    pub fn figures(&self) -> Vec<Figure<'_>> {
        self.stores
            .iter()
            .map(|store| Figure {
                title: format!("{store} Performance By Concurrency"),
                filename: format!("{store}_store_performance_by_concurrency.pdf"),
                panels: throughput_panels(
                    Field::ConcurrentRequests,
                    CONCURRENCY_DESC,
                    CONCURRENCY_RANGE,
                    Scale::Linear,
                    Some(LegendPosition::LowerRight),
                ),
                layers: vec![Layer {
                    name: store.clone(),
                    line_width: self.line_width,
                }],
                node_counts: &self.node_counts,
                category: Field::RecordSize,
                categories: &self.record_sizes,
            })
            .collect()
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for PerformanceByConcurrency {
    fn outputs(&self) -> Vec<String> {
        self.figures().into_iter().map(|f| f.filename).collect()
    }

    async fn plot(
        &self,
        records: &[StoreRecord],
        plot_path: &Path,
        settings: &Settings,
    ) -> Result<()> {
        render_all(&self.figures(), records, plot_path, settings)
    }
}

/// A figure over any x field and grouping field, for reports beyond the built-in charts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughputGrid {
    pub title: String,
    pub filename: String,
    pub stores: Vec<Layer>,
    pub node_counts: Vec<u32>,
    pub x: Field,
    pub x_range: [f64; 2],
    #[serde(default)]
    pub x_scale: Scale,
    pub category: Field,
    pub categories: Vec<u64>,
    #[serde(default)]
    pub legend: Option<LegendPosition>,
}

impl ThroughputGrid {
    pub fn figure(&self) -> Result<Figure<'_>> {
        let [start, end] = self.x_range;
        if start.is_nan() || end.is_nan() || start >= end {
            bail!("Empty x range {start}..{end} in {}", self.filename);
        }
        if self.x_scale == Scale::Log && start <= 0.0 {
            bail!("Log x range must be positive in {}", self.filename);
        }
        Ok(Figure {
            title: self.title.clone(),
            filename: self.filename.clone(),
            panels: throughput_panels(
                self.x,
                self.x.header(),
                start..end,
                self.x_scale,
                self.legend,
            ),
            layers: self.stores.clone(),
            node_counts: &self.node_counts,
            category: self.category,
            categories: &self.categories,
        })
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for ThroughputGrid {
    fn outputs(&self) -> Vec<String> {
        vec![self.filename.clone()]
    }

    async fn plot(
        &self,
        records: &[StoreRecord],
        plot_path: &Path,
        settings: &Settings,
    ) -> Result<()> {
        self.figure()?.render(records, plot_path, settings)?;
        Ok(())
    }
}
