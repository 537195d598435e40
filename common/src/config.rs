use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::plot::Plot;

/// A report: the figures to render and how to render them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    pub plots: Vec<Box<dyn Plot>>,
}

impl Config {
    pub fn from_yaml(data: &str) -> Result<Self> {
        serde_yml::from_str(data).context("Parse report config")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).context("Serialize report config")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Page size of every figure, in pixels
    pub figure_size: (u32, u32),
    /// Opacity of the shaded ±sigma band
    pub band_opacity: f64,
    pub font: String,
    /// Also dump the plotted series as json under `plot_data/`
    pub write_plot_data: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            figure_size: (1200, 1200),
            band_opacity: 0.1,
            font: "sans-serif".to_owned(),
            write_plot_data: false,
        }
    }
}
