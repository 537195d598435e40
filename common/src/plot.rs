use core::fmt::Debug;
use std::path::{Path, PathBuf};

use dyn_clone::{DynClone, clone_trait_object};
use eyre::{Context, Result};
use tokio::fs::create_dir_all;
use tracing::{debug, info};

use crate::{
    config::{Config, Settings},
    record::StoreRecord,
    util::PLOT_DATA_DIR,
};

#[typetag::serde(tag = "type")]
#[async_trait::async_trait]
pub trait Plot: Debug + DynClone + Send + Sync {
    /// The files this plot writes, relative to the plot directory
    fn outputs(&self) -> Vec<String>;
    /// Renders the figures
    ///
    /// Arguments:
    /// * `records` - Every loaded record, in file order
    /// * `plot_path` - The directory to write into, ie. the current directory
    /// * `settings` - The settings from the report config
    async fn plot(
        &self,
        records: &[StoreRecord],
        plot_path: &Path,
        settings: &Settings,
    ) -> Result<()>;
}
clone_trait_object!(Plot);

/// Runs every plot of the report, returning the files written
pub async fn plot(
    config: &Config,
    records: &[StoreRecord],
    plot_path: &Path,
) -> Result<Vec<PathBuf>> {
    if config.plots.is_empty() {
        debug!("No plots");
        return Ok(Vec::new());
    }

    create_dir_all(plot_path).await?;
    if config.settings.write_plot_data {
        create_dir_all(plot_path.join(PLOT_DATA_DIR)).await?;
    }

    let mut written = Vec::new();
    for plot in &config.plots {
        plot.plot(records, plot_path, &config.settings)
            .await
            .wrap_err_with(|| format!("Render {plot:?}"))?;
        for output in plot.outputs() {
            let path = plot_path.join(output);
            info!("Wrote {}", path.display());
            written.push(path);
        }
    }
    Ok(written)
}
