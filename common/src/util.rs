use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use eyre::{Context, ContextCompat, Result, eyre};
use serde::Serialize;
use svg2pdf::{
    ConversionOptions, PageOptions,
    usvg::{self, fontdb},
};
use tracing::{debug, warn};

pub const PLOT_DATA_DIR: &str = "plot_data";

static FONTS: LazyLock<Arc<fontdb::Database>> = LazyLock::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if db.is_empty() {
        warn!("No system fonts found, figures with text will fail to render");
    } else {
        debug!("Loaded {} font faces", db.len());
    }
    Arc::new(db)
});

pub fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    let options = usvg::Options {
        fontdb: FONTS.clone(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &options).context("Parse rendered svg")?;
    svg2pdf::to_pdf(&tree, ConversionOptions::default(), PageOptions::default())
        .map_err(|e| eyre!("Convert svg to pdf: {e}"))
}

pub fn write_pdf(svg: &str, filepath: &Path) -> Result<()> {
    let pdf = svg_to_pdf(svg)?;
    fs::write(filepath, pdf).context(format!("Write {}", filepath.display()))
}

/// Writes `data` to `plot_data/<stem>.json` beside `filepath`
pub fn write_plot_data<T: Serialize>(data: &T, filepath: &Path) -> Result<PathBuf> {
    let stem = filepath
        .file_stem()
        .and_then(|s| s.to_str())
        .context(format!("Invalid plot filepath: {filepath:?}"))?;
    let plot_data_dir = filepath
        .parent()
        .context("Plot filepath has no parent")?
        .join(PLOT_DATA_DIR);
    if !plot_data_dir.exists() {
        fs::create_dir_all(&plot_data_dir)?;
    }
    let path = plot_data_dir.join(format!("{stem}.json"));
    fs::write(&path, serde_json::to_string(data)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_data_lands_beside_the_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plot_data(&vec![1.5, 2.0], &dir.path().join("combined.pdf")).unwrap();
        assert_eq!(path, dir.path().join("plot_data").join("combined.json"));
        assert_eq!(fs::read_to_string(path).unwrap(), "[1.5,2.0]");
    }

    #[test]
    fn converts_svg() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50"><rect width="100" height="50" fill="red"/></svg>"#;
        let pdf = svg_to_pdf(svg).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn rejects_broken_svg() {
        assert!(svg_to_pdf("<svg").is_err());
    }
}
