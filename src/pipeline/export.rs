//! Flattened OLTP / OLAP views written to CSV for reporting tools.

use crate::constants::{OLAP_EXPORT_FILE, OLTP_EXPORT_FILE};
use crate::error::Result;
use crate::pipeline::storage::{ExportView, Storage, TabularView};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub oltp_file: PathBuf,
    pub oltp_rows: usize,
    pub olap_file: PathBuf,
    pub olap_rows: usize,
}

pub struct Exporter<'a> {
    storage: &'a dyn Storage,
    output_dir: PathBuf,
}

impl<'a> Exporter<'a> {
    pub fn new(storage: &'a dyn Storage, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            output_dir: output_dir.into(),
        }
    }

    #[instrument(skip(self), fields(dir = %self.output_dir.display()))]
    pub async fn export_all(&self) -> Result<ExportReport> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let oltp_file = self.output_dir.join(OLTP_EXPORT_FILE);
        let oltp = self.storage.export_view(ExportView::Oltp).await?;
        let oltp_rows = write_view(&oltp_file, oltp).await?;

        let olap_file = self.output_dir.join(OLAP_EXPORT_FILE);
        let olap = self.storage.export_view(ExportView::Olap).await?;
        let olap_rows = write_view(&olap_file, olap).await?;

        info!(
            "Exported {} OLTP rows to {} and {} OLAP rows to {}",
            oltp_rows,
            oltp_file.display(),
            olap_rows,
            olap_file.display()
        );
        Ok(ExportReport {
            oltp_file,
            oltp_rows,
            olap_file,
            olap_rows,
        })
    }
}

async fn write_view(path: &Path, view: TabularView) -> Result<usize> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_csv(&path, &view)).await?
}

/// Header row, then one record per view row.
pub fn write_csv(path: &Path, view: &TabularView) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&view.columns)?;
    for row in &view.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(view.rows.len())
}
