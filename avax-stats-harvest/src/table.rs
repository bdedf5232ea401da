//! Tabular export of harvested records.
//!
//! Both harvesters produce a [`Table`] of string cells. It is converted to a
//! single Arrow [`RecordBatch`] of nullable `Utf8` columns and written either
//! as CSV (nulls become empty cells) or as Zstd-compressed Parquet.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::Deserialize;

/// File format of the harvest output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values with a header row.
    #[default]
    Csv,
    /// Apache Parquet, Zstd level 3.
    Parquet,
}

/// A fixed set of named columns and rows of optional string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Empty table with the given header.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Column names, in output order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row width differs from the header.
    pub fn push(&mut self, row: Vec<Option<String>>) -> Result<()> {
        ensure!(
            row.len() == self.columns.len(),
            "row has {} cells, expected {}",
            row.len(),
            self.columns.len()
        );
        self.rows.push(row);
        Ok(())
    }

    /// Convert to a columnar [`RecordBatch`].
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow rejects the schema, e.g. for duplicate
    /// column names.
    pub fn to_batch(&self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(
            self.columns
                .iter()
                .map(|name| Field::new(name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));
        let arrays = (0..self.columns.len())
            .map(|i| {
                let cells = self
                    .rows
                    .iter()
                    .map(|row| row.get(i).and_then(Option::as_deref));
                Arc::new(cells.collect::<StringArray>()) as ArrayRef
            })
            .collect::<Vec<_>>();
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}

/// Write `table` to `path`, creating the parent directory if needed.
///
/// Uses atomic write (temp file + rename): a failed run never leaves a
/// truncated output behind, and the temp file is removed on failure.
///
/// # Errors
///
/// Returns an error on I/O failure or if the encoder rejects the data.
pub fn write(path: &Path, table: &Table, format: OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let batch = table.to_batch()?;
    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;

    let written = match format {
        OutputFormat::Csv => write_csv(file, &batch),
        OutputFormat::Parquet => write_parquet(file, &batch),
    }
    .with_context(|| format!("encoding {}", tmp.display()))
    .and_then(|()| {
        std::fs::rename(&tmp, path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))
    });
    if let Err(err) = written {
        if let Err(e) = std::fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
        }
        return Err(err);
    }

    tracing::info!(path = %path.display(), rows = table.num_rows(), ?format, "output written");
    Ok(())
}

fn write_csv(file: File, batch: &RecordBatch) -> Result<()> {
    let mut writer = arrow_csv::WriterBuilder::new()
        .with_header(true)
        .build(file);
    writer.write(batch)?;
    Ok(())
}

fn write_parquet(file: File, batch: &RecordBatch) -> Result<()> {
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(
            parquet::basic::ZstdLevel::try_new(3).context("invalid zstd level")?,
        ))
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}
