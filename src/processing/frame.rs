//! DataFrame helpers shared by the pipeline stages

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Load a CSV file with a header row
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|e| PipelineError::Data(format!("failed to open {}: {}", path.display(), e)))?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .into_reader_with_file_handle(file)
        .finish()?;

    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "CSV loaded");
    Ok(df)
}

/// Write a frame as CSV, creating parent directories
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;

    debug!(path = %path.display(), rows = df.height(), "CSV written");
    Ok(())
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|c| c.to_string()).collect()
}

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Schema(format!("missing column '{}'", name)))?;
    let series = column.as_materialized_series();
    if series.null_count() > 0 {
        return Err(PipelineError::Validation(format!(
            "column '{}' has {} missing values",
            name,
            series.null_count()
        )));
    }
    Ok(series)
}

/// Column values rendered as strings, for categorical handling
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let as_str = series(df, name)?.cast(&DataType::String)?;
    Ok(as_str
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

/// Column values as f64; anything that does not convert is a validation error
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let as_f64 = series(df, name)?.cast(&DataType::Float64)?;
    if as_f64.null_count() > 0 {
        return Err(PipelineError::Validation(format!(
            "column '{}' has non-numeric values",
            name
        )));
    }
    Ok(as_f64.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

/// Stack the named columns into a row-major matrix
pub fn columns_to_array2(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let col_data: Vec<Vec<f64>> = names
        .iter()
        .map(|name| f64_values(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((df.height(), names.len()), |(r, c)| col_data[c][r]))
}

/// Build a frame of feature columns followed by an integer label column
pub fn frame_from_arrays(
    x: &Array2<f64>,
    feature_names: &[String],
    y: &Array1<i64>,
    label: &str,
) -> Result<DataFrame> {
    if x.ncols() != feature_names.len() || x.nrows() != y.len() {
        return Err(PipelineError::Shape {
            expected: format!("{} rows x {} features", y.len(), feature_names.len()),
            actual: format!("{} rows x {} features", x.nrows(), x.ncols()),
        });
    }

    let mut columns: Vec<Column> = feature_names
        .iter()
        .enumerate()
        .map(|(j, name)| Series::new(name.as_str().into(), x.column(j).to_vec()).into())
        .collect();
    columns.push(Series::new(label.into(), y.to_vec()).into());

    Ok(DataFrame::new(columns)?)
}
