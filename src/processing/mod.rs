//! Data processing
//!
//! Turns the raw train/test partitions into balanced, feature-reduced tables:
//! - identifier columns dropped, duplicate rows removed
//! - categorical columns and the label label-encoded with a map fit on train
//! - skewed feature columns (category codes included) log1p-corrected
//! - classes balanced with SMOTE
//! - top-N features kept by random forest importance

pub mod encoder;
pub mod feature_selection;
pub mod frame;
pub mod skew;
pub mod smote;

pub use encoder::{ColumnEncoding, LabelEncodingMap};
pub use feature_selection::FeatureSelector;
pub use smote::{class_counts, ResampleResult, Sampler, SMOTE};

use crate::config::{ArtifactPaths, DataProcessingConfig};
use crate::error::{PipelineError, Result};
use crate::export::{FeatureKind, FeatureSchema, FeatureSpec, LabelSpec};
use frame::{column_names, columns_to_array2, f64_values, frame_from_arrays, read_csv, string_values, write_csv};
use ndarray::Array1;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Drop identifiers and unconfigured columns, order the rest, remove duplicates
fn clean(config: &DataProcessingConfig, df: &DataFrame) -> Result<DataFrame> {
    let present = column_names(df);
    let model_columns = config.model_columns();

    for id in &config.identifier_columns {
        if !present.contains(id) {
            return Err(PipelineError::Schema(format!("identifier column '{}' not found", id)));
        }
    }
    let missing: Vec<&str> = model_columns
        .iter()
        .filter(|c| !present.contains(*c))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Schema(format!("missing columns: {}", missing.join(", "))));
    }

    let extra: Vec<&str> = present
        .iter()
        .filter(|c| !model_columns.contains(*c) && !config.identifier_columns.contains(*c))
        .map(String::as_str)
        .collect();
    if !extra.is_empty() {
        warn!(columns = ?extra, "Dropping unconfigured columns");
    }

    let selected = df.select(model_columns.iter().map(String::as_str))?;
    let rows_before = selected.height();
    let deduped = selected
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;

    info!(
        rows = deduped.height(),
        duplicates_dropped = rows_before - deduped.height(),
        "Cleaned table"
    );
    Ok(deduped)
}

/// Configured model columns other than the label, in table order
fn feature_names(config: &DataProcessingConfig) -> Vec<String> {
    config
        .model_columns()
        .into_iter()
        .filter(|c| *c != config.label_column)
        .collect()
}

/// Replace every encoded column with its integer codes
fn encode_columns(encoding: &LabelEncodingMap, mut df: DataFrame) -> Result<DataFrame> {
    for (column, _) in encoding.columns() {
        let values = string_values(&df, column)?;
        let codes = encoding.encode_column(column, values.iter().map(String::as_str))?;
        df.with_column(Series::new(column.as_str().into(), codes))?;
    }
    Ok(df)
}

/// Fits the preprocessing state on the training partition
#[derive(Debug, Clone)]
pub struct Preprocessor<'a> {
    config: &'a DataProcessingConfig,
}

impl<'a> Preprocessor<'a> {
    pub fn new(config: &'a DataProcessingConfig) -> Self {
        Self { config }
    }

    /// Learn label encodings and the skewed-column set from `train`
    pub fn fit(&self, train: &DataFrame) -> Result<FittedPreprocessor> {
        let cleaned = clean(self.config, train)?;

        let mut encoding = LabelEncodingMap::new();
        for column in self.config.encoded_columns() {
            let values = string_values(&cleaned, &column)?;
            let column_encoding = ColumnEncoding::fit(values.iter().map(String::as_str));
            info!(column = %column, classes = ?column_encoding.classes, "Label encoding fitted");
            encoding.insert(column, column_encoding);
        }

        let label = &self.config.label_column;
        let n_label_classes = encoding.get(label).map_or(0, ColumnEncoding::len);
        if n_label_classes != 2 {
            return Err(PipelineError::Validation(format!(
                "label column '{}' must have exactly 2 classes, found {}",
                label, n_label_classes
            )));
        }

        // measured on the encoded table, so category codes count as columns too
        let encoded = encode_columns(&encoding, cleaned)?;
        let mut skewness = BTreeMap::new();
        let mut skewed_columns = Vec::new();
        for column in feature_names(self.config) {
            let s = skew::skewness(&f64_values(&encoded, &column)?);
            if s > self.config.skewness_threshold {
                skewed_columns.push(column.clone());
            }
            skewness.insert(column, s);
        }
        info!(
            threshold = self.config.skewness_threshold,
            skewed = ?skewed_columns,
            "Skewness computed"
        );

        Ok(FittedPreprocessor {
            config: self.config.clone(),
            encoding,
            skewed_columns,
            skewness,
        })
    }
}

/// Immutable preprocessing state fit on train and reused for every partition
#[derive(Debug, Clone)]
pub struct FittedPreprocessor {
    config: DataProcessingConfig,
    encoding: LabelEncodingMap,
    skewed_columns: Vec<String>,
    skewness: BTreeMap<String, f64>,
}

impl FittedPreprocessor {
    pub fn encoding(&self) -> &LabelEncodingMap {
        &self.encoding
    }

    pub fn skewed_columns(&self) -> &[String] {
        &self.skewed_columns
    }

    /// Skewness measured on the training partition per feature column
    pub fn skewness(&self) -> &BTreeMap<String, f64> {
        &self.skewness
    }

    /// Clean, encode and skew-correct a partition
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = encode_columns(&self.encoding, clean(&self.config, df)?)?;

        for column in feature_names(&self.config) {
            let skewed = self.skewed_columns.contains(&column);
            if !skewed && self.encoding.get(&column).is_some() {
                continue;
            }
            let mut values = f64_values(&out, &column)?;
            if skewed {
                skew::log1p_in_place(&column, &mut values)?;
            }
            out.with_column(Series::new(column.as_str().into(), values))?;
        }

        Ok(out)
    }

    /// Schema for the selected features, in selection order
    pub fn schema_for(&self, selected: &[String]) -> Result<FeatureSchema> {
        let features = selected
            .iter()
            .map(|name| {
                let kind = match self.encoding.get(name) {
                    Some(enc) => FeatureKind::Categorical {
                        classes: enc.classes.clone(),
                        log1p: self.skewed_columns.contains(name),
                    },
                    None if self.config.numerical_columns.contains(name) => FeatureKind::Numerical {
                        log1p: self.skewed_columns.contains(name),
                    },
                    None => {
                        return Err(PipelineError::Schema(format!(
                            "selected feature '{}' is not a configured column",
                            name
                        )))
                    }
                };
                Ok(FeatureSpec {
                    name: name.clone(),
                    kind,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let label = &self.config.label_column;
        let classes = self
            .encoding
            .get(label)
            .map(|e| e.classes.clone())
            .ok_or_else(|| PipelineError::Schema(format!("no encoding for label '{}'", label)))?;

        Ok(FeatureSchema {
            features,
            label: LabelSpec {
                name: label.clone(),
                classes,
            },
        })
    }
}

fn feature_columns(df: &DataFrame, label: &str) -> Vec<String> {
    column_names(df).into_iter().filter(|c| c != label).collect()
}

fn labels(df: &DataFrame, label: &str) -> Result<Array1<i64>> {
    Ok(f64_values(df, label)?.into_iter().map(|v| v.round() as i64).collect())
}

/// Oversample minority classes until every class matches the majority
pub fn balance(df: &DataFrame, config: &DataProcessingConfig) -> Result<DataFrame> {
    let label = &config.label_column;
    let features = feature_columns(df, label);
    let x = columns_to_array2(df, &features)?;
    let y = labels(df, label)?;

    let mut smote = SMOTE::new()
        .with_k_neighbors(config.smote_k_neighbors)
        .with_seed(config.random_state);
    let result = smote.fit_resample(&x, &y)?;

    info!(
        before = ?class_counts(&y),
        after = ?class_counts(&result.y),
        rows = result.y.len(),
        "Classes balanced"
    );
    frame_from_arrays(&result.x, &features, &result.y, label)
}

/// Rank features on the balanced train table and keep the top N plus the label
pub fn select_features(train: &DataFrame, config: &DataProcessingConfig) -> Result<(DataFrame, Vec<String>)> {
    let label = &config.label_column;
    let features = feature_columns(train, label);
    let x = columns_to_array2(train, &features)?;
    let y = f64_values(train, label)?;

    let mut selector = FeatureSelector::new(config.top_n_feature)
        .with_n_estimators(config.selector_estimators)
        .with_random_state(config.random_state)
        .with_feature_names(features);
    selector.fit(&x, &Array1::from_vec(y))?;

    let selected = selector.selected_names().ok_or(PipelineError::ModelNotFitted)?;
    info!(selected = ?selected, "Features selected");

    let reduced = apply_selection(train, &selected, label)?;
    Ok((reduced, selected))
}

/// Reduce a table to the selected features, in order, followed by the label
pub fn apply_selection(df: &DataFrame, selected: &[String], label: &str) -> Result<DataFrame> {
    let present = column_names(df);
    let columns: Vec<&str> = selected
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(label))
        .collect();
    if let Some(missing) = columns.iter().find(|c| !present.iter().any(|p| p == **c)) {
        return Err(PipelineError::Schema(format!("selected column '{}' not found", missing)));
    }
    Ok(df.select(columns)?)
}

/// Summary of one processing run
#[derive(Debug, Clone)]
pub struct ProcessingSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub selected_features: Vec<String>,
    pub skewed_columns: Vec<String>,
}

/// Reads the raw split, writes processed tables and the feature schema
pub struct DataProcessor {
    config: DataProcessingConfig,
    paths: ArtifactPaths,
}

impl DataProcessor {
    pub fn new(config: DataProcessingConfig, paths: ArtifactPaths) -> Self {
        Self { config, paths }
    }

    pub fn process(&self) -> Result<ProcessingSummary> {
        let start = Instant::now();
        let wrap = |stage: &'static str| move |e: PipelineError| PipelineError::processing(stage, e);

        let train_raw = read_csv(&self.paths.train_file()).map_err(wrap("load"))?;
        let test_raw = read_csv(&self.paths.test_file()).map_err(wrap("load"))?;
        info!(train_rows = train_raw.height(), test_rows = test_raw.height(), "Raw partitions loaded");

        let (fitted, train, test) = (|| -> Result<_> {
            let fitted = Preprocessor::new(&self.config).fit(&train_raw)?;
            let train = fitted.apply(&train_raw)?;
            let test = fitted.apply(&test_raw)?;
            Ok((fitted, train, test))
        })()
        .map_err(wrap("preprocess"))?;

        let train = balance(&train, &self.config).map_err(wrap("balance"))?;
        let test = if self.config.balance_test {
            balance(&test, &self.config).map_err(wrap("balance"))?
        } else {
            test
        };

        let (mut train, selected) = select_features(&train, &self.config).map_err(wrap("feature_selection"))?;
        let mut test = apply_selection(&test, &selected, &self.config.label_column).map_err(wrap("feature_selection"))?;
        let schema = fitted.schema_for(&selected).map_err(wrap("feature_selection"))?;

        (|| -> Result<()> {
            write_csv(&mut train, &self.paths.processed_train_file())?;
            write_csv(&mut test, &self.paths.processed_test_file())?;
            schema.save(&self.paths.feature_schema_file())
        })()
        .map_err(wrap("save"))?;

        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Data processing completed"
        );

        Ok(ProcessingSummary {
            train_rows: train.height(),
            test_rows: test.height(),
            selected_features: selected,
            skewed_columns: fitted.skewed_columns().to_vec(),
        })
    }
}
