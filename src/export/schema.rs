//! Feature schema shared by training and serving
//!
//! The schema records the selected feature columns in model order together
//! with what serving needs to rebuild a training-time vector from raw input:
//! category classes for encoded features and whether a feature was
//! log1p-corrected.

use crate::error::{PipelineError, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// How a feature was produced during preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Label-encoded; the code is the index into `classes`, log1p-transformed
    /// when the code column was skewed
    Categorical {
        classes: Vec<String>,
        #[serde(default)]
        log1p: bool,
    },
    /// Raw numeric, optionally log1p-transformed
    Numerical { log1p: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub name: String,
    /// Original label values; prediction `i` means `classes[i]`
    pub classes: Vec<String>,
}

/// Ordered model input contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<FeatureSpec>,
    pub label: LabelSpec,
}

impl FeatureSchema {
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Processed-table column order: features then label
    pub fn table_columns(&self) -> Vec<String> {
        self.features
            .iter()
            .map(|f| f.name.clone())
            .chain(std::iter::once(self.label.name.clone()))
            .collect()
    }

    pub fn decode_label(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.label.classes.get(i))
            .map(String::as_str)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Schema(format!("cannot read feature schema {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Validate raw values given in schema order and convert them to the
    /// vector the model was trained on
    pub fn model_vector(&self, raw: &[f64]) -> Result<Vec<f64>> {
        if raw.len() != self.features.len() {
            return Err(PipelineError::Validation(format!(
                "expected {} features, got {}",
                self.features.len(),
                raw.len()
            )));
        }

        self.features
            .iter()
            .zip(raw)
            .map(|(spec, &value)| {
                if !value.is_finite() {
                    return Err(PipelineError::Validation(format!("'{}' must be finite", spec.name)));
                }
                match &spec.kind {
                    FeatureKind::Categorical { classes, log1p } => {
                        if value.fract() != 0.0 || value < 0.0 || value as usize >= classes.len() {
                            return Err(PipelineError::Validation(format!(
                                "'{}' must be a category code in 0..{}, got {}",
                                spec.name,
                                classes.len(),
                                value
                            )));
                        }
                        Ok(if *log1p { value.ln_1p() } else { value })
                    }
                    FeatureKind::Numerical { log1p: true } => {
                        if value <= -1.0 {
                            return Err(PipelineError::Validation(format!(
                                "'{}' must be greater than -1, got {}",
                                spec.name, value
                            )));
                        }
                        Ok(value.ln_1p())
                    }
                    FeatureKind::Numerical { log1p: false } => Ok(value),
                }
            })
            .collect()
    }

    /// Check request fields against the schema names, in order, and convert
    /// them to the model vector
    pub fn vector_from_fields(&self, fields: &RequestFields) -> Result<Vec<f64>> {
        let expected = self.feature_names();
        let given: Vec<&str> = fields.names().collect();

        let mut seen = HashSet::new();
        if let Some(duplicate) = given.iter().find(|name| !seen.insert(**name)) {
            return Err(PipelineError::Validation(format!("duplicate field: {}", duplicate)));
        }

        if given != expected {
            let missing: Vec<&str> = expected.iter().copied().filter(|n| !given.contains(n)).collect();
            let unknown: Vec<&str> = given.iter().copied().filter(|n| !expected.contains(n)).collect();
            let reason = if !missing.is_empty() {
                format!("missing fields: {}", missing.join(", "))
            } else if !unknown.is_empty() {
                format!("unknown fields: {}", unknown.join(", "))
            } else {
                format!("fields out of order, expected: {}", expected.join(", "))
            };
            return Err(PipelineError::Validation(reason));
        }

        let raw = fields
            .0
            .iter()
            .map(|(name, value)| {
                value.as_f64().ok_or_else(|| {
                    PipelineError::Validation(format!("'{}' must be a number, got {}", name, value))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        self.model_vector(&raw)
    }
}

/// Members of a JSON object in document order, repeated keys included
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFields(pub Vec<(String, Value)>);

impl RequestFields {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }
}

impl From<&Map<String, Value>> for RequestFields {
    fn from(object: &Map<String, Value>) -> Self {
        RequestFields(object.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl<'de> Deserialize<'de> for RequestFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = RequestFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, Value>()? {
                    fields.push(entry);
                }
                Ok(RequestFields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FeatureSchema {
        FeatureSchema {
            features: vec![
                FeatureSpec {
                    name: "lead_time".to_string(),
                    kind: FeatureKind::Numerical { log1p: true },
                },
                FeatureSpec {
                    name: "market_segment_type".to_string(),
                    kind: FeatureKind::Categorical {
                        classes: vec!["Corporate".to_string(), "Online".to_string()],
                        log1p: false,
                    },
                },
                FeatureSpec {
                    name: "arrival_month".to_string(),
                    kind: FeatureKind::Numerical { log1p: false },
                },
            ],
            label: LabelSpec {
                name: "booking_status".to_string(),
                classes: vec!["Canceled".to_string(), "Not_Canceled".to_string()],
            },
        }
    }

    fn object(value: Value) -> RequestFields {
        RequestFields::from(value.as_object().unwrap())
    }

    #[test]
    fn test_vector_from_fields() {
        let body = object(json!({"lead_time": 9, "market_segment_type": 1, "arrival_month": 10}));
        let v = schema().vector_from_fields(&body).unwrap();
        assert!((v[0] - 10f64.ln()).abs() < 1e-12);
        assert_eq!(&v[1..], &[1.0, 10.0]);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let body = object(json!({"market_segment_type": 1, "lead_time": 9, "arrival_month": 10}));
        let err = schema().vector_from_fields(&body).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn test_missing_and_non_numeric() {
        let body = object(json!({"lead_time": 9, "market_segment_type": 1}));
        assert!(schema().vector_from_fields(&body).unwrap_err().to_string().contains("missing"));

        let body = object(json!({"lead_time": "x", "market_segment_type": 1, "arrival_month": 10}));
        assert!(matches!(schema().vector_from_fields(&body), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_repeated_key_rejected() {
        let body = r#"{"lead_time": 9, "market_segment_type": 1, "arrival_month": 10, "lead_time": 2}"#;
        let fields: RequestFields = serde_json::from_str(body).unwrap();
        assert_eq!(fields.0.len(), 4);
        let err = schema().vector_from_fields(&fields).unwrap_err();
        assert!(err.to_string().contains("duplicate field: lead_time"));
    }

    #[test]
    fn test_fields_keep_document_order() {
        let fields: RequestFields = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert!(serde_json::from_str::<RequestFields>("[1, 2]").is_err());
    }

    #[test]
    fn test_category_code_range() {
        assert!(schema().model_vector(&[1.0, 2.0, 3.0]).is_err());
        assert!(schema().model_vector(&[1.0, 0.5, 3.0]).is_err());
        assert!(schema().model_vector(&[-1.0, 0.0, 3.0]).is_err());
    }

    #[test]
    fn test_skewed_category_code_is_log_transformed() {
        let mut schema = schema();
        schema.features[1].kind = FeatureKind::Categorical {
            classes: vec!["0".to_string(), "1".to_string()],
            log1p: true,
        };
        let v = schema.model_vector(&[0.0, 1.0, 3.0]).unwrap();
        assert!((v[1] - 2f64.ln()).abs() < 1e-12);
        assert!(schema.model_vector(&[0.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(schema()).unwrap();
        assert_eq!(value["features"][0]["kind"], "numerical");
        assert_eq!(value["features"][0]["log1p"], true);
        assert_eq!(schema().decode_label(1), Some("Not_Canceled"));
        assert_eq!(schema().decode_label(2), None);
    }
}
