//! Request handlers

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::export::{FeatureKind, FeatureSchema, RequestFields};
use axum::{body::Bytes, extract::State, response::Html, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Inference
// ============================================================================

/// Body must be a JSON object with exactly the schema's fields, in order
pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let fields: RequestFields = serde_json::from_slice(&body).map_err(|e| {
        if e.is_data() {
            ServerError::BadRequest("body must be a JSON object".to_string())
        } else {
            ServerError::BadRequest(format!("body is not valid JSON: {}", e))
        }
    })?;

    let output = state.artifact.predict_fields(&fields)?;
    let label = state.artifact.schema.decode_label(output).unwrap_or_default();
    debug!(output, label = %label, "Prediction served");

    Ok(Json(json!({
        "output": output,
        "label": label,
    })))
}

pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<FeatureSchema> {
    Json(state.artifact.schema.clone())
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_created_at": state.artifact.metadata.created_at.to_rfc3339(),
        "n_features": state.artifact.schema.n_features(),
        "uptime_secs": uptime.num_seconds(),
    }))
}

// ============================================================================
// UI Handler
// ============================================================================

pub async fn serve_index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_form(&state.artifact.schema))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Prediction form with one input per feature in schema order
pub fn render_form(schema: &FeatureSchema) -> String {
    let mut lines = Vec::new();
    for spec in &schema.features {
        let name = escape_html(&spec.name);
        lines.push(format!(r#"      <label for="{name}">{name}</label>"#));
        match &spec.kind {
            FeatureKind::Categorical { classes, .. } => {
                lines.push(format!(r#"      <select id="{name}" name="{name}">"#));
                lines.extend(classes.iter().enumerate().map(|(code, class)| {
                    format!(r#"        <option value="{code}">{}</option>"#, escape_html(class))
                }));
                lines.push("      </select>".to_string());
            }
            FeatureKind::Numerical { .. } => {
                lines.push(format!(
                    r#"      <input id="{name}" name="{name}" type="number" step="any" value="0" required>"#
                ));
            }
        }
    }
    let fields: String = lines.iter().map(|line| format!("{}\n", line)).collect();

    let order: Vec<String> = schema.features.iter().map(|f| json!(f.name).to_string()).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Hotel Reservation Prediction</title>
  <style>
    body {{ font-family: sans-serif; max-width: 36rem; margin: 2rem auto; }}
    form {{ display: grid; grid-template-columns: 1fr 1fr; gap: 0.5rem 1rem; }}
    button {{ grid-column: span 2; padding: 0.5rem; }}
    #result {{ margin-top: 1rem; font-weight: bold; }}
  </style>
</head>
<body>
  <h1>Hotel Reservation Prediction</h1>
  <form id="prediction-form">
{fields}      <button type="submit">Predict</button>
  </form>
  <div id="result"></div>
  <script>
    const order = [{order}];
    document.getElementById("prediction-form").addEventListener("submit", async (event) => {{
      event.preventDefault();
      const body = {{}};
      for (const name of order) {{
        body[name] = Number(document.getElementById(name).value);
      }}
      const result = document.getElementById("result");
      const response = await fetch("/predict", {{
        method: "POST",
        headers: {{ "Content-Type": "application/json" }},
        body: JSON.stringify(body),
      }});
      const payload = await response.json();
      result.textContent = response.ok
        ? `{label}: ${{payload.label}} (output ${{payload.output}})`
        : `Error: ${{payload.message}}`;
    }});
  </script>
</body>
</html>
"#,
        fields = fields,
        order = order.join(", "),
        label = escape_html(&schema.label.name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{FeatureSpec, LabelSpec};

    #[test]
    fn test_render_form_follows_schema() {
        let schema = FeatureSchema {
            features: vec![
                FeatureSpec {
                    name: "lead_time".to_string(),
                    kind: FeatureKind::Numerical { log1p: true },
                },
                FeatureSpec {
                    name: "room_type_reserved".to_string(),
                    kind: FeatureKind::Categorical {
                        classes: vec!["Room_Type 1".to_string(), "Room <2>".to_string()],
                        log1p: false,
                    },
                },
            ],
            label: LabelSpec {
                name: "booking_status".to_string(),
                classes: vec!["Canceled".to_string(), "Not_Canceled".to_string()],
            },
        };

        let html = render_form(&schema);
        assert!(html.contains(r#"<input id="lead_time""#));
        assert!(html.contains(r#"<option value="0">Room_Type 1</option>"#));
        assert!(html.contains(r#"<option value="1">Room &lt;2&gt;</option>"#));
        assert!(html.contains(r#"const order = ["lead_time", "room_type_reserved"];"#));
        assert!(html.find("lead_time").unwrap() < html.find("room_type_reserved").unwrap());
    }
}
