// src/exec/output.rs

//! Rich outputs attached to a cell after execution.

use serde::Serialize;
use serde_json::{Map, Number, Value as Json};

use crate::script::{Table, Value};

/// One rendered result of a cell. Serialized with a `kind` tag so front
/// ends can switch on it without knowing about the runtime's value types.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Output {
    Text {
        text: String,
    },
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<Json>>,
        /// Set when rows were dropped to respect the row cap.
        truncated: bool,
    },
    Image {
        mime: String,
        data: String,
    },
    Html {
        html: String,
    },
    Chart {
        spec: Json,
    },
}

impl Output {
    pub fn text(text: impl Into<String>) -> Self {
        Output::Text { text: text.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Output::Text { .. } => "text",
            Output::Table { .. } => "table",
            Output::Image { .. } => "image",
            Output::Html { .. } => "html",
            Output::Chart { .. } => "chart",
        }
    }

    fn from_table(table: &Table) -> Self {
        Output::Table {
            columns: table.columns.clone(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(to_json).collect())
                .collect(),
            truncated: false,
        }
    }
}

/// Turn the trailing value of a code cell into an output.
///
/// Checked in order: table (explicit or a non-empty list of dicts), image,
/// html, chart (a dict carrying `$schema` or `mark`), then the value's repr
/// as text. `None` produces nothing.
pub fn classify(value: &Value) -> Option<Output> {
    if let Some(table) = as_table(value) {
        return Some(table);
    }
    match value {
        Value::None => None,
        Value::Image { mime, data } => Some(Output::Image {
            mime: mime.clone(),
            data: data.clone(),
        }),
        Value::Html(html) => Some(Output::Html { html: html.clone() }),
        Value::Dict(map) if map.contains_key("$schema") || map.contains_key("mark") => {
            Some(Output::Chart {
                spec: to_json(value),
            })
        }
        other => Some(Output::text(other.repr())),
    }
}

fn as_table(value: &Value) -> Option<Output> {
    match value {
        Value::Table(t) => Some(Output::from_table(t)),
        Value::List(items)
            if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Dict(_))) =>
        {
            Table::from_records(items).map(|t| Output::from_table(&t))
        }
        _ => None,
    }
}

/// JSON view of a runtime value. Values with no JSON shape (functions)
/// fall back to their repr.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::None => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::Str(s) | Value::Html(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Dict(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<Map<String, Json>>(),
        ),
        Value::Table(t) => Json::Array(
            t.rows
                .iter()
                .map(|row| {
                    Json::Object(
                        t.columns
                            .iter()
                            .cloned()
                            .zip(row.iter().map(to_json))
                            .collect(),
                    )
                })
                .collect(),
        ),
        Value::Image { mime, data } => {
            serde_json::json!({ "mime": mime, "data": data })
        }
        Value::Function(_) | Value::Builtin(_) => Json::String(value.repr()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;

    fn dict(pairs: &[(&str, Value)]) -> Value {
        Value::Dict(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<IndexMap<_, _>>(),
        )
    }

    #[test]
    fn none_has_no_output() {
        assert_eq!(classify(&Value::None), None);
    }

    #[test]
    fn list_of_dicts_is_a_table() {
        let v = Value::List(vec![
            dict(&[("a", Value::Int(1))]),
            dict(&[("a", Value::Int(2)), ("b", Value::Str("x".into()))]),
        ]);
        assert_eq!(
            classify(&v),
            Some(Output::Table {
                columns: vec!["a".into(), "b".into()],
                rows: vec![vec![json!(1), Json::Null], vec![json!(2), json!("x")]],
                truncated: false,
            })
        );
    }

    #[test]
    fn explicit_table_wins() {
        let t = Table {
            columns: vec!["n".into()],
            rows: vec![vec![Value::Int(1)]],
        };
        assert_eq!(classify(&Value::Table(Arc::new(t))).map(|o| o.kind()), Some("table"));
    }

    #[test]
    fn chart_requires_a_marker_key() {
        let chart = dict(&[("mark", Value::Str("bar".into()))]);
        assert_eq!(classify(&chart).map(|o| o.kind()), Some("chart"));

        let plain = dict(&[("other", Value::Int(1))]);
        assert_eq!(classify(&plain), Some(Output::text("{'other': 1}")));
    }

    #[test]
    fn html_and_image_are_recognised() {
        assert_eq!(
            classify(&Value::Html("<b>hi</b>".into())),
            Some(Output::Html {
                html: "<b>hi</b>".into()
            })
        );
        let img = Value::Image {
            mime: "image/png".into(),
            data: "AAAA".into(),
        };
        assert_eq!(classify(&img).map(|o| o.kind()), Some("image"));
    }

    #[test]
    fn scalars_fall_back_to_repr() {
        assert_eq!(classify(&Value::Str("hi".into())), Some(Output::text("'hi'")));
        assert_eq!(classify(&Value::Float(2.5)), Some(Output::text("2.5")));
    }

    #[test]
    fn serialized_with_kind_tag() {
        let json = serde_json::to_value(Output::text("1")).unwrap();
        assert_eq!(json, json!({"kind": "text", "text": "1"}));
    }
}
