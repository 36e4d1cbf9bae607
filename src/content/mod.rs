//! The content pipeline: classification, URI mapping, sidecars, page
//! expansion and rendering.

pub mod classify;
pub mod content_map;
pub mod frontmatter;
pub mod page;
pub mod render;
pub mod sidecar;
pub mod uri;
pub mod walk;

/// Convert TOML to JSON for templates; datetimes become strings.
pub(crate) fn toml_to_json(value: toml::Value) -> serde_json::Value {
    use serde_json::Value as Json;
    use toml::Value as Toml;

    match value {
        Toml::String(s) => Json::String(s),
        Toml::Integer(i) => Json::from(i),
        Toml::Float(f) => serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number),
        Toml::Boolean(b) => Json::Bool(b),
        Toml::Datetime(dt) => Json::String(dt.to_string()),
        Toml::Array(items) => Json::Array(items.into_iter().map(toml_to_json).collect()),
        Toml::Table(table) => Json::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}
