use core::fmt::Display;
use std::{io, path::Path};

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::{config::Config, store, util::iso_utc_now};

pub const SCHEMA_VERSION: &str = "1.1";

/// Per-item failure record carried inside an export so a long batch reports
/// isolated failures instead of aborting.
#[derive(Clone, Debug, Serialize)]
pub struct StageError {
    pub stage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub error: String,
}

impl StageError {
    #[must_use]
    pub fn new(stage: &'static str, error: impl Display) -> Self {
        Self {
            stage,
            url: None,
            error: error.to_string(),
        }
    }

    #[must_use]
    pub fn with_url(stage: &'static str, url: impl Into<String>, error: impl Display) -> Self {
        Self {
            stage,
            url: Some(url.into()),
            error: error.to_string(),
        }
    }
}

/// The export payload consumed by the importer: a fixed header plus the item
/// list under `key` and its count under `total_<key>`.
pub fn envelope<T: Serialize>(
    cfg: &Config,
    script: &'static str,
    key: &str,
    items: &[T],
    errors: &[StageError],
) -> serde_json::Result<Value> {
    let mut map = Map::new();
    map.insert("schema_version".to_owned(), json!(SCHEMA_VERSION));
    map.insert("script".to_owned(), json!(script));
    map.insert("source".to_owned(), json!(cfg.base_url));
    map.insert(
        "exported_from".to_owned(),
        json!(format!("{} (Wix)", cfg.base_url)),
    );
    map.insert("exported_at".to_owned(), json!(iso_utc_now()));
    map.insert(format!("total_{key}"), json!(items.len()));
    map.insert("total_errors".to_owned(), json!(errors.len()));
    map.insert(key.to_owned(), serde_json::to_value(items)?);
    map.insert("errors".to_owned(), serde_json::to_value(errors)?);
    Ok(Value::Object(map))
}

pub fn save_export<T: Serialize>(
    path: &Path,
    cfg: &Config,
    script: &'static str,
    key: &str,
    items: &[T],
    errors: &[StageError],
) -> io::Result<()> {
    let payload = envelope(cfg, script, key, items, errors).map_err(io::Error::from)?;
    store::save_json(path, &payload)?;
    tracing::info!(target: "export", "\x1b[36msaved {} {key} ({} errors) -> {}\x1b[0m", items.len(), errors.len(), path.display());
    Ok(())
}
