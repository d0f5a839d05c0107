use std::{
    fs, io,
    path::{Path, PathBuf},
};

use compact_str::CompactString;
use hashbrown::HashMap;
use serde::Serialize;

/// Serializes `value` and atomically replaces `path` with it, creating parent
/// directories as needed. The temp file lives next to the destination so the
/// final rename stays on one volume; a reader of `path` sees either the prior
/// value or the new one, never a torn write. Non-ASCII text is written raw.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::from)?;

    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Key -> result map re-persisted after every entry, so an interrupted run
/// loses at most the item in flight. A missing or unparsable file starts the
/// map over from empty.
pub struct ProgressMap {
    path: PathBuf,
    entries: HashMap<CompactString, CompactString>,
}

impl ProgressMap {
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(target: "progress", "{} unreadable ({e}), starting fresh", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { path, entries }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(CompactString::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(
        &mut self,
        key: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) -> io::Result<()> {
        self.entries.insert(key.into(), value.into());
        save_json(&self.path, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refused"))
        }
    }

    fn read_value(path: &Path) -> Value {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn create_then_replace_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        save_json(&path, &json!({"a": 1})).unwrap();
        assert_eq!(read_value(&path), json!({"a": 1}));

        save_json(&path, &json!({"a": 2})).unwrap();
        assert_eq!(read_value(&path), json!({"a": 2}));

        // no temp file survives a successful write
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn repeated_write_is_byte_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let value = json!({"k": ["v", 1, null]});

        save_json(&path, &value).unwrap();
        let first = fs::read(&path).unwrap();
        save_json(&path, &value).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn non_ascii_round_trip_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let value = json!({
            "başlık": "Hümeyra & İris — yazı",
            "nested": {"etiketler": ["dizi", "film"], "sayı": 42, "yok": null}
        });

        save_json(&path, &value).unwrap();
        assert_eq!(read_value(&path), value);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Hümeyra"));
        assert!(!text.contains("\\u"));
    }

    #[test]
    fn failed_serialization_leaves_destination_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        save_json(&path, &json!({"kept": true})).unwrap();
        let before = fs::read(&path).unwrap();

        assert!(save_json(&path, &Unserializable).is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/nested/out.json");

        save_json(&path, &json!([1, 2, 3])).unwrap();
        assert_eq!(read_value(&path), json!([1, 2, 3]));
    }

    #[test]
    fn progress_map_persists_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authors.json");

        let mut map = ProgressMap::load(&path);
        assert!(map.is_empty());

        map.record("u1", "r1").unwrap();
        // interrupted here: only the first entry is on disk
        assert_eq!(read_value(&path), json!({"u1": "r1"}));

        map.record("u2", "r2").unwrap();
        assert_eq!(read_value(&path), json!({"u1": "r1", "u2": "r2"}));

        let reloaded = ProgressMap::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("u1"));
        assert_eq!(reloaded.get("u2"), Some("r2"));
    }

    #[test]
    fn unparsable_progress_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authors.json");
        fs::write(&path, b"{ not json").unwrap();

        let map = ProgressMap::load(&path);
        assert!(map.is_empty());
    }
}
