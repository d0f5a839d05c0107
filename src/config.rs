use core::time::Duration;
use std::path::Path;

use compact_str::CompactString;
use rand::Rng;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://www.benizledim.com";

const DEFAULT_TIMEOUT_MS: i64 = 60_000;
const DEFAULT_DELAY_SECONDS: f64 = 1.5;
const DEFAULT_MAX_RETRIES: i64 = 3;

// Linear backoff step between navigation attempts.
const BACKOFF_BASE: Duration = Duration::from_millis(1500);

/// Runtime knobs, read from the environment once at startup and passed by
/// value. Out-of-range overrides are clamped rather than rejected.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub timeout: Duration,
    pub delay: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("WIX_BASE_URL")
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: Duration::from_millis(env_int(
                "SCRAPER_TIMEOUT_MS",
                DEFAULT_TIMEOUT_MS,
                10_000,
                180_000,
            ) as u64),
            delay: Duration::from_secs_f64(env_float(
                "SCRAPER_DELAY_SECONDS",
                DEFAULT_DELAY_SECONDS,
                0.2,
                30.0,
            )),
            max_retries: env_int("SCRAPER_MAX_RETRIES", DEFAULT_MAX_RETRIES, 1, 8) as u32,
            backoff_base: BACKOFF_BASE,
        }
    }

    /// Politeness pause between requests, lightly jittered so the request
    /// cadence is not perfectly regular.
    pub async fn request_delay(&self, multiplier: f64) {
        let jitter = rand::rng().random_range(0.9..1.15);
        tokio::time::sleep(self.delay.mul_f64(multiplier * jitter)).await;
    }
}

fn env_int(name: &str, default: i64, min: i64, max: i64) -> i64 {
    clamp_int(std::env::var(name).ok().as_deref(), default, min, max)
}

fn env_float(name: &str, default: f64, min: f64, max: f64) -> f64 {
    clamp_float(std::env::var(name).ok().as_deref(), default, min, max)
}

fn clamp_int(raw: Option<&str>, default: i64, min: i64, max: i64) -> i64 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

fn clamp_float(raw: Option<&str>, default: f64, min: f64, max: f64) -> f64 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

const FALLBACK_EMAIL: &str = "gurur@benizledim.com";

/// Author name -> e-mail table. Editorial staff data lives in a JSON asset
/// next to the repo (`data/author-emails.json`), not in code; unknown names
/// resolve to the fallback address.
#[derive(Debug, Deserialize)]
pub struct AuthorMap {
    #[serde(default = "default_fallback")]
    fallback: CompactString,
    #[serde(default)]
    authors: hashbrown::HashMap<CompactString, CompactString>,
}

fn default_fallback() -> CompactString {
    CompactString::const_new(FALLBACK_EMAIL)
}

impl Default for AuthorMap {
    fn default() -> Self {
        Self {
            fallback: default_fallback(),
            authors: hashbrown::HashMap::new(),
        }
    }
}

impl AuthorMap {
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let parsed = std::fs::read(path)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(Into::into));
        match parsed {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(target: "config", "author map {} unusable ({e}), using fallback only", path.display());
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn email_for(&self, name: &str) -> &str {
        let name = name.trim();
        if name.is_empty() {
            return &self.fallback;
        }
        self.authors.get(name).unwrap_or(&self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_int_table() {
        // unset / blank / garbage fall back to the default
        assert_eq!(clamp_int(None, 3, 1, 8), 3);
        assert_eq!(clamp_int(Some(""), 3, 1, 8), 3);
        assert_eq!(clamp_int(Some("   "), 3, 1, 8), 3);
        assert_eq!(clamp_int(Some("many"), 3, 1, 8), 3);
        // in-range values pass through, out-of-range values clamp
        assert_eq!(clamp_int(Some("5"), 3, 1, 8), 5);
        assert_eq!(clamp_int(Some(" 5 "), 3, 1, 8), 5);
        assert_eq!(clamp_int(Some("0"), 3, 1, 8), 1);
        assert_eq!(clamp_int(Some("99"), 3, 1, 8), 8);
    }

    #[test]
    fn clamp_float_table() {
        assert_eq!(clamp_float(None, 1.5, 0.2, 30.0), 1.5);
        assert_eq!(clamp_float(Some(""), 1.5, 0.2, 30.0), 1.5);
        assert_eq!(clamp_float(Some("x"), 1.5, 0.2, 30.0), 1.5);
        assert_eq!(clamp_float(Some("nan"), 1.5, 0.2, 30.0), 1.5);
        assert_eq!(clamp_float(Some("2.5"), 1.5, 0.2, 30.0), 2.5);
        assert_eq!(clamp_float(Some("0.01"), 1.5, 0.2, 30.0), 0.2);
        assert_eq!(clamp_float(Some("1000"), 1.5, 0.2, 30.0), 30.0);
    }

    #[test]
    fn author_map_lookup() {
        let map: AuthorMap = serde_json::from_str(
            r#"{"fallback":"desk@example.com","authors":{"İris Eryılmaz":"iris@example.com"}}"#,
        )
        .unwrap();
        assert_eq!(map.email_for("İris Eryılmaz"), "iris@example.com");
        assert_eq!(map.email_for("  İris Eryılmaz  "), "iris@example.com");
        assert_eq!(map.email_for("Nobody"), "desk@example.com");
        assert_eq!(map.email_for(""), "desk@example.com");
    }

    #[test]
    fn author_map_missing_file() {
        let map = AuthorMap::load(Path::new("/nonexistent/authors.json"));
        assert_eq!(map.email_for("Anyone"), FALLBACK_EMAIL);
    }
}
