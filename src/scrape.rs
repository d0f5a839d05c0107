use core::time::Duration;
use std::{ffi::OsStr, sync::Arc};

use headless_chrome::{Browser, LaunchOptions, Tab};
use tokio::task::spawn_blocking;

use crate::{config::Config, util::truncate};

// CDP over this transport has no network-idle lifecycle event; after the
// load event we let in-flight requests settle for a fixed quiet period.
const NETWORK_SETTLE: Duration = Duration::from_millis(750);

const ERR_LOG_LIMIT: usize = 160;

pub fn launch(headless: bool) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--lang=tr-TR"),
        ],
        headless,
        ..LaunchOptions::default()
    })
}

#[allow(clippy::significant_drop_tightening)]
pub fn first_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    let tab = browser.new_tab()?;

    {
        let tabs_guard = browser
            .get_tabs()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for remain in &*tabs_guard {
            if !Arc::ptr_eq(&tab, remain) {
                remain.close(true)?;
            }
        }
    }

    Ok(tab)
}

/// What "the page is ready" means for one navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    ContentLoaded,
    NetworkIdle,
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl From<&Config> for RetryPolicy {
    fn from(cfg: &Config) -> Self {
        Self {
            max_attempts: cfg.max_retries,
            backoff_base: cfg.backoff_base,
        }
    }
}

/// Terminal navigation failure: every attempt was spent. Carries the attempt
/// count and the last underlying error so the caller can decide to record it
/// and move on, or abort.
#[derive(Debug, thiserror::Error)]
#[error("failed to load {url} after {attempts} attempt(s)")]
pub struct NavigationError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: anyhow::Error,
}

/// Runs `attempt` up to `policy.max_attempts` times, sleeping
/// `backoff_base * attempt_number` between failures (linear backoff, no sleep
/// after the last one). Success returns immediately.
pub async fn goto_with_retries<F, Fut>(
    url: &str,
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<(), NavigationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let max = policy.max_attempts.max(1);
    let mut last = None;

    for n in 1..=max {
        match attempt().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                let msg = format!("{e:#}");
                tracing::warn!(target: "goto", "[{n}/{max}] {url}: {}", truncate(&msg, ERR_LOG_LIMIT));
                last = Some(e);
                if n < max {
                    tokio::time::sleep(policy.backoff_base * n).await;
                }
            }
        }
    }

    Err(NavigationError {
        url: url.to_owned(),
        attempts: max,
        source: last.unwrap_or_else(|| anyhow::anyhow!("no attempt was made")),
    })
}

/// Navigate the tab to `url`, tolerating transient failures.
pub async fn safe_goto(
    tab: &Arc<Tab>,
    url: &str,
    readiness: Readiness,
    cfg: &Config,
) -> Result<(), NavigationError> {
    let timeout = cfg.timeout;
    goto_with_retries(url, &RetryPolicy::from(cfg), || {
        goto_once(Arc::clone(tab), url.to_owned(), readiness, timeout)
    })
    .await
}

async fn goto_once(
    tab: Arc<Tab>,
    url: String,
    readiness: Readiness,
    timeout: Duration,
) -> anyhow::Result<()> {
    spawn_blocking(move || {
        tab.set_default_timeout(timeout)
            .navigate_to(&url)?
            .wait_until_navigated()?;
        if readiness == Readiness::NetworkIdle {
            std::thread::sleep(NETWORK_SETTLE);
        }
        Ok(())
    })
    .await?
}

pub async fn page_content(tab: &Arc<Tab>) -> anyhow::Result<String> {
    let tab = Arc::clone(tab);
    spawn_blocking(move || tab.get_content()).await?
}

pub async fn evaluate(tab: &Arc<Tab>, expression: &'static str) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);
    spawn_blocking(move || tab.evaluate(expression, false).map(|_| ())).await?
}

/// Click the first element matching `selector` if there is one. Used for
/// optional UI toggles (locale switch); absence is not an error.
pub async fn try_click(tab: &Arc<Tab>, selector: &'static str) -> bool {
    let tab = Arc::clone(tab);
    spawn_blocking(move || {
        tab.find_element(selector)
            .and_then(|el| el.click().map(|_| ()))
            .is_ok()
    })
    .await
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};
    use tokio::time::Instant;

    const fn policy(max_attempts: u32, backoff_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_secs(backoff_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_last_attempt_with_linear_backoff() {
        let calls = Rc::new(Cell::new(0u32));
        let start = Instant::now();

        let result = goto_with_retries("https://example.com/a", &policy(3, 1), || {
            let calls = Rc::clone(&calls);
            async move {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    anyhow::bail!("timed out");
                }
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.get(), 3);
        // sleeps of 1s and 2s, none after the succeeding attempt
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_attempts_and_skips_final_sleep() {
        let calls = Rc::new(Cell::new(0u32));
        let start = Instant::now();

        let err = goto_with_retries("https://example.com/b", &policy(2, 1), || {
            let calls = Rc::clone(&calls);
            async move {
                calls.set(calls.get() + 1);
                anyhow::bail!("boom {}", calls.get())
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.get(), 2);
        assert_eq!(err.attempts, 2);
        assert_eq!(err.url, "https://example.com/b");
        // last underlying error is preserved
        assert_eq!(err.source.to_string(), "boom 2");
        // only the single inter-attempt sleep, no backoff after giving up
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let start = Instant::now();

        let err = goto_with_retries("https://example.com/c", &policy(1, 5), || async {
            anyhow::bail!("nope")
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_is_a_single_attempt() {
        let calls = Rc::new(Cell::new(0u32));
        let start = Instant::now();

        goto_with_retries("https://example.com/d", &policy(8, 1), || {
            let calls = Rc::clone(&calls);
            async move {
                calls.set(calls.get() + 1);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
