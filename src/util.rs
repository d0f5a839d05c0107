use std::sync::LazyLock;

use regex::Regex;

static ATTR_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\s*class="[^"]*""#).unwrap());
static ATTR_STYLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\s*style="[^"]*""#).unwrap());
static ATTR_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s*data-[a-z-]+="[^"]*""#).unwrap());
static EMPTY_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<span>\s*</span>").unwrap());
static EMPTY_DIV: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<div>\s*</div>").unwrap());
static BR_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\s*<br\s*/?>\s*){3,}").unwrap());

/// Strips Wix presentation noise (class/style/data-* attributes, empty
/// span/div pairs, runs of `<br>`) so the archived markup diffs cleanly.
#[must_use]
pub fn clean_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let html = ATTR_CLASS.replace_all(html, "");
    let html = ATTR_STYLE.replace_all(&html, "");
    let html = ATTR_DATA.replace_all(&html, "");
    let html = EMPTY_SPAN.replace_all(&html, "");
    let html = EMPTY_DIV.replace_all(&html, "");
    let html = BR_RUNS.replace_all(&html, "<br><br>");
    html.trim().to_owned()
}

/// Byte-bounded prefix of `s` that never splits a character.
#[must_use]
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[must_use]
pub fn iso_utc_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[must_use]
pub fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_owned()
    } else {
        format!("{base_url}{href}")
    }
}

/// Last path segment with any query string removed.
#[must_use]
pub fn slug_from_url(url: &str) -> &str {
    let tail = url.rsplit('/').next().unwrap_or(url);
    tail.split('?').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_html_strips_presentation_noise() {
        let dirty = r#"<div class="x1 y2" style="color: red" data-hook="body"><span></span><p data-test-id="t">Merhaba</p></div>"#;
        assert_eq!(clean_html(dirty), "<div><p>Merhaba</p></div>");
    }

    #[test]
    fn clean_html_collapses_br_runs() {
        assert_eq!(
            clean_html("a<br><br/>\n<br>b<br><br>c"),
            "a<br><br>b<br><br>c"
        );
        assert_eq!(clean_html(""), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        // "Hü" is three bytes; cutting at 2 would split the 'ü'
        assert_eq!(truncate("Hümeyra", 2), "H");
        assert_eq!(truncate("Hümeyra", 3), "Hü");
    }

    #[test]
    fn url_helpers() {
        assert_eq!(
            absolutize("https://example.com", "/post/abc"),
            "https://example.com/post/abc"
        );
        assert_eq!(
            absolutize("https://example.com", "https://other.com/x"),
            "https://other.com/x"
        );
        assert_eq!(slug_from_url("https://example.com/post/abc?utm=1"), "abc");
        assert_eq!(slug_from_url("https://example.com/post/abc"), "abc");
        assert_eq!(slug_from_url("https://example.com/post/abc/"), "");
    }
}
