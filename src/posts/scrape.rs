use std::{collections::BTreeSet, sync::Arc};

use compact_str::CompactString;
use headless_chrome::Tab;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use wscr::{
    config::{AuthorMap, Config},
    scrape::{Readiness, evaluate, page_content, safe_goto, try_click},
    util::{absolutize, clean_html},
};

// Wix renders these as pseudo-categories on every page; they are navigation,
// not taxonomy.
const NAV_LABELS: [&str; 4] = ["Blog Yazıları", "Blog Posts", "Home", "Ana Sayfa"];

const MAX_STALE_ROUNDS: u32 = 5;
const EXCERPT_CHARS: usize = 200;

pub struct Context {
    pub tab: Arc<Tab>,
    pub cfg: Config,
    pub authors: AuthorMap,
    pub sel: Selectors,
}

impl Context {
    pub fn new(tab: Arc<Tab>, cfg: Config, authors: AuthorMap) -> Self {
        Self {
            tab,
            cfg,
            authors,
            sel: Selectors::new(),
        }
    }
}

pub struct Selectors {
    post_link: Selector,
    h1: Selector,
    og_title: Selector,
    og_description: Selector,
    og_image: Selector,
    content: Vec<Selector>,
    article: Selector,
    author: Vec<Selector>,
    published: Vec<Selector>,
    category_link: Selector,
    tag_link: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            post_link: Selector::parse(r#"a[href*="/post/"]"#).unwrap(),
            h1: Selector::parse("h1").unwrap(),
            og_title: Selector::parse(r#"meta[property="og:title"]"#).unwrap(),
            og_description: Selector::parse(r#"meta[property="og:description"]"#).unwrap(),
            og_image: Selector::parse(r#"meta[property="og:image"]"#).unwrap(),
            content: vec![
                Selector::parse(r#"[data-hook="post-description__block"]"#).unwrap(),
                Selector::parse(r#"div[data-hook="post-body"]"#).unwrap(),
                Selector::parse(".post-content__body").unwrap(),
                Selector::parse(r#"div[class*="rich-content"]"#).unwrap(),
            ],
            article: Selector::parse("article").unwrap(),
            author: vec![
                Selector::parse(r#"a[href*="/profile/"]"#).unwrap(),
                Selector::parse(r#"[data-hook*="author"]"#).unwrap(),
            ],
            published: vec![
                Selector::parse("time[datetime]").unwrap(),
                Selector::parse(r#"meta[property="article:published_time"]"#).unwrap(),
            ],
            category_link: Selector::parse(r#"a[href*="/categories/"]"#).unwrap(),
            tag_link: Selector::parse(r#"a[href*="/tags/"]"#).unwrap(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Post {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image: String,
    pub author_email: CompactString,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub published_at: String,
    pub view_count: i64,
    pub source_url: String,
}

/// Stage 1: open the blog index in the Turkish locale and keep scrolling until
/// the infinite list stops growing, then collect every unique post URL.
pub async fn collect_post_urls(ctx: &Context) -> anyhow::Result<Vec<String>> {
    let blog_url = format!("{}/blog", ctx.cfg.base_url);
    safe_goto(&ctx.tab, &blog_url, Readiness::ContentLoaded, &ctx.cfg).await?;
    ctx.cfg.request_delay(2.0).await;

    // the site sometimes lands on the English localization first
    if try_click(&ctx.tab, r#"a[lang="tr"]"#).await {
        ctx.cfg.request_delay(2.0).await;
    }

    tracing::info!(target: "posts", "scrolling the post list ...");
    let mut previous = 0;
    let mut stale = 0;
    while stale < MAX_STALE_ROUNDS {
        evaluate(&ctx.tab, "window.scrollTo(0, document.body.scrollHeight)").await?;
        ctx.cfg.request_delay(1.0).await;

        let html = page_content(&ctx.tab).await?;
        let count = Html::parse_document(&html)
            .select(&ctx.sel.post_link)
            .count();
        if count == previous {
            stale += 1;
        } else {
            stale = 0;
            previous = count;
            tracing::info!(target: "posts", "{count} post links so far");
        }
    }

    let html = page_content(&ctx.tab).await?;
    let doc = Html::parse_document(&html);
    let mut urls = post_urls_in(&doc, &ctx.sel, &ctx.cfg.base_url)
        .into_iter()
        .collect::<Vec<_>>();
    urls.sort_unstable();
    Ok(urls)
}

fn post_urls_in(doc: &Html, sel: &Selectors, base_url: &str) -> hashbrown::HashSet<String> {
    let mut seen = hashbrown::HashSet::new();
    for link in doc.select(&sel.post_link) {
        let Some(href) = link.attr("href") else {
            continue;
        };
        if !href.contains("/post/") {
            continue;
        }
        let href = absolutize(base_url, href);
        let href = match href.split_once('?') {
            Some((head, _)) => head.to_owned(),
            None => href,
        };
        // only the Turkish originals; /en/post/ and /he/post/ are mirrors
        if href.contains("/en/post/") || href.contains("/he/post/") {
            continue;
        }
        seen.insert(href);
    }
    seen
}

/// Stage 2: fetch one post page and pull every archived field out of it.
pub async fn scrape_post(ctx: &Context, url: &str) -> anyhow::Result<Post> {
    safe_goto(&ctx.tab, url, Readiness::ContentLoaded, &ctx.cfg).await?;
    ctx.cfg.request_delay(1.0).await;

    let html = page_content(&ctx.tab).await?;
    let doc = Html::parse_document(&html);
    Ok(extract_post(&doc, &ctx.sel, &ctx.authors, url))
}

fn extract_post(doc: &Html, sel: &Selectors, authors: &AuthorMap, url: &str) -> Post {
    let mut title = doc
        .select(&sel.h1)
        .next()
        .map(|h| h.text().map(str::trim).collect::<String>())
        .unwrap_or_default();
    if title.is_empty() {
        title = meta_content(doc, &sel.og_title);
    }

    let mut content = String::new();
    for s in &sel.content {
        if let Some(el) = doc.select(s).next() {
            content = el.html();
            break;
        }
    }
    if content.is_empty() {
        if let Some(article) = doc.select(&sel.article).next() {
            content = without_page_chrome(article);
        }
    }
    let content = clean_html(&content);

    let mut excerpt = meta_content(doc, &sel.og_description);
    if excerpt.is_empty() && !content.is_empty() {
        excerpt = excerpt_of(&content);
    }

    let mut author = String::new();
    for s in &sel.author {
        if let Some(el) = doc.select(s).next() {
            author = el.text().map(str::trim).collect();
            break;
        }
    }

    let mut published_at = String::new();
    for s in &sel.published {
        if let Some(value) = doc
            .select(s)
            .next()
            .and_then(|el| el.attr("datetime").or_else(|| el.attr("content")))
        {
            if !value.is_empty() {
                published_at = value.to_owned();
                break;
            }
        }
    }

    Post {
        title,
        excerpt,
        cover_image: meta_content(doc, &sel.og_image),
        author_email: authors.email_for(&author).into(),
        categories: collect_labels(doc, &sel.category_link, true),
        tags: collect_labels(doc, &sel.tag_link, false),
        published_at,
        view_count: 0,
        source_url: url.to_owned(),
        content,
    }
}

fn meta_content(doc: &Html, sel: &Selector) -> String {
    doc.select(sel)
        .next()
        .and_then(|el| el.attr("content"))
        .unwrap_or_default()
        .to_owned()
}

fn collect_labels(doc: &Html, sel: &Selector, skip_nav: bool) -> Vec<String> {
    let mut labels = BTreeSet::new();
    for el in doc.select(sel) {
        let name: String = el.text().map(str::trim).collect();
        if name.is_empty() || (skip_nav && NAV_LABELS.contains(&name.as_str())) {
            continue;
        }
        labels.insert(name);
    }
    labels.into_iter().collect()
}

// Fallback when no Wix content block matched: take the article without its
// top-level nav/header furniture.
fn without_page_chrome(article: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in article.children() {
        if let Some(el) = ElementRef::wrap(child) {
            let name = el.value().name();
            if name == "nav" || name == "header" {
                continue;
            }
            out.push_str(&el.html());
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
    out
}

fn excerpt_of(content_html: &str) -> String {
    let text: String = Html::parse_fragment(content_html)
        .root_element()
        .text()
        .collect();
    let head: String = text.trim().chars().take(EXCERPT_CHARS).collect();
    head.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST_PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<meta property="og:title" content="Yedek Başlık">
<meta property="og:description" content="Kısa özet">
<meta property="og:image" content="https://static.example.com/cover.jpg">
</head><body>
<h1> Dizinin  Finali </h1>
<a href="/profile/iriseryilmaz/profile"> İris Eryılmaz </a>
<time datetime="2023-11-05T10:00:00Z">5 Kasım</time>
<div data-hook="post-description__block" class="rich x" style="color:red"><p>İlk paragraf.</p></div>
<a href="/blog/categories/dizi">Dizi</a>
<a href="/blog/categories/ana-sayfa">Ana Sayfa</a>
<a href="/blog/tags/final">final</a>
<a href="/blog/tags/final?utm=1">final</a>
</body></html>"#;

    fn authors() -> AuthorMap {
        serde_json::from_str(
            r#"{"fallback":"desk@example.com","authors":{"İris Eryılmaz":"iris@example.com"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn extracts_all_post_fields() {
        let doc = Html::parse_document(POST_PAGE);
        let post = extract_post(
            &doc,
            &Selectors::new(),
            &authors(),
            "https://example.com/post/final",
        );

        assert_eq!(post.title, "Dizinin  Finali");
        assert_eq!(post.excerpt, "Kısa özet");
        assert_eq!(post.content, "<div><p>İlk paragraf.</p></div>");
        assert_eq!(post.cover_image, "https://static.example.com/cover.jpg");
        assert_eq!(post.author_email, "iris@example.com");
        assert_eq!(post.categories, ["Dizi"]);
        assert_eq!(post.tags, ["final"]);
        assert_eq!(post.published_at, "2023-11-05T10:00:00Z");
        assert_eq!(post.view_count, 0);
        assert_eq!(post.source_url, "https://example.com/post/final");
    }

    #[test]
    fn falls_back_to_meta_title_and_content_excerpt() {
        let page = r#"<html><head><meta property="og:title" content="Sadece Meta"></head>
<body><div data-hook="post-body"><p>Gövde metni burada.</p></div></body></html>"#;
        let doc = Html::parse_document(page);
        let post = extract_post(&doc, &Selectors::new(), &authors(), "https://x/post/a");

        assert_eq!(post.title, "Sadece Meta");
        assert_eq!(post.excerpt, "Gövde metni burada.");
        assert_eq!(post.author_email, "desk@example.com");
    }

    #[test]
    fn url_collection_dedupes_and_filters_localizations() {
        let page = r#"<html><body>
<a href="/post/bir?utm_source=feed">bir</a>
<a href="https://example.com/post/bir">bir</a>
<a href="/post/iki">iki</a>
<a href="/en/post/one">one</a>
<a href="/he/post/echad">echad</a>
<a href="/about">about</a>
</body></html>"#;
        let doc = Html::parse_document(page);
        let urls = post_urls_in(&doc, &Selectors::new(), "https://example.com");

        assert_eq!(urls.len(), 2);
        assert!(urls.contains("https://example.com/post/bir"));
        assert!(urls.contains("https://example.com/post/iki"));
    }

    #[test]
    fn article_fallback_drops_nav_and_header() {
        let page = r"<html><body><article><header><h1>x</h1></header><nav>menu</nav><p>kalan</p></article></body></html>";
        let doc = Html::parse_document(page);
        let article = doc
            .select(&Selector::parse("article").unwrap())
            .next()
            .unwrap();
        assert_eq!(without_page_chrome(article), "<p>kalan</p>");
    }
}
