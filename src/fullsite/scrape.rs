use std::{collections::BTreeMap, sync::Arc};

use compact_str::CompactString;
use headless_chrome::Tab;
use scraper::{Html, Selector};
use serde::Serialize;

use wscr::{
    config::{AuthorMap, Config},
    export::StageError,
    scrape::{Readiness, page_content, safe_goto},
    util::{absolutize, clean_html, slug_from_url},
};

const NAV_LABELS: [&str; 4] = ["Blog Yazıları", "Blog Posts", "Home", "Ana Sayfa"];

// Structural site data: the editorial profiles and static pages this Wix site
// actually has, same shape as a section table in any one-site scraper.
const AUTHOR_PROFILES: [&str; 6] = [
    "/profile/nsuevci/profile",
    "/profile/gurursonmez/profile",
    "/profile/iriseryilmaz/profile",
    "/profile/muhammedmuglu/profile",
    "/profile/alphantasar/profile",
    "/profile/humeyrafidan/profile",
];

const STATIC_PAGES: [(&str, &str); 3] = [
    ("/about", "Hakkımızda"),
    ("/contact", "İletişim"),
    ("/team", "Ekibimiz"),
];

const COMMENT_SAMPLE_POSTS: usize = 5;

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
    category_link: Selector,
    tag_link: Selector,
    post_link: Selector,
    heading: Selector,
    avatar: Selector,
    bio: Selector,
    social_link: Selector,
    page_content: Vec<Selector>,
    comment: Vec<Selector>,
    comment_author: Selector,
    comment_text: Selector,
    comment_date: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            category_link: Selector::parse(r#"a[href*="/categories/"], a[href*="/category/"]"#)
                .unwrap(),
            tag_link: Selector::parse(r#"a[href*="/tags/"], a[href*="/tag/"]"#).unwrap(),
            post_link: Selector::parse(r#"a[href*="/post/"]"#).unwrap(),
            heading: Selector::parse("h1, h2").unwrap(),
            avatar: Selector::parse(
                r#"img[alt*="profile"], .profile-image img, [data-hook="profile-image"] img"#,
            )
            .unwrap(),
            bio: Selector::parse(r#"[data-hook="profile-bio"], .profile-bio, [class*="about"]"#)
                .unwrap(),
            social_link: Selector::parse(
                r#"a[href*="twitter.com"], a[href*="x.com"], a[href*="instagram.com"], a[href*="linkedin.com"]"#,
            )
            .unwrap(),
            page_content: vec![
                Selector::parse("main").unwrap(),
                Selector::parse("article").unwrap(),
                Selector::parse(r#"[data-hook="page-content"]"#).unwrap(),
                Selector::parse(".page-content").unwrap(),
                Selector::parse("section").unwrap(),
            ],
            comment: vec![
                Selector::parse(r#"[data-hook="comment"]"#).unwrap(),
                Selector::parse(".comment").unwrap(),
                Selector::parse(r#"[class*="comment"]"#).unwrap(),
            ],
            comment_author: Selector::parse(r#"[class*="author"], [class*="user"]"#).unwrap(),
            comment_text: Selector::parse(r#"[class*="text"], [class*="content"], p"#).unwrap(),
            comment_date: Selector::parse(r#"time, [class*="date"]"#).unwrap(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Category {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub cover_image: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct TagEntry {
    pub name: String,
    pub slug: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub name: String,
    pub email: CompactString,
    pub avatar: String,
    pub bio: String,
    pub social_links: BTreeMap<&'static str, String>,
    pub profile_url: String,
}

#[derive(Debug, Serialize)]
pub struct StaticPage {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct Comment {
    pub post_slug: String,
    pub author: String,
    pub content: String,
    pub created_at: String,
}

async fn blog_document(ctx: &Context) -> anyhow::Result<Html> {
    let url = format!("{}/blog", ctx.cfg.base_url);
    safe_goto(&ctx.tab, &url, Readiness::ContentLoaded, &ctx.cfg).await?;
    ctx.cfg.request_delay(1.0).await;
    let html = page_content(&ctx.tab).await?;
    Ok(Html::parse_document(&html))
}

pub async fn scrape_categories(ctx: &Context) -> (Vec<Category>, Vec<StageError>) {
    tracing::info!(target: "categories", "collecting categories ...");
    let mut errors = Vec::new();
    let categories = match blog_document(ctx).await {
        Ok(doc) => categories_in(&doc, &ctx.sel, &ctx.cfg.base_url),
        Err(e) => {
            errors.push(StageError::new("categories", format!("{e:#}")));
            Vec::new()
        }
    };
    tracing::info!(target: "categories", "{} categories found", categories.len());
    (categories, errors)
}

fn categories_in(doc: &Html, sel: &Selectors, base_url: &str) -> Vec<Category> {
    let mut seen = hashbrown::HashSet::new();
    let mut categories = Vec::new();
    for link in doc.select(&sel.category_link) {
        let Some(href) = link.attr("href") else {
            continue;
        };
        let name: String = link.text().map(str::trim).collect();
        if name.is_empty() || NAV_LABELS.contains(&name.as_str()) || !seen.insert(name.clone()) {
            continue;
        }
        let url = absolutize(base_url, href);
        categories.push(Category {
            slug: slug_from_url(&url).to_owned(),
            name,
            description: String::new(),
            cover_image: String::new(),
            url,
        });
    }
    categories
}

pub async fn scrape_tags(ctx: &Context) -> (Vec<TagEntry>, Vec<StageError>) {
    tracing::info!(target: "tags", "collecting tags ...");
    let mut errors = Vec::new();
    let tags = match blog_document(ctx).await {
        Ok(doc) => tags_in(&doc, &ctx.sel, &ctx.cfg.base_url),
        Err(e) => {
            errors.push(StageError::new("tags", format!("{e:#}")));
            Vec::new()
        }
    };
    tracing::info!(target: "tags", "{} tags found", tags.len());
    (tags, errors)
}

fn tags_in(doc: &Html, sel: &Selectors, base_url: &str) -> Vec<TagEntry> {
    let mut seen = hashbrown::HashSet::new();
    let mut tags = Vec::new();
    for link in doc.select(&sel.tag_link) {
        let Some(href) = link.attr("href") else {
            continue;
        };
        let name: String = link.text().map(str::trim).collect();
        if name.is_empty() || !seen.insert(name.clone()) {
            continue;
        }
        let url = absolutize(base_url, href);
        tags.push(TagEntry {
            slug: slug_from_url(&url).to_owned(),
            name,
            url,
        });
    }
    tags
}

pub async fn scrape_user_profiles(ctx: &Context) -> (Vec<UserProfile>, Vec<StageError>) {
    tracing::info!(target: "users", "collecting author profiles ...");
    let mut users = Vec::new();
    let mut errors = Vec::new();
    let mut seen = hashbrown::HashSet::new();

    for path in AUTHOR_PROFILES {
        let url = format!("{}{path}", ctx.cfg.base_url);
        tracing::info!(target: "users", "  {path} ...");

        let doc = match fetch_document(ctx, &url).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(target: "users", "  {path}: {e}");
                errors.push(StageError::with_url("users", path, format!("{e:#}")));
                continue;
            }
        };

        let Some(mut user) = profile_in(&doc, &ctx.sel, &url) else {
            continue;
        };
        if !seen.insert(user.name.clone()) {
            continue;
        }
        user.email = ctx.authors.email_for(&user.name).into();
        tracing::info!(target: "users", "  \x1b[32m✓\x1b[0m {}", user.name);
        users.push(user);
    }

    tracing::info!(target: "users", "{} author profiles found", users.len());
    (users, errors)
}

async fn fetch_document(ctx: &Context, url: &str) -> anyhow::Result<Html> {
    safe_goto(&ctx.tab, url, Readiness::ContentLoaded, &ctx.cfg).await?;
    ctx.cfg.request_delay(1.0).await;
    let html = page_content(&ctx.tab).await?;
    Ok(Html::parse_document(&html))
}

fn profile_in(doc: &Html, sel: &Selectors, url: &str) -> Option<UserProfile> {
    let name: String = doc
        .select(&sel.heading)
        .next()?
        .text()
        .map(str::trim)
        .collect();
    if name.is_empty() {
        return None;
    }

    let avatar = doc
        .select(&sel.avatar)
        .next()
        .and_then(|img| img.attr("src"))
        .unwrap_or_default()
        .to_owned();

    let bio = doc
        .select(&sel.bio)
        .next()
        .map(|el| el.text().map(str::trim).collect())
        .unwrap_or_default();

    let mut social_links = BTreeMap::new();
    for link in doc.select(&sel.social_link) {
        let Some(href) = link.attr("href") else {
            continue;
        };
        if href.contains("twitter.com") || href.contains("x.com") {
            social_links.insert("twitter", href.to_owned());
        } else if href.contains("instagram.com") {
            social_links.insert("instagram", href.to_owned());
        } else if href.contains("linkedin.com") {
            social_links.insert("linkedin", href.to_owned());
        }
    }

    Some(UserProfile {
        name,
        email: CompactString::default(),
        avatar,
        bio,
        social_links,
        profile_url: url.to_owned(),
    })
}

pub async fn scrape_static_pages(ctx: &Context) -> (Vec<StaticPage>, Vec<StageError>) {
    tracing::info!(target: "pages", "collecting static pages ...");
    let mut pages = Vec::new();
    let mut errors = Vec::new();

    for (path, default_title) in STATIC_PAGES {
        let url = format!("{}{path}", ctx.cfg.base_url);
        tracing::info!(target: "pages", "  {path} ...");

        let doc = match fetch_document(ctx, &url).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(target: "pages", "  {path}: {e}");
                errors.push(StageError::with_url("pages", path, format!("{e:#}")));
                continue;
            }
        };

        match static_page_in(&doc, &ctx.sel, path, default_title, &url) {
            Some(page) => {
                tracing::info!(target: "pages", "  \x1b[32m✓\x1b[0m {}", page.title);
                pages.push(page);
            }
            None => {
                tracing::warn!(target: "pages", "  {path}: content not found");
                errors.push(StageError::with_url("pages", path, "content not found"));
            }
        }
    }

    tracing::info!(target: "pages", "{} static pages found", pages.len());
    (pages, errors)
}

fn static_page_in(
    doc: &Html,
    sel: &Selectors,
    path: &str,
    default_title: &str,
    url: &str,
) -> Option<StaticPage> {
    let title = doc
        .select(&sel.heading)
        .find(|el| el.value().name() == "h1")
        .map(|el| el.text().map(str::trim).collect::<String>())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default_title.to_owned());

    let mut content = String::new();
    for s in &sel.page_content {
        if let Some(el) = doc.select(s).next() {
            content = el.html();
            break;
        }
    }
    let content = clean_html(&content);
    if content.is_empty() {
        return None;
    }

    Some(StaticPage {
        title,
        slug: path.trim_matches('/').to_owned(),
        content,
        url: url.to_owned(),
    })
}

pub async fn scrape_comments(ctx: &Context) -> (Vec<Comment>, Vec<StageError>) {
    tracing::info!(target: "comments", "collecting comments ...");
    let mut comments = Vec::new();
    let mut errors = Vec::new();

    let post_urls = match blog_document(ctx).await {
        Ok(doc) => sample_post_urls(&doc, &ctx.sel, &ctx.cfg.base_url),
        Err(e) => {
            errors.push(StageError::new("comments", format!("{e:#}")));
            Vec::new()
        }
    };

    for url in post_urls {
        tracing::info!(target: "comments", "  {} ...", slug_from_url(&url));
        match fetch_document(ctx, &url).await {
            Ok(doc) => comments_in(&doc, &ctx.sel, &url, &mut comments),
            Err(e) => {
                tracing::warn!(target: "comments", "  {url}: {e}");
                errors.push(StageError::with_url("comments", url, format!("{e:#}")));
            }
        }
    }

    tracing::info!(target: "comments", "{} comments found", comments.len());
    (comments, errors)
}

fn sample_post_urls(doc: &Html, sel: &Selectors, base_url: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for link in doc.select(&sel.post_link) {
        if urls.len() >= COMMENT_SAMPLE_POSTS {
            break;
        }
        let Some(href) = link.attr("href") else {
            continue;
        };
        let href = absolutize(base_url, href);
        if href.contains("/en/") || href.contains("/he/") || urls.contains(&href) {
            continue;
        }
        urls.push(href);
    }
    urls
}

fn comments_in(doc: &Html, sel: &Selectors, post_url: &str, out: &mut Vec<Comment>) {
    let post_slug = slug_from_url(post_url);
    for s in &sel.comment {
        for el in doc.select(s) {
            let Some(text) = el.select(&sel.comment_text).next() else {
                continue;
            };
            let author = el
                .select(&sel.comment_author)
                .next()
                .map(|a| a.text().map(str::trim).collect::<String>())
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| "Misafir".to_owned());
            let created_at = el
                .select(&sel.comment_date)
                .next()
                .and_then(|d| d.attr("datetime"))
                .unwrap_or_default()
                .to_owned();

            out.push(Comment {
                post_slug: post_slug.to_owned(),
                author,
                content: text.text().map(str::trim).collect(),
                created_at,
            });
        }
    }
}
