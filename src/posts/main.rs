mod scrape;

use std::path::PathBuf;

use wscr::{
    config::{AuthorMap, Config},
    export::{StageError, save_export},
    store::save_json,
    util::{slug_from_url, truncate},
};

#[derive(clap::Parser)]
struct Args {
    /// Run the browser with a visible window.
    #[arg(long)]
    headed: bool,
    #[arg(long, default_value = "database/data")]
    out_dir: PathBuf,
    #[arg(long, default_value = "data/author-emails.json")]
    author_map: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let cfg = Config::from_env();
    let authors = AuthorMap::load(&args.author_map);

    tracing::info!(target: "main", "Wix blog scraper ({})", cfg.base_url);

    let browser = wscr::scrape::launch(!args.headed)?;
    let tab = wscr::scrape::first_tab(&browser)?;
    let ctx = scrape::Context::new(tab, cfg, authors);

    tracing::info!(target: "main", "stage 1: collecting post urls ...");
    let urls = scrape::collect_post_urls(&ctx).await?;
    anyhow::ensure!(!urls.is_empty(), "no posts found under {}/blog", ctx.cfg.base_url);
    tracing::info!(target: "main", "{} unique Turkish post urls", urls.len());

    let urls_path = args.out_dir.join("wix-urls.json");
    save_json(&urls_path, &urls)?;
    tracing::info!(target: "main", "url list saved -> {}", urls_path.display());

    tracing::info!(target: "main", "stage 2: fetching {} posts ...", urls.len());
    let mut posts = Vec::new();
    let mut errors = Vec::new();
    for (index, url) in urls.iter().enumerate() {
        let slug = slug_from_url(url);
        match scrape::scrape_post(&ctx, url).await {
            Ok(post) if post.title.is_empty() => {
                tracing::warn!(target: "main", "[{}/{}] {slug}: missing title, skipped", index + 1, urls.len());
                errors.push(StageError::with_url("posts", url.clone(), "missing title"));
            }
            Ok(post) => {
                tracing::info!(target: "main", "[{}/{}] \x1b[32m✓\x1b[0m {}", index + 1, urls.len(), truncate(&post.title, 40));
                posts.push(post);
            }
            Err(e) => {
                tracing::warn!(target: "main", "[{}/{}] {slug}: {e:#}", index + 1, urls.len());
                errors.push(StageError::with_url("posts", url.clone(), format!("{e:#}")));
            }
        }
        ctx.cfg.request_delay(1.0).await;
    }

    posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    save_export(
        &args.out_dir.join("wix-posts.json"),
        &ctx.cfg,
        "posts",
        "posts",
        &posts,
        &errors,
    )?;

    let mut by_author = hashbrown::HashMap::<&str, usize>::new();
    for post in &posts {
        *by_author.entry(post.author_email.as_str()).or_default() += 1;
    }
    let mut by_author = by_author.into_iter().collect::<Vec<_>>();
    by_author.sort_by_key(|&(_, n)| core::cmp::Reverse(n));

    tracing::info!(target: "main", "done: {} posts, {} errors", posts.len(), errors.len());
    for (author, n) in by_author {
        tracing::info!(target: "main", "  {author}: {n}");
    }

    Ok(())
}
