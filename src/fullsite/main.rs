mod scrape;

use std::path::PathBuf;

use wscr::{
    config::{AuthorMap, Config},
    export::save_export,
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

    tracing::info!(target: "main", "Wix full-site scraper ({})", cfg.base_url);

    let browser = wscr::scrape::launch(!args.headed)?;
    let tab = wscr::scrape::first_tab(&browser)?;
    let ctx = scrape::Context::new(tab, cfg, authors);

    let (categories, errors) = scrape::scrape_categories(&ctx).await;
    save_export(
        &args.out_dir.join("wix-categories.json"),
        &ctx.cfg,
        "fullsite",
        "categories",
        &categories,
        &errors,
    )?;

    let (tags, errors) = scrape::scrape_tags(&ctx).await;
    save_export(
        &args.out_dir.join("wix-tags.json"),
        &ctx.cfg,
        "fullsite",
        "tags",
        &tags,
        &errors,
    )?;

    let (users, errors) = scrape::scrape_user_profiles(&ctx).await;
    save_export(
        &args.out_dir.join("wix-users.json"),
        &ctx.cfg,
        "fullsite",
        "users",
        &users,
        &errors,
    )?;

    let (pages, errors) = scrape::scrape_static_pages(&ctx).await;
    save_export(
        &args.out_dir.join("wix-pages.json"),
        &ctx.cfg,
        "fullsite",
        "pages",
        &pages,
        &errors,
    )?;

    let (comments, errors) = scrape::scrape_comments(&ctx).await;
    save_export(
        &args.out_dir.join("wix-comments.json"),
        &ctx.cfg,
        "fullsite",
        "comments",
        &comments,
        &errors,
    )?;

    tracing::info!(target: "main", "\x1b[36mdone\x1b[0m");
    tracing::info!(target: "main", "  categories: {}", categories.len());
    tracing::info!(target: "main", "  tags: {}", tags.len());
    tracing::info!(target: "main", "  users: {}", users.len());
    tracing::info!(target: "main", "  pages: {}", pages.len());
    tracing::info!(target: "main", "  comments: {}", comments.len());

    Ok(())
}
