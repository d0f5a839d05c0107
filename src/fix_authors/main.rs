use std::path::PathBuf;

use anyhow::Context as _;
use scraper::{Html, Selector};
use wscr::{
    config::Config,
    scrape::{Readiness, page_content, safe_goto},
    store::ProgressMap,
    util::{slug_from_url, truncate},
};

const DEFAULT_AUTHOR: &str = "Ben İzledim";

#[derive(clap::Parser)]
struct Args {
    /// Run the browser with a visible window.
    #[arg(long)]
    headed: bool,
    #[arg(long, default_value = "database/data")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let cfg = Config::from_env();

    let urls_path = args.out_dir.join("wix-urls.json");
    let file = std::fs::File::open(&urls_path)
        .with_context(|| format!("url list not found: {}", urls_path.display()))?;
    let urls: Vec<String> = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("{} must be a list of urls", urls_path.display()))?;

    let mut progress = ProgressMap::load(args.out_dir.join("wix-authors.json"));
    tracing::info!(target: "main", "{} urls total, {} already fetched", urls.len(), progress.len());

    let todo = urls
        .iter()
        .filter(|url| !progress.contains(url))
        .collect::<Vec<_>>();
    if todo.is_empty() {
        tracing::info!(target: "main", "every author already fetched");
        return Ok(());
    }

    let browser = wscr::scrape::launch(!args.headed)?;
    let tab = wscr::scrape::first_tab(&browser)?;

    let sel_profile = Selector::parse(r#"a[href*="/profile/"]"#).unwrap();
    let sel_author_hook = Selector::parse(r#"[data-hook*="author"]"#).unwrap();

    for (index, url) in todo.iter().enumerate() {
        let slug = slug_from_url(url);
        let mut author = DEFAULT_AUTHOR.to_owned();

        // bylines hydrate late, so wait for the network to settle
        match safe_goto(&tab, url, Readiness::NetworkIdle, &cfg).await {
            Ok(()) => {
                cfg.request_delay(1.0).await;
                match page_content(&tab).await {
                    Ok(html) => {
                        let doc = Html::parse_document(&html);
                        let found = doc
                            .select(&sel_profile)
                            .next()
                            .or_else(|| doc.select(&sel_author_hook).next())
                            .map(|el| el.text().map(str::trim).collect::<String>())
                            .filter(|name| !name.is_empty());
                        if let Some(name) = found {
                            author = name;
                        }
                        tracing::info!(target: "main", "[{}/{}] {slug}: \x1b[32m✓\x1b[0m {author}", index + 1, todo.len());
                    }
                    Err(e) => {
                        tracing::warn!(target: "main", "[{}/{}] {slug}: {e:#}", index + 1, todo.len());
                    }
                }
            }
            Err(e) => {
                let msg = format!("{e:#}");
                tracing::warn!(target: "main", "[{}/{}] {slug}: {}", index + 1, todo.len(), truncate(&msg, 160));
            }
        }

        // a failed page still gets the house byline, like the export importer expects
        progress.record(url.as_str(), author)?;
        cfg.request_delay(0.3).await;
    }

    Ok(())
}
