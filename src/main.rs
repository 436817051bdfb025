use chrono::NaiveDate;
use clap::Parser;
use inkpress::build::build_site;
use inkpress::config::SiteLayout;
use std::error::Error;
use std::path::PathBuf;

/// Inkpress builds a static HTML site from a directory of Markdown posts and
/// pages, layouts, and assets.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// The project directory, holding `_config.yml`, `_posts`, `_layouts`,
    /// and friends.
    #[arg(default_value = ".")]
    project: PathBuf,

    /// Where to write the site. Defaults to `_site` inside the project.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The date (YYYY-MM-DD) given to posts without a usable `date`.
    /// Defaults to the current local date.
    #[arg(long)]
    today: Option<NaiveDate>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut layout = SiteLayout::new(&cli.project);
    if let Some(output) = &cli.output {
        layout = layout.with_output_directory(output);
    }
    let today = cli.today.unwrap_or_else(|| chrono::Local::now().date_naive());

    if let Err(err) = build_site(&layout, today) {
        log::error!("build failed: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            log::error!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
