//! Derives where a rendered document lands: its public URL and the output
//! file that serves it.
//!
//! Posts are addressed by date, `{year}/{month}/{day}/{slug}.html`, where the
//! date comes from the `date` front matter (or the build's fallback date) and
//! the slug from the file name. Pages are addressed by their `permalink`, or
//! `{slug}.html` without one.

use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

const HTML_EXTENSION: &str = ".html";
const INDEX_FILE: &str = "index.html";

/// The location of a rendered document.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// The URL path relative to the site root, without a leading slash (e.g.,
    /// `2023/05/01/my-post.html`).
    pub url: String,

    /// The output file, under the output root.
    pub file_path: PathBuf,
}

impl Route {
    /// The URL as seen from the site root, i.e. with a leading slash.
    pub fn absolute_url(&self) -> String {
        format!("/{}", self.url)
    }
}

fn date_prefix() -> &'static Regex {
    static DATE: OnceLock<Regex> = OnceLock::new();
    DATE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("date pattern is valid"))
}

fn slug_date_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}-").expect("slug pattern is valid"))
}

/// Returns the file name without its final extension.
fn stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
}

/// The slug of a post: the file name without its extension and without a
/// leading `YYYY-MM-DD-`.
pub fn post_slug(file_name: &str) -> String {
    slug_date_prefix().replace(stem(file_name), "").into_owned()
}

/// The slug of a page: the file name without its extension.
pub fn page_slug(file_name: &str) -> String {
    stem(file_name).to_owned()
}

/// Extracts `(year, month, day)` from the start of `date`, if it begins with
/// `YYYY-MM-DD`. The components are kept as written.
pub fn date_parts(date: &str) -> Option<(String, String, String)> {
    let caps = date_prefix().captures(date.trim())?;
    Some((caps[1].to_owned(), caps[2].to_owned(), caps[3].to_owned()))
}

/// Routes a post. `date` is the post's `date` metadata; when it is missing or
/// doesn't begin with `YYYY-MM-DD`, `today` is used instead. A date embedded
/// in the file name only affects the slug.
pub fn post_route(output_root: &Path, file_name: &str, date: Option<&str>, today: NaiveDate) -> Route {
    let (year, month, day) = date.and_then(date_parts).unwrap_or_else(|| {
        (
            today.format("%Y").to_string(),
            today.format("%m").to_string(),
            today.format("%d").to_string(),
        )
    });
    let file_name = format!("{}{}", post_slug(file_name), HTML_EXTENSION);
    Route {
        url: format!("{}/{}/{}/{}", year, month, day, file_name),
        file_path: output_root.join(&year).join(&month).join(&day).join(&file_name),
    }
}

/// Routes a page. `permalink` is the page's `permalink` metadata, resolved
/// relative to `output_root`; a leading `/` is ignored and a trailing `/`
/// (including a bare `/`) means `index.html` inside that directory. Without
/// a permalink the page lands at `{slug}.html`.
pub fn page_route(output_root: &Path, file_name: &str, permalink: Option<&str>) -> Result<Route> {
    let relative = match permalink {
        None => format!("{}{}", page_slug(file_name), HTML_EXTENSION),
        Some(permalink) => normalize_permalink(permalink)?,
    };
    let mut file_path = output_root.to_owned();
    file_path.extend(relative.split('/'));
    Ok(Route {
        url: relative,
        file_path,
    })
}

fn normalize_permalink(permalink: &str) -> Result<String> {
    let trimmed = permalink.trim();
    let mut relative = trimmed.trim_start_matches('/').to_owned();
    if relative.is_empty() || relative.ends_with('/') {
        relative.push_str(INDEX_FILE);
    }
    let escapes = Path::new(&relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    let relative = relative
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if trimmed.is_empty() || escapes || relative.is_empty() {
        return Err(Error::InvalidPermalink(permalink.to_owned()));
    }
    Ok(relative)
}

/// Represents the result of a routing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error routing a document.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Returned when a `permalink` is empty or would leave the output root.
    InvalidPermalink(String),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidPermalink(permalink) => {
                write!(f, "invalid permalink `{}`: must be a path inside the site", permalink)
            }
        }
    }
}

impl std::error::Error for Error {}
