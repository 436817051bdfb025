//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading the site configuration
//! ([`crate::config`]), copying static assets and passthrough files
//! ([`crate::copy`]), and rendering every post and page ([`crate::document`],
//! [`crate::route`], [`crate::layout`]) to disk ([`crate::write`]).

use crate::config::{self, SiteConfig, SiteLayout};
use crate::copy::{self, ROOT_FILE_EXTENSIONS};
use crate::document::{self, Document};
use crate::layout::{self, Layouts, RenderContext};
use crate::route::{self, Route};
use crate::value::Fields;
use crate::write::{RenderedPage, Writer};
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_POST_LAYOUT: &str = "post";
const DEFAULT_PAGE_LAYOUT: &str = "page";
const SOURCE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Prebuilt HTML files published verbatim after the pages.
const FRAGMENT_FILES: &[&str] = &["diary.html", "private.html"];

/// A post that was rendered during the build.
#[derive(Debug, PartialEq)]
pub struct PublishedPost {
    /// The post's front matter.
    pub metadata: Fields,

    /// The post's URL relative to the site root, e.g.
    /// `2023/05/01/my-post.html`.
    pub url: String,
}

/// Summarizes a finished build.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Every post, in source file name order.
    pub posts: Vec<PublishedPost>,

    /// The number of pages rendered.
    pub pages: usize,

    /// The number of files copied verbatim (assets, root files, fragments,
    /// and the admin tree).
    pub copied_files: usize,
}

/// Builds the site described by `layout`. Posts whose `date` is missing or
/// malformed are filed under `today`.
///
/// The build stops at the first error. Whatever was written up to that point
/// stays on disk; running the build again replaces it.
pub fn build_site(layout: &SiteLayout, today: NaiveDate) -> Result<BuildReport> {
    log::info!("building site from {}", layout.root_directory.display());
    if !layout.root_directory.is_dir() {
        return Err(Error::MissingFile(layout.root_directory.clone()));
    }
    check_output_directory(layout)?;
    let output = &layout.output_directory;
    fs::create_dir_all(output).map_err(|err| Error::Write {
        path: output.clone(),
        err,
    })?;

    let config = SiteConfig::load(&layout.config_file)?;
    log::info!("loaded {} configuration keys", config.fields.len());

    let mut report = BuildReport::default();

    log::info!("copying static assets");
    let assets_output = output.join("assets");
    if layout.assets_directory.is_dir() {
        report.copied_files += copy::mirror_dir(&layout.assets_directory, &assets_output)?;
    } else {
        copy::reset_dir(&assets_output)?;
    }

    log::info!("copying root files");
    report.copied_files += copy::copy_root_files(&layout.root_directory, output, ROOT_FILE_EXTENSIONS)?;

    let layouts = Layouts::new(&layout.layouts_directory, &layout.includes_directory).map_err(
        |err| Error::Layout {
            path: layout.includes_directory.clone(),
            err,
        },
    )?;
    let mut site = Site {
        output_directory: output,
        config: &config,
        layouts,
        writer: Writer::new(),
        today,
    };

    log::info!("rendering posts");
    for (file_name, path) in source_files(&layout.posts_directory)? {
        report.posts.push(site.render_post(&file_name, &path)?);
    }

    log::info!("rendering pages");
    for (file_name, path) in source_files(&layout.pages_directory)? {
        site.render_page(&file_name, &path)?;
        report.pages += 1;
    }

    log::info!("copying fragment pages");
    for name in FRAGMENT_FILES {
        if copy::copy_file_if_present(&layout.root_directory.join(name), &output.join(name))? {
            report.copied_files += 1;
        }
    }

    if layout.admin_directory.is_dir() {
        log::info!("copying admin panel");
        report.copied_files += copy::mirror_dir(&layout.admin_directory, &output.join("admin"))?;
    }

    log::info!(
        "site built in {}: {} posts, {} pages, {} files copied",
        output.display(),
        report.posts.len(),
        report.pages,
        report.copied_files
    );
    Ok(report)
}

/// Rejects an output root that is the project root or lies inside the
/// assets or admin directory.
fn check_output_directory(layout: &SiteLayout) -> Result<()> {
    let output = resolve(&layout.output_directory)?;
    let root = resolve(&layout.root_directory)?;
    let overlaps = |source: &Path| -> Result<bool> { Ok(output.starts_with(resolve(source)?)) };
    let conflict = if output == root {
        Some(&layout.root_directory)
    } else if overlaps(&layout.assets_directory)? {
        Some(&layout.assets_directory)
    } else if overlaps(&layout.admin_directory)? {
        Some(&layout.admin_directory)
    } else {
        None
    };
    match conflict {
        Some(source) => Err(Error::OutputOverlapsSource {
            output: layout.output_directory.clone(),
            source: source.clone(),
        }),
        None => Ok(()),
    }
}

/// Canonicalizes `path`, which may not exist yet: its closest existing
/// ancestor is canonicalized and the missing components are appended.
fn resolve(path: &Path) -> Result<PathBuf> {
    let mut missing = Vec::new();
    let mut existing = path;
    loop {
        match existing.canonicalize() {
            Ok(base) => {
                return Ok(missing.iter().rev().fold(base, |acc: PathBuf, name| acc.join(name)))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name);
                        existing = match parent.as_os_str().is_empty() {
                            true => Path::new("."),
                            false => parent,
                        };
                    }
                    _ => {
                        return Err(Error::Resolve {
                            path: path.to_owned(),
                            err,
                        })
                    }
                }
            }
            Err(err) => {
                return Err(Error::Resolve {
                    path: path.to_owned(),
                    err,
                })
            }
        }
    }
}

/// Lists the source documents directly inside `dir`, sorted by file name. A
/// missing directory has no documents.
fn source_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let list_err = |err| Error::ListSources {
        path: dir.to_owned(),
        err,
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(list_err(err)),
    };

    let mut files = Vec::new();
    for result in entries {
        let entry = result.map_err(list_err)?;
        let path = entry.path();
        let is_source = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| SOURCE_EXTENSIONS.contains(&ext));
        if is_source && path.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    files.sort();
    Ok(files)
}

/// The state shared by every render within one build.
struct Site<'a> {
    output_directory: &'a Path,
    config: &'a SiteConfig,
    layouts: Layouts,
    writer: Writer,
    today: NaiveDate,
}

impl Site<'_> {
    fn render_post(&mut self, file_name: &str, path: &Path) -> Result<PublishedPost> {
        log::info!("processing post {}", file_name);
        let doc = parse(path)?;
        let date = doc.date();
        if date.as_deref().and_then(route::date_parts).is_none() {
            log::warn!(
                "post {} has no usable date ({:?}); filing it under {}",
                file_name,
                date,
                self.today
            );
        }
        let route = route::post_route(self.output_directory, file_name, date.as_deref(), self.today);
        self.render(doc, &route, DEFAULT_POST_LAYOUT, path)
    }

    fn render_page(&mut self, file_name: &str, path: &Path) -> Result<()> {
        log::info!("processing page {}", file_name);
        let doc = parse(path)?;
        let route = route::page_route(self.output_directory, file_name, doc.permalink().as_deref())
            .map_err(|err| Error::Route {
                path: path.to_owned(),
                err,
            })?;
        self.render(doc, &route, DEFAULT_PAGE_LAYOUT, path)?;
        Ok(())
    }

    /// Renders `doc` through its layout (or `default_layout`) and writes it to
    /// `route`. Nothing is written unless rendering succeeds.
    fn render(
        &mut self,
        doc: Document,
        route: &Route,
        default_layout: &str,
        path: &Path,
    ) -> Result<PublishedPost> {
        let layout_name = doc.layout().unwrap_or_else(|| default_layout.to_owned());
        let url = route.absolute_url();
        let ctx = RenderContext {
            page: &doc.metadata,
            content: &doc.html,
            site: self.config,
            url: &url,
            meta: &doc.embedded,
        };
        let html = self.layouts.render(&layout_name, &ctx).map_err(|err| Error::Layout {
            path: path.to_owned(),
            err,
        })?;

        let page = RenderedPage {
            file_path: route.file_path.clone(),
            html,
        };
        self.writer.write(&page).map_err(|err| Error::Write {
            path: page.file_path.clone(),
            err,
        })?;
        log::debug!("wrote {}", page.file_path.display());

        Ok(PublishedPost {
            metadata: doc.metadata,
            url: route.url.clone(),
        })
    }
}

fn parse(path: &Path) -> Result<Document> {
    Document::from_file(path).map_err(|err| match err.is_missing_file() {
        true => Error::MissingFile(path.to_owned()),
        false => Error::Parse {
            path: path.to_owned(),
            err,
        },
    })
}

/// The result of a build.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors name the file they concern
/// where there is one.
#[derive(Debug)]
pub enum Error {
    /// Returned when a required file or directory doesn't exist.
    MissingFile(PathBuf),

    /// Returned when the output root is the project root or lies inside a
    /// mirrored source directory.
    OutputOverlapsSource { output: PathBuf, source: PathBuf },

    /// Returned when a path can't be canonicalized.
    Resolve { path: PathBuf, err: io::Error },

    /// Returned when the site configuration can't be loaded.
    Config(config::Error),

    /// Returned for errors copying assets or passthrough files.
    Copy(copy::Error),

    /// Returned when listing a source directory fails.
    ListSources { path: PathBuf, err: io::Error },

    /// Returned when a source document can't be parsed.
    Parse { path: PathBuf, err: document::Error },

    /// Returned when a source document can't be routed.
    Route { path: PathBuf, err: route::Error },

    /// Returned when a source document's layout is missing or fails.
    Layout { path: PathBuf, err: layout::Error },

    /// Returned for I/O problems writing output files.
    Write { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingFile(path) => write!(f, "Missing file '{}'", path.display()),
            Error::OutputOverlapsSource { output, source } => write!(
                f,
                "Output directory '{}' overlaps source '{}'",
                output.display(),
                source.display()
            ),
            Error::Resolve { path, err } => {
                write!(f, "Resolving path '{}': {}", path.display(), err)
            }
            Error::Config(err) => err.fmt(f),
            Error::Copy(err) => err.fmt(f),
            Error::ListSources { path, err } => {
                write!(f, "Listing directory '{}': {}", path.display(), err)
            }
            Error::Parse { path, err } => write!(f, "Parsing '{}': {}", path.display(), err),
            Error::Route { path, err } => write!(f, "Routing '{}': {}", path.display(), err),
            Error::Layout { path, err } => write!(f, "Rendering '{}': {}", path.display(), err),
            Error::Write { path, err } => write!(f, "Writing '{}': {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingFile(_) => None,
            Error::OutputOverlapsSource { .. } => None,
            Error::Resolve { path: _, err } => Some(err),
            Error::Config(err) => Some(err),
            Error::Copy(err) => Some(err),
            Error::ListSources { path: _, err } => Some(err),
            Error::Parse { path: _, err } => Some(err),
            Error::Route { path: _, err } => Some(err),
            Error::Layout { path: _, err } => Some(err),
            Error::Write { path: _, err } => Some(err),
        }
    }
}

impl From<config::Error> for Error {
    /// Converts [`config::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}

impl From<copy::Error> for Error {
    /// Converts [`copy::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: copy::Error) -> Error {
        Error::Copy(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read(root: &Path, relative: &str) -> String {
        fs::read_to_string(root.join(relative)).unwrap()
    }

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "_config.yml", "title: Test Site\n");
        write(
            root,
            "_layouts/post.html",
            "<html><title>{{.page.title}} - {{.site.title}}</title><body data-url=\"{{.url}}\">{{.content}}</body></html>\n",
        );
        write(root, "_layouts/page.html", "<main>{{.page.title}}|{{.content}}</main>\n");
        write(
            root,
            "_posts/2021-04-16-hello.md",
            "---\ntitle: Hello\ndate: 2023-05-01\n---\n# Hi there\n\nFirst post.\n",
        );
        write(root, "_posts/undated.md", "---\ntitle: Undated\n---\nNo date.\n");
        write(root, "_posts/notes.txt", "not a post");
        write(root, "_pages/about.md", "---\ntitle: About\n---\nAbout me.\n");
        write(
            root,
            "_pages/team.md",
            "---\ntitle: Team\npermalink: team/about.html\n---\nThe team.\n",
        );
        write(root, "assets/css/site.css", "body {}");
        write(root, "index.html", "<html>home</html>");
        write(root, "build.py", "print()");
        write(root, "diary.html", "diary");
        write(root, "private.html", "private");
        write(root, "admin/index.html", "admin");
        write(root, "admin/js/app.js", "app()");
        dir
    }

    fn site_layout(dir: &TempDir) -> SiteLayout {
        SiteLayout::new(dir.path())
    }

    /// Reads every file under `root` into a map of relative path to contents.
    fn tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .map(|entry| entry.unwrap())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                (
                    entry.path().strip_prefix(root).unwrap().to_owned(),
                    fs::read(entry.path()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_build_site() -> Result<()> {
        let dir = fixture();
        let layout = site_layout(&dir);
        let report = build_site(&layout, today())?;
        let out = &layout.output_directory;

        assert_eq!(
            "<html><title>Hello - Test Site</title><body data-url=\"/2023/05/01/hello.html\"><h1 id=\"hi-there\">Hi there</h1>\n<p>First post.</p>\n</body></html>\n",
            read(out, "2023/05/01/hello.html")
        );
        assert!(out.join("2024/02/29/undated.html").is_file());
        assert_eq!("<main>About|<p>About me.</p>\n</main>\n", read(out, "about.html"));
        assert_eq!("<main>Team|<p>The team.</p>\n</main>\n", read(out, "team/about.html"));
        assert!(!out.join("team.html").exists());

        assert_eq!("body {}", read(out, "assets/css/site.css"));
        assert_eq!("<html>home</html>", read(out, "index.html"));
        assert!(!out.join("build.py").exists());
        assert!(!out.join("notes.html").exists());
        assert_eq!("diary", read(out, "diary.html"));
        assert_eq!("private", read(out, "private.html"));
        assert_eq!("app()", read(out, "admin/js/app.js"));

        let urls: Vec<&str> = report.posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(vec!["2023/05/01/hello.html", "2024/02/29/undated.html"], urls);
        assert_eq!(Some("Hello".to_owned()), report.posts[0].metadata.get_scalar("title"));
        assert_eq!(2, report.pages);
        Ok(())
    }

    #[test]
    fn test_build_is_idempotent() -> Result<()> {
        let dir = fixture();
        let layout = site_layout(&dir);
        build_site(&layout, today())?;
        let first = tree(&layout.output_directory);

        write(&layout.output_directory, "assets/stale.css", "old");
        write(&layout.output_directory, "admin/stale.js", "old");
        build_site(&layout, today())?;
        assert_eq!(first, tree(&layout.output_directory));
        Ok(())
    }

    #[test]
    fn test_missing_optional_inputs() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let layout = site_layout(&dir);
        let report = build_site(&layout, today())?;
        assert!(report.posts.is_empty());
        assert_eq!(0, report.pages);
        assert!(layout.output_directory.join("assets").is_dir());
        assert!(!layout.output_directory.join("admin").exists());
        Ok(())
    }

    #[test]
    fn test_custom_output_directory() -> Result<()> {
        let dir = fixture();
        let out = tempfile::tempdir().unwrap();
        let layout = site_layout(&dir).with_output_directory(&out.path().join("public"));
        build_site(&layout, today())?;
        assert!(out.path().join("public/2023/05/01/hello.html").is_file());
        assert!(!dir.path().join("_site").exists());
        Ok(())
    }

    #[test]
    fn test_malformed_frontmatter_aborts_before_writing() {
        let dir = fixture();
        write(dir.path(), "_posts/broken.md", "---\ntitle: [oops\n---\nBody\n");
        let layout = site_layout(&dir);
        match build_site(&layout, today()) {
            Err(Error::Parse { path, err: document::Error::DeserializeYaml(_) }) => {
                assert_eq!(dir.path().join("_posts/broken.md"), path)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!layout.output_directory.join("2024/02/29/broken.html").exists());
    }

    #[test]
    fn test_missing_layout_aborts() {
        let dir = fixture();
        write(dir.path(), "_pages/odd.md", "---\nlayout: missing\n---\nBody\n");
        match build_site(&site_layout(&dir), today()) {
            Err(Error::Layout { path, err: layout::Error::NotFound(name, _) }) => {
                assert_eq!(dir.path().join("_pages/odd.md"), path);
                assert_eq!("missing", name);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!dir.path().join("_site/odd.html").exists());
    }

    #[test]
    fn test_invalid_permalink_aborts() {
        let dir = fixture();
        write(dir.path(), "_pages/evil.md", "---\npermalink: ../evil.html\n---\nBody\n");
        assert!(matches!(
            build_site(&site_layout(&dir), today()),
            Err(Error::Route { .. })
        ));
        assert!(!dir.path().join("evil.html").exists());
    }

    #[test]
    fn test_output_directory_must_not_overlap_sources() {
        let dir = fixture();
        let root = dir.path();
        for output in [root.to_owned(), root.join("."), root.join("assets/site"), root.join("admin")] {
            let layout = site_layout(&dir).with_output_directory(&output);
            match build_site(&layout, today()) {
                Err(Error::OutputOverlapsSource { .. }) => {}
                other => panic!("unexpected result for {}: {:?}", output.display(), other),
            }
        }
        assert_eq!("body {}", read(root, "assets/css/site.css"));
        assert_eq!("<html>home</html>", read(root, "index.html"));
        assert_eq!("admin", read(root, "admin/index.html"));
        assert!(!root.join("assets/site").exists());
    }

    #[test]
    fn test_resolve_missing_path() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        assert_eq!(base.join("a/b"), resolve(&dir.path().join("a/b"))?);
        Ok(())
    }

    #[test]
    fn test_missing_project_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nope");
        match build_site(&SiteLayout::new(&root), today()) {
            Err(Error::MissingFile(path)) => assert_eq!(root, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
