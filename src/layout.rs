//! Loads layouts (Go-style templates, see [`gtmpl`]) and renders documents
//! through them.
//!
//! A layout named `post` lives at `{layouts_directory}/post.html`. Every
//! `*.html` file in the includes directory is appended to each layout before
//! it's parsed, so layouts can share blocks declared with
//! `{{define "name"}}...{{end}}` and used with `{{template "name" .}}`.

use crate::config::SiteConfig;
use crate::value::Fields;
use gtmpl::{Context, Template, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

const TEMPLATE_EXTENSION: &str = "html";

/// Everything a layout can see while rendering one document.
pub struct RenderContext<'a> {
    /// The document's front matter, as `.page`.
    pub page: &'a Fields,

    /// The rendered body, as `.content`.
    pub content: &'a str,

    /// The site configuration, as `.site`.
    pub site: &'a SiteConfig,

    /// The document's URL with a leading slash, as `.url`.
    pub url: &'a str,

    /// Metadata embedded at the top of the body, as `.meta`.
    pub meta: &'a Fields,
}

impl From<&RenderContext<'_>> for Value {
    /// Converts a [`RenderContext`] into a [`Value::Object`] with fields
    /// `page`, `content`, `site`, `url`, and `meta`.
    fn from(ctx: &RenderContext<'_>) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("page".to_owned(), ctx.page.into());
        m.insert("content".to_owned(), Value::String(ctx.content.to_owned()));
        m.insert("site".to_owned(), (&ctx.site.fields).into());
        m.insert("url".to_owned(), Value::String(ctx.url.to_owned()));
        m.insert("meta".to_owned(), ctx.meta.into());
        Value::Object(m)
    }
}

/// The layouts of a site. Each layout is read and parsed the first time it's
/// used and reused for the rest of the build.
pub struct Layouts {
    directory: PathBuf,

    /// The concatenated sources of all partials.
    includes: String,

    cache: HashMap<String, Template>,
}

impl Layouts {
    /// Prepares the layouts in `directory`, reading every partial in
    /// `includes_directory` (which may not exist).
    pub fn new(directory: &Path, includes_directory: &Path) -> Result<Layouts> {
        Ok(Layouts {
            directory: directory.to_owned(),
            includes: read_includes(includes_directory)?,
            cache: HashMap::new(),
        })
    }

    /// Renders `ctx` through the layout called `name`.
    pub fn render(&mut self, name: &str, ctx: &RenderContext) -> Result<String> {
        if !self.cache.contains_key(name) {
            let template = self.load(name)?;
            self.cache.insert(name.to_owned(), template);
        }
        let template = match self.cache.get(name) {
            Some(template) => template,
            None => return Err(Error::NotFound(name.to_owned(), self.path(name))),
        };

        let context = Context::from(Value::from(ctx)).map_err(|err| Error::Render {
            name: name.to_owned(),
            err,
        })?;
        let mut out: Vec<u8> = Vec::new();
        template.execute(&mut out, &context).map_err(|err| Error::Render {
            name: name.to_owned(),
            err,
        })?;
        String::from_utf8(out).map_err(|err| Error::Render {
            name: name.to_owned(),
            err: err.to_string(),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}.{}", name, TEMPLATE_EXTENSION))
    }

    fn load(&self, name: &str) -> Result<Template> {
        let path = self.path(name);
        let inside = !name.is_empty()
            && Path::new(name)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !inside || !path.is_file() {
            return Err(Error::NotFound(name.to_owned(), path));
        }
        log::debug!("loading layout `{}` from {}", name, path.display());

        let mut contents = fs::read_to_string(&path).map_err(|err| Error::Read {
            path: path.clone(),
            err,
        })?;
        if !self.includes.is_empty() {
            contents.push('\n');
            contents.push_str(&self.includes);
        }

        let mut template = Template::default();
        template.parse(&contents).map_err(|err| Error::Parse {
            name: name.to_owned(),
            err,
        })?;
        Ok(template)
    }
}

// Loads the partial files in `dir` (sorted by name) and concatenates them.
fn read_includes(dir: &Path) -> Result<String> {
    let read_err = |err| Error::Read {
        path: dir.to_owned(),
        err,
    };
    let mut paths = match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<PathBuf>>>()
            .map_err(read_err)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(err) => return Err(read_err(err)),
    };
    paths.retain(|path| {
        path.is_file() && path.extension().map_or(false, |ext| ext == TEMPLATE_EXTENSION)
    });
    paths.sort();

    let mut contents = String::new();
    for path in paths {
        let partial = fs::read_to_string(&path).map_err(|err| Error::Read {
            path: path.clone(),
            err,
        })?;
        contents.push_str(&partial);
    }
    Ok(contents)
}

/// Represents the result of a layout operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or rendering a layout.
#[derive(Debug)]
pub enum Error {
    /// Returned when a document asks for a layout that doesn't exist.
    NotFound(String, PathBuf),

    /// Returned for I/O problems while reading layout or partial files.
    Read { path: PathBuf, err: std::io::Error },

    /// Returned when a layout can't be parsed.
    Parse { name: String, err: String },

    /// Returned when a layout fails while rendering.
    Render { name: String, err: String },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(name, path) => {
                write!(f, "Layout `{}` not found (expected '{}')", name, path.display())
            }
            Error::Read { path, err } => {
                write!(f, "Reading template file '{}': {}", path.display(), err)
            }
            Error::Parse { name, err } => write!(f, "Parsing layout `{}`: {}", name, err),
            Error::Render { name, err } => write!(f, "Rendering layout `{}`: {}", name, err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { path: _, err } => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fields(yaml: &str) -> Fields {
        Fields::from_yaml(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_render() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let layouts = dir.path().join("_layouts");
        write(
            &layouts.join("post.html"),
            "<title>{{.page.title}} | {{.site.title}}</title><a href=\"{{.url}}\"></a>{{.content}}",
        );
        let page = fields("title: Hello");
        let site = SiteConfig {
            fields: fields("title: Blog"),
        };
        let meta = Fields::new();
        let ctx = RenderContext {
            page: &page,
            content: "<p>Hi</p>",
            site: &site,
            url: "/2023/05/01/hello.html",
            meta: &meta,
        };

        let mut l = Layouts::new(&layouts, &dir.path().join("_includes"))?;
        assert_eq!(
            "<title>Hello | Blog</title><a href=\"/2023/05/01/hello.html\"></a><p>Hi</p>",
            l.render("post", &ctx)?
        );
        Ok(())
    }

    #[test]
    fn test_render_with_partials() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let layouts = dir.path().join("_layouts");
        let includes = dir.path().join("_includes");
        write(&layouts.join("page.html"), "{{template \"header\" .}}{{.content}}");
        write(&includes.join("header.html"), "{{define \"header\"}}<h1>{{.site.name}}</h1>{{end}}");
        write(&includes.join("notes.txt"), "{{ this is not a template");
        let page = Fields::new();
        let site = SiteConfig {
            fields: fields("name: Site"),
        };
        let ctx = RenderContext {
            page: &page,
            content: "body",
            site: &site,
            url: "/about.html",
            meta: &page,
        };

        let mut l = Layouts::new(&layouts, &includes)?;
        assert!(l.render("page", &ctx)?.starts_with("<h1>Site</h1>body"));
        Ok(())
    }

    #[test]
    fn test_missing_layout() {
        let dir = tempfile::tempdir().unwrap();
        let page = Fields::new();
        let site = SiteConfig::default();
        let ctx = RenderContext {
            page: &page,
            content: "",
            site: &site,
            url: "/",
            meta: &page,
        };
        let mut l = Layouts::new(dir.path(), &dir.path().join("_includes")).unwrap();
        match l.render("nope", &ctx) {
            Err(Error::NotFound(name, path)) => {
                assert_eq!("nope", name);
                assert_eq!(dir.path().join("nope.html"), path);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(l.render("../post", &ctx), Err(Error::NotFound(..))));
    }

    #[test]
    fn test_malformed_layout() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("bad.html"), "{{if .page}}unclosed");
        let page = Fields::new();
        let site = SiteConfig::default();
        let ctx = RenderContext {
            page: &page,
            content: "",
            site: &site,
            url: "/",
            meta: &page,
        };
        let mut l = Layouts::new(dir.path(), &dir.path().join("_includes")).unwrap();
        assert!(matches!(l.render("bad", &ctx), Err(Error::Parse { .. })));
    }
}
