//! Defines the project layout ([`SiteLayout`]) and the site configuration
//! ([`SiteConfig`]) loaded from `_config.yml`.

use crate::value::{Fields, NotAMappingError};
use std::fmt;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "_config.yml";

/// The fixed directory layout of a project. Every path is derived from the
/// project root, except the output root which may be overridden.
#[derive(Clone, Debug)]
pub struct SiteLayout {
    pub root_directory: PathBuf,
    pub config_file: PathBuf,
    pub posts_directory: PathBuf,
    pub pages_directory: PathBuf,
    pub layouts_directory: PathBuf,

    /// Partials appended to every layout.
    pub includes_directory: PathBuf,
    pub assets_directory: PathBuf,
    pub admin_directory: PathBuf,

    /// Translations. Reserved for layouts; the build itself doesn't read it.
    pub i18n_directory: PathBuf,
    pub output_directory: PathBuf,
}

impl SiteLayout {
    pub fn new(root: &Path) -> SiteLayout {
        SiteLayout {
            root_directory: root.to_owned(),
            config_file: root.join(CONFIG_FILE),
            posts_directory: root.join("_posts"),
            pages_directory: root.join("_pages"),
            layouts_directory: root.join("_layouts"),
            includes_directory: root.join("_includes"),
            assets_directory: root.join("assets"),
            admin_directory: root.join("admin"),
            i18n_directory: root.join("_i18n"),
            output_directory: root.join("_site"),
        }
    }

    pub fn with_output_directory(mut self, output_directory: &Path) -> SiteLayout {
        self.output_directory = output_directory.to_owned();
        self
    }
}

/// The site-wide configuration, exposed to every template as `site`. It is
/// loaded once per build and never changes afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteConfig {
    pub fields: Fields,
}

impl SiteConfig {
    /// Loads the configuration at `path`. A missing file is an empty
    /// configuration, not an error.
    pub fn load(path: &Path) -> Result<SiteConfig> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SiteConfig::default())
            }
            Err(err) => {
                return Err(Error::Read {
                    path: path.to_owned(),
                    err,
                })
            }
        };
        SiteConfig::parse(&contents).map_err(|err| Error::Annotated(path.to_owned(), Box::new(err)))
    }

    pub fn parse(contents: &str) -> Result<SiteConfig> {
        if contents.trim().is_empty() {
            return Ok(SiteConfig::default());
        }
        Ok(SiteConfig {
            fields: Fields::from_yaml(serde_yaml::from_str(contents)?)?,
        })
    }
}

/// Represents the result of loading a [`SiteConfig`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a [`SiteConfig`].
#[derive(Debug)]
pub enum Error {
    /// Returned when the configuration file exists but can't be read.
    Read { path: PathBuf, err: std::io::Error },

    /// Returned when the configuration isn't valid YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when the configuration is valid YAML but not a mapping.
    NotAMapping(NotAMappingError),

    /// An error annotated with the configuration file's path.
    Annotated(PathBuf, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "Reading configuration file '{}': {}", path.display(), err)
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::NotAMapping(err) => err.fmt(f),
            Error::Annotated(path, err) => {
                write!(f, "Loading configuration '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { path: _, err } => Some(err),
            Error::DeserializeYaml(err) => Some(err),
            Error::NotAMapping(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<NotAMappingError> for Error {
    fn from(err: NotAMappingError) -> Error {
        Error::NotAMapping(err)
    }
}
