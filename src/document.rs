//! Defines [`Document`] and the logic for reading a source file into one:
//! splitting the YAML front matter from the Markdown body and rendering the
//! body to HTML (see [`crate::markdown`]).

use crate::markdown;
use crate::value::{Fields, NotAMappingError};
use std::fmt;
use std::path::Path;

/// A parsed source document.
#[derive(Debug)]
pub struct Document {
    /// The front matter. Empty when the document has none.
    pub metadata: Fields,

    /// `Key: value` metadata embedded at the top of the Markdown body.
    pub embedded: Fields,

    /// The rendered body.
    pub html: String,
}

impl Document {
    /// Reads and parses the document at `path`.
    pub fn from_file(path: &Path) -> Result<Document> {
        let contents = std::fs::read_to_string(path)?;
        Document::parse(&contents)
    }

    /// Parses a document from its text. The front matter, if present, must be
    /// fenced by lines consisting only of `---`:
    ///
    /// ```md
    /// ---
    /// layout: post
    /// date: 2021-04-16
    /// ---
    /// # Hello
    /// ```
    pub fn parse(input: &str) -> Result<Document> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let (frontmatter, body) = split_frontmatter(input)?;
        let metadata = match frontmatter {
            Some(yaml) if !yaml.trim().is_empty() => {
                Fields::from_yaml(serde_yaml::from_str(yaml)?)?
            }
            _ => Fields::new(),
        };
        let (embedded, html) = markdown::to_html(body)?;
        Ok(Document {
            metadata,
            embedded,
            html,
        })
    }

    pub fn layout(&self) -> Option<String> {
        self.metadata.get_scalar("layout")
    }

    pub fn date(&self) -> Option<String> {
        self.metadata.get_scalar("date")
    }

    pub fn permalink(&self) -> Option<String> {
        self.metadata.get_scalar("permalink")
    }
}

const FENCE: &str = "---";

fn is_fence(line: &str) -> bool {
    line.trim_end() == FENCE
}

/// Splits `input` into its (optional) front matter and body.
fn split_frontmatter(input: &str) -> Result<(Option<&str>, &str)> {
    let mut lines = input.split_inclusive('\n');
    match lines.next() {
        Some(first) if is_fence(first) => {
            let yaml_start = first.len();
            let mut offset = yaml_start;
            for line in lines {
                if is_fence(line) {
                    return Ok((Some(&input[yaml_start..offset]), &input[offset + line.len()..]));
                }
                offset += line.len();
            }
            Err(Error::FrontmatterMissingEndFence)
        }
        _ => Ok((None, input)),
    }
}

/// Represents the result of a [`Document`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Document`].
#[derive(Debug)]
pub enum Error {
    /// Returned when the front matter's opening fence (`---`) has no matching
    /// closing fence.
    FrontmatterMissingEndFence,

    /// Returned when the front matter isn't valid YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when the front matter is valid YAML but not a mapping.
    NotAMapping(NotAMappingError),

    /// Returned when the source file can't be read.
    Io(std::io::Error),

    /// Returned when the body can't be rendered.
    Markdown(markdown::Error),
}

impl Error {
    /// Whether the error means the source file doesn't exist.
    pub fn is_missing_file(&self) -> bool {
        matches!(self, Error::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingEndFence => {
                write!(f, "Front matter is missing its closing `---`")
            }
            Error::DeserializeYaml(err) => write!(f, "Invalid front matter: {}", err),
            Error::NotAMapping(err) => write!(f, "Invalid front matter: {}", err),
            Error::Io(err) => err.fmt(f),
            Error::Markdown(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::NotAMapping(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Markdown(err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<NotAMappingError> for Error {
    fn from(err: NotAMappingError) -> Error {
        Error::NotAMapping(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<markdown::Error> for Error {
    fn from(err: markdown::Error) -> Error {
        Error::Markdown(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_with_frontmatter() -> Result<()> {
        let doc = Document::parse("---\nlayout: note\ndate: 2023-05-01\ntitle: Hi\n---\nHello *world*\n")?;
        assert_eq!(Some("note".to_owned()), doc.layout());
        assert_eq!(Some("2023-05-01".to_owned()), doc.date());
        assert_eq!(None, doc.permalink());
        assert_eq!(Some("Hi".to_owned()), doc.metadata.get_scalar("title"));
        assert_eq!("<p>Hello <em>world</em></p>\n", doc.html);
        Ok(())
    }

    #[test]
    fn test_parse_without_frontmatter() -> Result<()> {
        let doc = Document::parse("# Title\n\nBody text\n")?;
        assert!(doc.metadata.is_empty());
        assert!(doc.html.contains("Body text"));
        Ok(())
    }

    #[test]
    fn test_parse_empty_frontmatter() -> Result<()> {
        let doc = Document::parse("---\n---\nBody\n")?;
        assert!(doc.metadata.is_empty());
        assert_eq!("<p>Body</p>\n", doc.html);
        Ok(())
    }

    #[test]
    fn test_parse_ignores_byte_order_mark() -> Result<()> {
        let doc = Document::parse("\u{feff}---\npermalink: x.html\n---\nBody\n")?;
        assert_eq!(Some("x.html".to_owned()), doc.permalink());
        Ok(())
    }

    #[test]
    fn test_dashes_inside_frontmatter_values() -> Result<()> {
        let doc = Document::parse("---\ntitle: a---b\n---\nBody\n")?;
        assert_eq!(Some("a---b".to_owned()), doc.metadata.get_scalar("title"));
        Ok(())
    }

    #[test]
    fn test_missing_end_fence() {
        match Document::parse("---\ntitle: Hi\n\nBody\n") {
            Err(Error::FrontmatterMissingEndFence) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_yaml() {
        match Document::parse("---\ntitle: [unclosed\n---\nBody\n") {
            Err(Error::DeserializeYaml(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_mapping_frontmatter() {
        match Document::parse("---\n- a\n- b\n---\nBody\n") {
            Err(Error::NotAMapping(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = Document::from_file(Path::new("./does/not/exist.md")).unwrap_err();
        assert!(err.is_missing_file());
    }
}
