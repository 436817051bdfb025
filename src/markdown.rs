//! Converts a document body from Markdown to HTML. On top of the extended
//! syntax that [`pulldown_cmark`] offers (tables, footnotes, strikethrough,
//! task lists) this handles:
//!
//! * `Key: value` metadata lines at the top of the body, which are removed
//!   from the output and returned separately;
//! * heading ids, and a `[TOC]` paragraph that is replaced by a nested list
//!   linking to every heading.

use crate::htmlrenderer::{self, EscapeHtml};
use crate::value::Fields;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};
use regex::Regex;
use serde_yaml::Value as Yaml;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::OnceLock;

const TOC_MARKER: &str = "[TOC]";

/// A heading found in the document, with the id its element will carry.
#[derive(Debug, PartialEq)]
pub struct Heading {
    pub level: u32,
    pub id: String,
    pub text: String,
}

/// Converts `markdown` to HTML. Returns the embedded metadata that was
/// stripped from the top of the body together with the HTML.
pub fn to_html(markdown: &str) -> Result<(Fields, String), Error> {
    let (embedded, body) = split_embedded_meta(markdown);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let events: Vec<Event> = Parser::new_ext(body, options).collect();
    let headings = collect_headings(&events);
    let events = replace_toc_markers(events, &headings);

    let mut html = String::with_capacity(body.len() * 3 / 2);
    htmlrenderer::push_html(&mut html, events.into_iter(), &headings)?;
    Ok((embedded, html))
}

fn meta_line() -> &'static Regex {
    static META: OnceLock<Regex> = OnceLock::new();
    META.get_or_init(|| {
        Regex::new(r"^[ ]{0,3}([A-Za-z0-9_-]+):\s*(.*)$").expect("metadata pattern is valid")
    })
}

/// Splits leading `Key: value` lines off `body`. A value may continue on
/// following lines indented by at least four spaces. The block ends at the
/// first blank line (which is consumed) or the first line that is neither a
/// key nor a continuation (which is kept). Keys are lower-cased.
fn split_embedded_meta(body: &str) -> (Fields, &str) {
    fn flush(fields: &mut Fields, entry: Option<(String, String)>) {
        if let Some((key, value)) = entry {
            let value = match fields.get_scalar(&key) {
                Some(previous) => format!("{}\n{}", previous, value),
                None => value,
            };
            fields.insert(key, Yaml::String(value));
        }
    }

    let mut fields = Fields::new();
    let mut current: Option<(String, String)> = None;
    let mut consumed = 0;
    for line in body.split_inclusive('\n') {
        let content = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
        if content.trim().is_empty() {
            consumed += line.len();
            break;
        }
        if let Some(caps) = meta_line().captures(content) {
            flush(&mut fields, current.take());
            current = Some((caps[1].to_lowercase(), caps[2].trim().to_owned()));
        } else if let (true, Some((_, value))) = (content.starts_with("    "), current.as_mut()) {
            value.push('\n');
            value.push_str(content.trim());
        } else {
            break;
        }
        consumed += line.len();
    }
    flush(&mut fields, current);
    (fields, &body[consumed..])
}

/// Collects every heading in `events`, assigning each a slug id that is unique
/// within the document. Repeated slugs get `_1`, `_2`, ... appended.
fn collect_headings(events: &[Event]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut current: Option<(u32, String)> = None;
    for event in events {
        match event {
            Event::Start(Tag::Heading(level)) => current = Some((*level, String::new())),
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, heading_text)) = current.as_mut() {
                    heading_text.push_str(text);
                }
            }
            Event::End(Tag::Heading(_)) => {
                if let Some((level, text)) = current.take() {
                    let id = unique_id(&text, &mut used);
                    headings.push(Heading { level, id, text });
                }
            }
            _ => {}
        }
    }
    headings
}

fn unique_id(text: &str, used: &mut HashSet<String>) -> String {
    let base = match slug::slugify(text) {
        s if s.is_empty() => String::from("section"),
        s => s,
    };
    let mut id = base.clone();
    let mut n = 1;
    while used.contains(&id) {
        id = format!("{}_{}", base, n);
        n += 1;
    }
    used.insert(id.clone());
    id
}

/// If `events[start]` opens a paragraph holding nothing but `[TOC]`, returns
/// the index of the event closing it.
fn toc_marker_end(events: &[Event], start: usize) -> Option<usize> {
    if !matches!(events.get(start), Some(Event::Start(Tag::Paragraph))) {
        return None;
    }
    let mut text = String::new();
    for (offset, event) in events[start + 1..].iter().enumerate() {
        match event {
            Event::Text(t) => text.push_str(t),
            Event::End(Tag::Paragraph) if text.trim() == TOC_MARKER => {
                return Some(start + 1 + offset)
            }
            _ => return None,
        }
    }
    None
}

fn replace_toc_markers<'a>(events: Vec<Event<'a>>, headings: &[Heading]) -> Vec<Event<'a>> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < events.len() {
        match toc_marker_end(&events, i) {
            Some(end) => {
                spans.push((i, end));
                i = end + 1;
            }
            None => i += 1,
        }
    }
    if spans.is_empty() {
        return events;
    }

    let toc = render_toc(headings);
    let mut spans = spans.into_iter().peekable();
    let mut out = Vec::with_capacity(events.len());
    for (i, event) in events.into_iter().enumerate() {
        match spans.peek() {
            Some(&(start, end)) if i >= start => {
                if i == start {
                    out.push(Event::Html(CowStr::from(toc.clone())));
                }
                if i == end {
                    spans.next();
                }
            }
            _ => out.push(event),
        }
    }
    out
}

/// Renders the table of contents as nested lists following heading levels.
fn render_toc(headings: &[Heading]) -> String {
    let mut out = String::from(r#"<div class="toc">"#);
    let mut levels: Vec<u32> = Vec::new();
    for heading in headings {
        while let Some(&top) = levels.last() {
            if top <= heading.level {
                break;
            }
            out.push_str("</li></ul>");
            levels.pop();
        }
        match levels.last() {
            Some(&top) if top == heading.level => out.push_str("</li>"),
            _ => {
                out.push_str("<ul>");
                levels.push(heading.level);
            }
        }
        out.push_str(&format!(
            r##"<li><a href="#{}">{}</a>"##,
            EscapeHtml(&heading.id),
            EscapeHtml(&heading.text)
        ));
    }
    for _ in levels {
        out.push_str("</li></ul>");
    }
    out.push_str("</div>\n");
    out
}

/// Represents an error converting markdown to HTML.
#[derive(Debug)]
pub enum Error {
    /// Returned when writing the HTML fails.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "Rendering markdown: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts a [`io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for IO operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
