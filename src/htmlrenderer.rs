//! Implements a custom [`push_html`] so that rendered documents carry the
//! markers the layouts rely on: every heading gets the `id` computed by
//! [`crate::markdown`] (the table of contents links to them) and fenced code
//! blocks are tagged with their language for client-side highlighting.

use crate::markdown::Heading;
use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, LinkType, Tag};
use std::fmt::{self, Display};
use std::io;

struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

struct EscapeHref<'a>(&'a str);

impl Display for EscapeHref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, self.0);
        adaptor.result
    }
}

pub(crate) struct EscapeHtml<'a>(pub &'a str);

impl Display for EscapeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_html(&mut adaptor, self.0);
        adaptor.result
    }
}

enum TableState {
    Head,
    Body,
}

/// Renders markdown [`Event`]s into HTML. This is largely modeled after
/// [`pulldown_cmark`]'s private `HtmlWriter` struct, including its habit of
/// starting block elements on a fresh line.
struct HtmlRenderer<'h> {
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// Headings in document order; the n-th heading event takes the n-th id.
    headings: &'h [Heading],
    heading_index: usize,

    /// Nesting depth of images whose alt text is being written.
    image_depth: usize,

    end_newline: bool,
}

impl<'h> HtmlRenderer<'h> {
    fn new(headings: &'h [Heading]) -> Self {
        HtmlRenderer {
            table_alignments: Vec::default(),
            table_state: TableState::Head,
            table_cell_index: usize::default(),
            headings,
            heading_index: usize::default(),
            image_depth: usize::default(),
            end_newline: true,
        }
    }

    fn on_event<W: StrWrite>(&mut self, w: &mut W, event: Event) -> io::Result<()> {
        if self.image_depth > 0 {
            return self.on_alt_event(w, event);
        }
        match event {
            Event::Start(tag) => self.on_start(w, tag),
            Event::End(tag) => self.on_end(w, tag),
            Event::Text(text) => self.write_escaped(w, &text),
            Event::Code(code) => {
                self.write(w, "<code>")?;
                self.write_escaped(w, &code)?;
                self.write(w, "</code>")
            }
            Event::Html(html) => self.write(w, &html),
            Event::FootnoteReference(name) => self.write(
                w,
                &format!(
                    r##"<sup class="footnote-reference"><a href="#{}">{}</a></sup>"##,
                    EscapeHtml(&name),
                    EscapeHtml(&name),
                ),
            ),
            Event::SoftBreak => self.write(w, "\n"),
            Event::HardBreak => self.write(w, "<br />\n"),
            Event::Rule => {
                self.fresh_line(w)?;
                self.write(w, "<hr />\n")
            }
            Event::TaskListMarker(checked) => self.write(
                w,
                match checked {
                    true => r#"<input disabled="" type="checkbox" checked="" />"#,
                    false => r#"<input disabled="" type="checkbox" />"#,
                },
            ),
        }
    }

    /// Handles events between the start and end of an image: only the text
    /// survives, as the `alt` attribute.
    fn on_alt_event<W: StrWrite>(&mut self, w: &mut W, event: Event) -> io::Result<()> {
        match event {
            Event::Start(Tag::Image(..)) => {
                self.image_depth += 1;
                Ok(())
            }
            Event::End(Tag::Image(_, _, title)) => {
                self.image_depth -= 1;
                if self.image_depth > 0 {
                    return Ok(());
                }
                match title.is_empty() {
                    true => self.write(w, "\" />"),
                    false => self.write(w, &format!("\" title=\"{}\" />", EscapeHtml(&title))),
                }
            }
            Event::Text(text) | Event::Code(text) => escape_html(&mut *w, &text),
            Event::SoftBreak | Event::HardBreak => w.write_str(" "),
            _ => Ok(()),
        }
    }

    fn on_start<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::Paragraph => {
                self.fresh_line(w)?;
                self.write(w, "<p>")
            }
            Tag::Heading(level) => {
                self.fresh_line(w)?;
                let headings = self.headings;
                let heading = headings.get(self.heading_index);
                self.heading_index += 1;
                match heading {
                    Some(heading) => {
                        self.write(w, &format!(r#"<h{} id="{}">"#, level, EscapeHtml(&heading.id)))
                    }
                    None => self.write(w, &format!("<h{}>", level)),
                }
            }
            Tag::BlockQuote => {
                self.fresh_line(w)?;
                self.write(w, "<blockquote>\n")
            }
            Tag::CodeBlock(kind) => {
                self.fresh_line(w)?;
                let lang = match &kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next(),
                    CodeBlockKind::Indented => None,
                };
                match lang {
                    Some(lang) => self.write(
                        w,
                        &format!(
                            r#"<pre class="codehilite"><code class="language-{}">"#,
                            EscapeHtml(lang)
                        ),
                    ),
                    None => self.write(w, r#"<pre class="codehilite"><code>"#),
                }
            }
            Tag::List(None) => {
                self.fresh_line(w)?;
                self.write(w, "<ul>\n")
            }
            Tag::List(Some(1)) => {
                self.fresh_line(w)?;
                self.write(w, "<ol>\n")
            }
            Tag::List(Some(start)) => {
                self.fresh_line(w)?;
                self.write(w, &format!("<ol start=\"{}\">\n", start))
            }
            Tag::Item => {
                self.fresh_line(w)?;
                self.write(w, "<li>")
            }
            Tag::FootnoteDefinition(name) => {
                self.fresh_line(w)?;
                let name = EscapeHtml(&name);
                self.write(
                    w,
                    &format!(
                        r#"<div class="footnote-definition" id="{}"><sup class="footnote-definition-label">{}</sup>"#,
                        &name, &name,
                    ),
                )
            }
            Tag::Emphasis => self.write(w, "<em>"),
            Tag::Strong => self.write(w, "<strong>"),
            Tag::Strikethrough => self.write(w, "<del>"),
            Tag::Image(_link_type, dest, _title) => {
                self.image_depth = 1;
                self.write(w, &format!(r#"<img src="{}" alt=""#, EscapeHref(&dest)))
            }
            Tag::Link(LinkType::Email, dest, title) => self.open_link(w, "mailto:", &dest, &title),
            Tag::Link(_link_type, dest, title) => self.open_link(w, "", &dest, &title),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                self.fresh_line(w)?;
                self.write(w, "<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                self.write(w, "<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                self.write(w, "<tr>")
            }
            Tag::TableCell => {
                let tag = format!(
                    "<{}{}>",
                    match self.table_state {
                        TableState::Head => "th",
                        TableState::Body => "td",
                    },
                    match self.table_alignments.get(self.table_cell_index) {
                        Some(Alignment::Left) => r#" style="text-align: left""#,
                        Some(Alignment::Right) => r#" style="text-align: right""#,
                        Some(Alignment::Center) => r#" style="text-align: center""#,
                        _ => "",
                    }
                );
                self.write(w, &tag)
            }
        }
    }

    fn on_end<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::Paragraph => self.write(w, "</p>\n"),
            Tag::Heading(level) => self.write(w, &format!("</h{}>\n", level)),
            Tag::BlockQuote => self.write(w, "</blockquote>\n"),
            Tag::CodeBlock(_) => self.write(w, "</code></pre>\n"),
            Tag::List(Some(_)) => self.write(w, "</ol>\n"),
            Tag::List(None) => self.write(w, "</ul>\n"),
            Tag::Item => self.write(w, "</li>\n"),
            Tag::FootnoteDefinition(_) => self.write(w, "</div>\n"),
            Tag::Emphasis => self.write(w, "</em>"),
            Tag::Strong => self.write(w, "</strong>"),
            Tag::Strikethrough => self.write(w, "</del>"),
            Tag::Image(..) => Ok(()), // closed in on_alt_event
            Tag::Link(..) => self.write(w, "</a>"),
            Tag::Table(_) => self.write(w, "</tbody></table>\n"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                self.write(w, "</tr></thead><tbody>\n")
            }
            Tag::TableRow => self.write(w, "</tr>\n"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                self.write(
                    w,
                    match self.table_state {
                        TableState::Head => "</th>",
                        TableState::Body => "</td>",
                    },
                )
            }
        }
    }

    fn open_link<W: StrWrite>(
        &mut self,
        w: &mut W,
        scheme: &str,
        dest: &CowStr,
        title: &CowStr,
    ) -> io::Result<()> {
        let mut tag = format!(r#"<a href="{}{}""#, scheme, EscapeHref(dest));
        if !title.is_empty() {
            tag.push_str(&format!(r#" title="{}""#, EscapeHtml(title)));
        }
        tag.push('>');
        self.write(w, &tag)
    }

    fn write<W: StrWrite>(&mut self, w: &mut W, s: &str) -> io::Result<()> {
        w.write_str(s)?;
        if !s.is_empty() {
            self.end_newline = s.ends_with('\n');
        }
        Ok(())
    }

    fn write_escaped<W: StrWrite>(&mut self, w: &mut W, s: &str) -> io::Result<()> {
        escape_html(&mut *w, s)?;
        if !s.is_empty() {
            self.end_newline = s.ends_with('\n');
        }
        Ok(())
    }

    fn fresh_line<W: StrWrite>(&mut self, w: &mut W) -> io::Result<()> {
        match self.end_newline {
            true => Ok(()),
            false => self.write(w, "\n"),
        }
    }
}

/// Converts [`Event`]s into an HTML string much like
/// `pulldown_cmark::html::push_html`, except that the n-th heading is given
/// the id of `headings[n]`.
pub fn push_html<'a, I>(out: &mut String, events: I, headings: &[Heading]) -> io::Result<()>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut renderer = HtmlRenderer::new(headings);
    for event in events {
        renderer.on_event(out, event)?;
    }
    Ok(())
}
