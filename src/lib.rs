//! The library code for the `inkpress` static site generator. A build takes a
//! project directory and produces a static HTML tree in its output directory
//! (`_site` by default):
//!
//! 1. Load the site configuration ([`crate::config`])
//! 2. Copy static assets and whitelisted root files ([`crate::copy`])
//! 3. Render posts and pages ([`crate::document`]) through their layouts
//!    ([`crate::layout`]) and write them to their routes ([`crate::route`],
//!    [`crate::write`])
//! 4. Copy the prebuilt fragment pages and the admin panel
//!
//! Of these, rendering is the more involved step. Each source file is split
//! into YAML front matter and a Markdown body; the body is converted to HTML
//! ([`crate::markdown`], [`crate::htmlrenderer`]) and the layout named by the
//! front matter wraps it. Posts are addressed by date
//! (`{year}/{month}/{day}/{slug}.html`) and pages by their `permalink`.
//!
//! [`crate::build::build_site`] ties the steps together.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod copy;
pub mod document;
pub mod htmlrenderer;
pub mod layout;
pub mod markdown;
pub mod route;
pub mod value;
pub mod write;
