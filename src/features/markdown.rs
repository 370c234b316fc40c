//! Markdown documents.
//!
//! `*.md` files become pages. `index.md` and `README.md` additionally feed
//! their directory: inheritable front matter keys become directory defaults,
//! under whatever the `.folio` declaration already set.
//!
//! The actual text → (body, metadata) conversion sits behind
//! [`DocumentParser`]; [`CommonMark`] is the built-in one.

use crate::{
    feature::{DirContext, Feature, LoadInput, Loaded},
    graph::PageKind,
    meta::{MetaTable, front_matter},
    scan::{DirRecord, SourceFile},
};
use anyhow::Result;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use std::fs;

/// Result of parsing one document.
#[derive(Debug, Default)]
pub struct Parsed {
    pub body: String,
    pub meta: MetaTable,
    /// Text of the first level-1 heading.
    pub title: Option<String>,
    /// Recoverable problems, e.g. malformed front matter.
    pub warnings: Vec<String>,
}

pub trait DocumentParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Parsed>;
}

/// CommonMark with tables, footnotes, strikethrough and task lists.
pub struct CommonMark;

impl DocumentParser for CommonMark {
    fn parse(&self, text: &str) -> Result<Parsed> {
        let mut parsed = Parsed::default();
        let source = match front_matter::split(text) {
            Ok(split) => {
                parsed.meta = split.meta.unwrap_or_default();
                split.body
            }
            Err(err) => {
                parsed.warnings.push(format!("front matter ignored: {err}"));
                text
            }
        };

        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut in_title = false;
        let mut title = String::new();
        let events: Vec<Event> = Parser::new_ext(source, options)
            .inspect(|event| match event {
                Event::Start(Tag::Heading {
                    level: HeadingLevel::H1,
                    ..
                }) if title.is_empty() => in_title = true,
                Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_title => in_title = false,
                Event::Text(text) | Event::Code(text) if in_title => title.push_str(text),
                _ => {}
            })
            .collect();

        html::push_html(&mut parsed.body, events.into_iter());
        let title = title.trim();
        if !title.is_empty() {
            parsed.title = Some(title.to_owned());
        }
        Ok(parsed)
    }
}

// ============================================================================
// Feature
// ============================================================================

pub struct Markdown {
    parser: Box<dyn DocumentParser>,
}

impl Markdown {
    pub fn new(parser: impl DocumentParser + 'static) -> Self {
        Self {
            parser: Box::new(parser),
        }
    }
}

impl Feature for Markdown {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn load_dir_meta(&self, cx: &mut DirContext) -> Result<()> {
        let Some(index) = ["index.md", "README.md"]
            .iter()
            .find_map(|name| cx.dir.file(name))
            .map(|file| file.abs.clone())
        else {
            return Ok(());
        };
        // Unreadable or malformed files are reported when the page loads.
        let Ok(text) = fs::read_to_string(&index) else {
            return Ok(());
        };
        let Ok(split) = front_matter::split(&text) else {
            return Ok(());
        };
        for (key, value) in split.meta.unwrap_or_default() {
            if cx.fields.is_inherited(&key) {
                cx.dir.meta.set_default(key, value);
            }
        }
        Ok(())
    }

    fn claims(&self, file: &SourceFile, _dir: &DirRecord) -> Option<PageKind> {
        (file.extension() == Some("md")).then_some(PageKind::Markdown)
    }

    fn load(&self, input: &LoadInput) -> Result<Option<Loaded>> {
        let text = input.read_to_string()?;
        let parsed = self.parser.parse(&text)?;
        for warning in parsed.warnings {
            input.report.warn(&input.file.rel, warning);
        }

        let mut meta = parsed.meta;
        if let Some(title) = parsed.title {
            meta.set_default("title", title);
        }
        meta.set_default("indexed", true);
        Ok(Some(Loaded {
            meta,
            body: Some(parsed.body),
        }))
    }
}
