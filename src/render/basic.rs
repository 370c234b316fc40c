//! Built-in renderer: plain HTML, RSS/Atom feeds, redirects, and assets.
//!
//! | Kind | Output |
//! |------|--------|
//! | markdown, data, taxonomy, category, archive, dir | HTML document |
//! | rss feed | RSS 2.0 via the `rss` crate |
//! | atom feed | Atom 1.0 |
//! | alias | meta-refresh redirect |
//! | asset | verbatim copy |

use super::{Output, PageRef, RenderContext, Renderer};
use crate::graph::{FeedFormat, Page, PageKind};
use anyhow::{Result, anyhow, bail};
use chrono::DateTime;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// List sections shown below the body, in order.
const LISTS: &[(&str, &str)] = &[
    ("pages", "Pages"),
    ("subdirs", "Sections"),
    ("categories", "Categories"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicRenderer;

impl Renderer for BasicRenderer {
    fn render(&self, page: &Page, cx: &RenderContext) -> Result<Output> {
        match &page.kind {
            PageKind::Asset => match &page.source {
                Some(source) => Ok(Output::Copy(source.abs.clone())),
                None => bail!("asset has no source file"),
            },
            PageKind::Feed(FeedFormat::Rss) => rss_feed(cx).map(into_bytes),
            PageKind::Feed(FeedFormat::Atom) => Ok(into_bytes(atom_feed(cx))),
            PageKind::Alias { .. } => redirect(cx).map(into_bytes),
            _ => Ok(into_bytes(html_page(cx))),
        }
    }
}

fn into_bytes(text: String) -> Output {
    Output::Bytes(text.into_bytes())
}

// ============================================================================
// HTML
// ============================================================================

fn html_page(cx: &RenderContext) -> String {
    let title = cx.title();
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape(title)));
    if let Some(description) = cx.get_str("description") {
        html.push_str(&format!(
            "<meta name=\"description\" content=\"{}\">\n",
            escape(description)
        ));
    }
    for (name, mime) in [
        ("rss_feed", "application/rss+xml"),
        ("atom_feed", "application/atom+xml"),
    ] {
        if let Some(feed) = cx.related(name) {
            html.push_str(&format!(
                "<link rel=\"alternate\" type=\"{mime}\" title=\"{}\" href=\"{}\">\n",
                escape(&feed.title),
                escape(&feed.url)
            ));
        }
    }
    html.push_str("</head>\n<body>\n");

    let nav = cx.page_refs("nav");
    if !nav.is_empty() {
        html.push_str("<nav>\n");
        html.push_str(&link_list(&nav));
        html.push_str("</nav>\n");
    }

    html.push_str("<main>\n");
    match &cx.body {
        Some(body) => html.push_str(body),
        None => html.push_str(&format!("<h1>{}</h1>\n", escape(title))),
    }
    for (name, heading) in LISTS {
        let refs = cx.page_refs(name);
        if !refs.is_empty() {
            html.push_str(&format!("<h2>{heading}</h2>\n"));
            html.push_str(&link_list(&refs));
        }
    }
    if let Some(series) = cx.meta.get("series_info") {
        html.push_str(&series_links(series));
    }
    if let Some(archive) = cx.related("archive") {
        html.push_str(&format!(
            "<p><a href=\"{}\">Archive</a></p>\n",
            escape(&archive.url)
        ));
    }
    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn link_list(refs: &[PageRef]) -> String {
    let mut html = String::from("<ul>\n");
    for r in refs {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape(&r.url),
            escape(&r.title)
        ));
    }
    html.push_str("</ul>\n");
    html
}

fn series_links(info: &serde_json::Value) -> String {
    let link = |name: &str, label: &str| -> Option<String> {
        let r: PageRef = serde_json::from_value(info.get(name)?.clone()).ok()?;
        Some(format!(
            "<a rel=\"{name}\" href=\"{}\">{label}: {}</a>",
            escape(&r.url),
            escape(&r.title)
        ))
    };
    let links: Vec<String> = [link("prev", "Previous"), link("next", "Next")]
        .into_iter()
        .flatten()
        .collect();
    let title = info.get("title").and_then(|t| t.as_str()).unwrap_or_default();
    format!(
        "<nav class=\"series\"><p>{}</p>{}</nav>\n",
        escape(title),
        links.join(" ")
    )
}

fn redirect(cx: &RenderContext) -> Result<String> {
    let target = cx
        .page_refs("page")
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("redirect target is gone"))?;
    let url = escape(&target.url);
    Ok(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n\
         <link rel=\"canonical\" href=\"{url}\">\n\
         <meta http-equiv=\"refresh\" content=\"0; url={url}\">\n\
         </head>\n<body>\n<p><a href=\"{url}\">{}</a></p>\n</body>\n</html>\n",
        escape(&target.title),
        escape(&target.title)
    ))
}

// ============================================================================
// Feeds
// ============================================================================

/// The page a feed belongs to, falling back to the feed itself.
fn feed_home(cx: &RenderContext) -> String {
    let url = cx
        .page_refs("index")
        .into_iter()
        .next()
        .map_or_else(|| cx.url.clone(), |index| index.url);
    cx.absolute(&url)
}

fn rss_feed(cx: &RenderContext) -> Result<String> {
    let items: Vec<rss::Item> = cx
        .page_refs("pages")
        .into_iter()
        .map(|page| {
            let link = cx.absolute(&page.url);
            let pub_date = page
                .date
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.to_rfc2822());
            ItemBuilder::default()
                .title(Some(page.title))
                .link(Some(link.clone()))
                .guid(GuidBuilder::default().permalink(true).value(link).build())
                .pub_date(pub_date)
                .build()
        })
        .collect();

    let channel = ChannelBuilder::default()
        .title(cx.title())
        .link(feed_home(cx))
        .description(cx.get_str("description").unwrap_or(cx.title()))
        .generator("folio".to_string())
        .items(items)
        .build();

    // Links are only absolute, and thus valid, with a site URL.
    if !cx.site_url.is_empty() {
        channel
            .validate()
            .map_err(|e| anyhow!("rss validation failed: {e}"))?;
    }
    Ok(channel.to_string())
}

fn atom_feed(cx: &RenderContext) -> String {
    let home = feed_home(cx);
    let updated = cx.get_str("date").unwrap_or("1970-01-01T00:00:00+00:00");
    let mut xml = String::with_capacity(4096);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<feed xmlns="{ATOM_NS}">"#));
    xml.push('\n');
    xml.push_str(&format!("  <title>{}</title>\n", escape(cx.title())));
    xml.push_str(&format!("  <id>{}</id>\n", escape(&home)));
    xml.push_str(&format!("  <link href=\"{}\"/>\n", escape(&home)));
    xml.push_str(&format!(
        "  <link rel=\"self\" href=\"{}\"/>\n",
        escape(&cx.absolute(&cx.url))
    ));
    xml.push_str(&format!("  <updated>{}</updated>\n", escape(updated)));

    for page in cx.page_refs("pages") {
        let link = escape(&cx.absolute(&page.url));
        xml.push_str("  <entry>\n");
        xml.push_str(&format!("    <title>{}</title>\n", escape(&page.title)));
        xml.push_str(&format!("    <id>{link}</id>\n"));
        xml.push_str(&format!("    <link href=\"{link}\"/>\n"));
        let date = page.date.as_deref().unwrap_or(updated);
        xml.push_str(&format!("    <updated>{}</updated>\n", escape(date)));
        xml.push_str("  </entry>\n");
    }

    xml.push_str("</feed>\n");
    xml
}

/// Escape special XML/HTML characters.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::testing::{add, graph},
        graph::{Page, PageGraph, PageKey, PageState},
        meta::{MetaTable, Value},
        scan::{DirId, DirTree},
        site::{BuildReport, Site},
    };
    use std::fs;
    use tempfile::TempDir;

    fn bytes(output: Output) -> String {
        match output {
            Output::Bytes(bytes) => String::from_utf8(bytes).unwrap(),
            Output::Copy(path) => panic!("unexpected copy of {}", path.display()),
        }
    }

    fn render(g: &PageGraph, key: &str) -> String {
        let page = g.get(key).unwrap();
        bytes(BasicRenderer.render(page, &RenderContext::new(g, page)).unwrap())
    }

    fn blog_with_feeds(site_url: Option<&str>) -> PageGraph {
        let mut root = MetaTable::new();
        root.set("site_name", "Notes");
        if let Some(url) = site_url {
            root.set("site_url", url);
        }
        let mut g = PageGraph::new(
            DirTree::single(root),
            crate::features::default_registry(&[]).fields(),
        );
        add(&mut g, "blog/index.md", Some("2021-01-01"));
        add(&mut g, "blog/a.md", Some("2021-02-01"));
        g.get_mut("blog/a.md").unwrap().meta.set("title", "A & B");
        let list = Value::List(vec![Value::Page(PageKey::new("blog/a.md"))]);
        for (key, format) in [("blog/index.rss", FeedFormat::Rss), ("blog/index.atom", FeedFormat::Atom)] {
            let mut feed = Page::derived(
                PageKey::new(key),
                PageKind::Feed(format),
                DirId::ROOT,
                &PageKey::new("blog/index.md"),
            );
            feed.meta.set("title", "Blog");
            feed.meta.set("pages", list.clone());
            feed.meta.set("index", PageKey::new("blog/index.md"));
            g.insert(feed).unwrap();
        }
        g
    }

    #[test]
    fn test_html_escapes_and_lists() {
        let mut g = graph();
        add(&mut g, "blog/index.md", None);
        add(&mut g, "blog/a.md", None);
        let index = g.get_mut("blog/index.md").unwrap();
        index.meta.set("title", "<Blog>");
        index.meta.set("pages", Value::List(vec![Value::Page(PageKey::new("blog/a.md"))]));

        let html = render(&g, "blog/index.md");
        assert!(html.contains("<title>&lt;Blog&gt;</title>"));
        assert!(html.contains("<h1>&lt;Blog&gt;</h1>"));
        assert!(html.contains("<a href=\"/blog/a/\">a</a>"));
    }

    #[test]
    fn test_rss_feed() {
        let g = blog_with_feeds(Some("https://example.org"));
        let xml = render(&g, "blog/index.rss");
        assert!(xml.contains("<title>Blog</title>"));
        assert!(xml.contains("<link>https://example.org/blog/</link>"));
        assert!(xml.contains("https://example.org/blog/a/"));
        assert!(xml.contains("A &amp; B"));
    }

    #[test]
    fn test_rss_without_site_url_skips_validation() {
        let g = blog_with_feeds(None);
        let xml = render(&g, "blog/index.rss");
        assert!(xml.contains("<link>/blog/</link>"));
    }

    #[test]
    fn test_atom_feed() {
        let g = blog_with_feeds(Some("https://example.org/"));
        let xml = render(&g, "blog/index.atom");
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<title>A &amp; B</title>"));
        assert!(xml.contains("<link rel=\"self\" href=\"https://example.org/blog/index.atom\"/>"));
        assert!(xml.contains("<updated>2021-02-01T00:00:00+00:00</updated>"));
    }

    #[test]
    fn test_alias_redirect() {
        let mut g = graph();
        add(&mut g, "page.md", None);
        let target = PageKey::new("page.md");
        let mut alias = Page::derived(
            PageKey::new("old"),
            PageKind::Alias {
                target: target.clone(),
            },
            DirId::ROOT,
            &target,
        );
        alias.meta.set("page", target);
        g.insert(alias).unwrap();
        let html = render(&g, "old");
        assert!(html.contains("content=\"0; url=/page/\""));
    }

    #[test]
    fn test_assets_are_copied() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let logo = src.path().join("logo.png");
        fs::write(&logo, b"\x89PNG").unwrap();

        let mut g = graph();
        let mut asset = Page::new(PageKey::new("img/logo.png"), PageKind::Asset, DirId::ROOT);
        asset.source = Some(crate::graph::Source {
            abs: logo,
            mtime: chrono::Utc::now(),
        });
        asset.advance(PageState::Loaded);
        g.insert(asset).unwrap();

        let mut site = Site {
            graph: g,
            report: BuildReport::quiet(),
        };
        let summary = site.render(&BasicRenderer, out.path());
        assert_eq!(summary.failed, 0);
        assert_eq!(fs::read(out.path().join("img/logo.png")).unwrap(), b"\x89PNG");
    }
}
