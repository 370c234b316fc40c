//! Page images.
//!
//! `image` names a picture relative to the page and is resolved to a page
//! reference. A page without one picks up an image file sharing its name:
//!
//! ```text
//! blog/trip.md    image → blog/trip.jpg   (same name)
//! blog/other.md   image: photos/a.png     (explicit, resolved from blog/)
//! ```

use crate::{
    feature::{Analysis, Feature},
    graph::{PageKey, PageKind},
    log,
    meta::{Field, Value},
    scan::join_rel,
};
use anyhow::Result;

/// Extensions recognized for same-name images, in preference order.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "gif", "svg"];

pub struct Images;

impl Feature for Images {
    fn name(&self) -> &'static str {
        "images"
    }

    fn runs_after(&self) -> &[&'static str] {
        &["syndication"]
    }

    fn fields(&self) -> Vec<Field> {
        vec![Field::local(
            "image",
            "Image of the page, relative to it; defaults to an image with the same name",
        )]
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let graph = &mut *cx.graph;
        let mut found: Vec<(PageKey, Option<PageKey>)> = Vec::new();

        for page in graph.pages() {
            if let Some(image) = page.meta.get("image") {
                match graph.resolve_value(page.key.as_str(), image) {
                    Ok(target) => found.push((page.key.clone(), Some(target))),
                    Err(err) => {
                        cx.report
                            .warn(page.key.as_str(), format!("image skipped: {err}"));
                        found.push((page.key.clone(), None));
                    }
                }
                continue;
            }
            if page.kind == PageKind::Asset || !page.is_source_backed() {
                continue;
            }
            let same_name = IMAGE_EXTENSIONS
                .iter()
                .map(|ext| join_rel(page.key.dir(), &format!("{}.{ext}", page.key.stem())))
                .find(|path| graph.get(path).is_some_and(|p| p.kind == PageKind::Asset));
            if let Some(path) = same_name {
                found.push((page.key.clone(), Some(PageKey::new(path))));
            }
        }

        let mut count = 0;
        for (key, image) in found {
            let Some(page) = graph.get_mut(key.as_str()) else {
                continue;
            };
            match image {
                Some(target) => {
                    page.meta.set("image", Value::Page(target));
                    count += 1;
                }
                None => {
                    page.meta.remove("image");
                }
            }
        }

        if count > 0 {
            log!("images"; "{count} pages with an image");
        }
        Ok(())
    }
}
