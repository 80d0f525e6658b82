//! The live document the renderer inserts into.
//!
//! [`Document`] is the seam a host implements (a browser binding, a UI toolkit, ...).
//! [`HtmlDocument`] is a headless implementation backed by an HTML string and `lol_html`
//! rewriting; the CLI and the test-suite use it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, Selector, element, rewrite_str};

use crate::error::DocumentError;
use crate::markup::escape_attr;

pub type Result<T> = std::result::Result<T, DocumentError>;

/// An outermost `<svg>` element found inside a container, serialized as markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgElement {
    pub markup: String,
    pub width: Option<String>,
    pub height: Option<String>,
}

/// Element-level operations the renderer and hooks need. Elements are addressed by id.
pub trait Document {
    /// Appends `html` as the last children of the element `parent_id`.
    fn append_html(&mut self, parent_id: &str, html: &str) -> Result<()>;

    fn contains(&self, id: &str) -> bool;

    /// Returns `None` when no element has this id.
    fn inner_html(&self, id: &str) -> Option<String>;

    fn set_inner_html(&mut self, id: &str, html: &str) -> Result<()>;

    fn remove(&mut self, id: &str) -> Result<()>;

    /// The `<svg>` elements anywhere inside `id`, in document order. An `<svg>` nested in
    /// another one is part of its parent's markup and is not listed separately.
    fn svg_elements(&self, id: &str) -> Result<Vec<SvgElement>>;

    /// The decoded `data-value` of `id` or of its nearest ancestor carrying one, looked up
    /// only inside the element `within`.
    fn closest_value(&self, within: &str, id: &str) -> Option<String>;
}

const BEGIN_MARK: &str = "<!--quire:begin-->";
const END_MARK: &str = "<!--quire:end-->";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlDocument {
    html: String,
}

impl HtmlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    /// A document holding a single empty `<div>` host element.
    pub fn with_host(id: &str) -> Self {
        Self::from_html(format!(r#"<div id="{}"></div>"#, escape_attr(id)))
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    /// Decoded `data-value` attributes in document order.
    pub fn value_attributes(&self) -> Vec<String> {
        let values = Rc::new(RefCell::new(Vec::new()));
        let result = rewrite_str(
            &self.html,
            RewriteStrSettings {
                element_content_handlers: vec![element!("[data-value]", {
                    let values = Rc::clone(&values);
                    move |el| {
                        if let Some(raw) = el.get_attribute("data-value") {
                            values.borrow_mut().push(htmlize::unescape(raw).into_owned());
                        }
                        Ok(())
                    }
                })],
                ..RewriteStrSettings::new()
            },
        );
        if result.is_err() {
            return Vec::new();
        }
        values.take()
    }

    fn rewrite_by_id(
        &self,
        id: &str,
        apply: impl Fn(&mut lol_html::html_content::Element<'_, '_>),
    ) -> Result<(String, bool)> {
        let selector = id_selector(id)?;
        let matched = Rc::new(Cell::new(false));
        let out = rewrite_str(
            &self.html,
            RewriteStrSettings {
                element_content_handlers: vec![element!(selector.as_str(), {
                    let matched = Rc::clone(&matched);
                    move |el| {
                        // Ids are unique; only the first match counts.
                        if !matched.replace(true) {
                            apply(el);
                        }
                        Ok(())
                    }
                })],
                ..RewriteStrSettings::new()
            },
        )
        .map_err(|err| DocumentError::Rewrite {
            message: err.to_string(),
        })?;
        Ok((out, matched.get()))
    }

    fn commit(&mut self, id: &str, (out, matched): (String, bool)) -> Result<()> {
        if !matched {
            return Err(DocumentError::ElementNotFound { id: id.to_string() });
        }
        self.html = out;
        Ok(())
    }
}

impl Document for HtmlDocument {
    fn append_html(&mut self, parent_id: &str, html: &str) -> Result<()> {
        let rewritten = self.rewrite_by_id(parent_id, |el| el.append(html, ContentType::Html))?;
        self.commit(parent_id, rewritten)
    }

    fn contains(&self, id: &str) -> bool {
        self.rewrite_by_id(id, |_| {})
            .map(|(_, matched)| matched)
            .unwrap_or(false)
    }

    fn inner_html(&self, id: &str) -> Option<String> {
        let (out, matched) = self
            .rewrite_by_id(id, |el| {
                el.prepend(BEGIN_MARK, ContentType::Html);
                el.append(END_MARK, ContentType::Html);
            })
            .ok()?;
        if !matched {
            return None;
        }
        let start = out.find(BEGIN_MARK)? + BEGIN_MARK.len();
        let end = start + out[start..].rfind(END_MARK)?;
        Some(out[start..end].to_string())
    }

    fn set_inner_html(&mut self, id: &str, html: &str) -> Result<()> {
        let rewritten =
            self.rewrite_by_id(id, |el| el.set_inner_content(html, ContentType::Html))?;
        self.commit(id, rewritten)
    }

    fn remove(&mut self, id: &str) -> Result<()> {
        let rewritten = self.rewrite_by_id(id, |el| el.remove())?;
        self.commit(id, rewritten)
    }

    fn svg_elements(&self, id: &str) -> Result<Vec<SvgElement>> {
        let container = id_selector(id)?;
        let descendants = format!("{container} svg");
        let found = Rc::new(Cell::new(false));
        let attrs = Rc::new(RefCell::new(Vec::new()));

        let out = rewrite_str(
            &self.html,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!(container.as_str(), {
                        let found = Rc::clone(&found);
                        move |_| {
                            found.set(true);
                            Ok(())
                        }
                    }),
                    element!(descendants.as_str(), {
                        let attrs = Rc::clone(&attrs);
                        move |el| {
                            let mut attrs = attrs.borrow_mut();
                            let n = attrs.len();
                            el.before(&svg_begin_mark(n), ContentType::Html);
                            el.after(&svg_end_mark(n), ContentType::Html);
                            attrs.push((el.get_attribute("width"), el.get_attribute("height")));
                            Ok(())
                        }
                    }),
                ],
                ..RewriteStrSettings::new()
            },
        )
        .map_err(|err| DocumentError::Rewrite {
            message: err.to_string(),
        })?;

        if !found.get() {
            return Err(DocumentError::ElementNotFound { id: id.to_string() });
        }

        let attrs = attrs.take();
        let mut svgs = Vec::new();
        let mut outer_end = 0;
        for (n, (width, height)) in attrs.iter().enumerate() {
            let begin = svg_begin_mark(n);
            let end = svg_end_mark(n);
            let Some(start) = out.find(&begin).map(|i| i + begin.len()) else {
                continue;
            };
            // Nested inside the previous outermost svg.
            if start < outer_end {
                continue;
            }
            let Some(stop) = out[start..].find(&end).map(|i| start + i) else {
                continue;
            };
            outer_end = stop;
            let mut markup = out[start..stop].to_string();
            for inner in n + 1..attrs.len() {
                markup = markup
                    .replace(&svg_begin_mark(inner), "")
                    .replace(&svg_end_mark(inner), "");
            }
            svgs.push(SvgElement {
                markup,
                width: width.clone(),
                height: height.clone(),
            });
        }
        Ok(svgs)
    }

    fn closest_value(&self, within: &str, id: &str) -> Option<String> {
        let region = id_selector(within).ok()?;
        let target = id_selector(id).ok()?;
        let own = Rc::new(RefCell::new(None));
        let raw_values = Rc::new(RefCell::new(Vec::new()));

        let out = rewrite_str(
            &self.html,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!(region.as_str(), |el| {
                        el.prepend(REGION_BEGIN_MARK, ContentType::Html);
                        el.append(REGION_END_MARK, ContentType::Html);
                        Ok(())
                    }),
                    element!("[data-value]", {
                        let raw_values = Rc::clone(&raw_values);
                        move |el| {
                            let mut raw_values = raw_values.borrow_mut();
                            let n = raw_values.len();
                            el.prepend(&value_begin_mark(n), ContentType::Html);
                            el.append(&value_end_mark(n), ContentType::Html);
                            raw_values.push(el.get_attribute("data-value").unwrap_or_default());
                            Ok(())
                        }
                    }),
                    element!(target.as_str(), {
                        let own = Rc::clone(&own);
                        move |el| {
                            if own.borrow().is_none() {
                                *own.borrow_mut() = Some(el.get_attribute("data-value"));
                                el.before(TARGET_MARK, ContentType::Html);
                            }
                            Ok(())
                        }
                    }),
                ],
                ..RewriteStrSettings::new()
            },
        )
        .ok()?;

        let region_start = out.find(REGION_BEGIN_MARK)?;
        let region_end = out.rfind(REGION_END_MARK)?;
        let at = out.find(TARGET_MARK)?;
        if !(region_start < at && at < region_end) {
            return None;
        }
        if let Some(Some(raw)) = own.take() {
            return Some(htmlize::unescape(raw).into_owned());
        }

        // The innermost enclosing value element is the one that opens last before the target.
        let raw_values = raw_values.take();
        raw_values
            .iter()
            .enumerate()
            .filter_map(|(n, raw)| {
                let begin = out.find(&value_begin_mark(n))?;
                let end = out.find(&value_end_mark(n))?;
                (region_start < begin && begin < at && at < end).then_some((begin, raw))
            })
            .max_by_key(|(begin, _)| *begin)
            .map(|(_, raw)| htmlize::unescape(raw.as_str()).into_owned())
    }
}

const REGION_BEGIN_MARK: &str = "<!--quire:region-->";
const REGION_END_MARK: &str = "<!--quire:/region-->";
const TARGET_MARK: &str = "<!--quire:target-->";

fn value_begin_mark(n: usize) -> String {
    format!("<!--quire:value:{n}-->")
}

fn value_end_mark(n: usize) -> String {
    format!("<!--quire:/value:{n}-->")
}

fn svg_begin_mark(n: usize) -> String {
    format!("<!--quire:svg:{n}-->")
}

fn svg_end_mark(n: usize) -> String {
    format!("<!--quire:/svg:{n}-->")
}

fn id_selector(id: &str) -> Result<String> {
    if id.is_empty() || id.contains(['"', '\\']) {
        return Err(DocumentError::InvalidId {
            id: id.to_string(),
            message: "ids must be non-empty and must not contain quotes or backslashes"
                .to_string(),
        });
    }
    let selector = format!(r#"[id="{id}"]"#);
    selector
        .parse::<Selector>()
        .map_err(|err| DocumentError::InvalidId {
            id: id.to_string(),
            message: err.to_string(),
        })?;
    Ok(selector)
}
