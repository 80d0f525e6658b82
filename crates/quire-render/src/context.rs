use std::rc::Rc;

use quire_core::{HookRegistry, OutputNode, RenderOptions};

use crate::chart::ChartCompiler;
use crate::math::Typesetter;
use crate::save::SaveFn;
use crate::scheduler::{CallbackQueue, MountCallback, UnmountCallback};
use crate::sink::ErrorSink;

/// Literal markup for a node whose `type` the engine does not know.
pub const UNKNOWN_RENDER_TYPE: &str = "Unknown render type";

/// The result of rendering one node: its markup and, if it customises saving, a save function.
pub struct Rendered {
    pub markup: String,
    pub save: Option<SaveFn>,
}

impl Rendered {
    pub(crate) fn markup_only(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            save: None,
        }
    }
}

/// State shared by every node renderer during one pass.
pub(crate) struct RenderContext<'a> {
    pub(crate) mount: CallbackQueue<MountCallback>,
    pub(crate) unmount: CallbackQueue<UnmountCallback>,
    pub(crate) errors: ErrorSink,
    pub(crate) hooks: &'a HookRegistry,
    pub(crate) charts: Rc<dyn ChartCompiler>,
    pub(crate) typesetter: Option<Rc<dyn Typesetter>>,
    pub(crate) options: &'a RenderOptions,
}

/// Renders `node` by kind. Never touches the document.
pub(crate) fn render_part(node: &OutputNode, cx: &mut RenderContext<'_>) -> Rendered {
    match node {
        OutputNode::Html(html) => crate::html::render_html(html, cx),
        OutputNode::ListLike(list) => crate::list::render_list_like(list, cx),
        OutputNode::Vega(vega) => crate::chart::render_vega(vega, cx),
        OutputNode::Latex(latex) => crate::math::render_latex(latex, cx),
        OutputNode::Unknown(_) => {
            tracing::debug!("unknown output type");
            Rendered::markup_only(UNKNOWN_RENDER_TYPE)
        }
    }
}
