use quire_core::markup::wrap_with_value;
use quire_core::{CompositeSave, ListLikeOutput};

use crate::context::{RenderContext, Rendered, render_part};
use crate::save::{ItemSave, compose_list, default_saved};

pub(crate) fn render_list_like(node: &ListLikeOutput, cx: &mut RenderContext<'_>) -> Rendered {
    let policy = cx.options.save;
    let mut parts = Vec::with_capacity(node.items.len());
    let mut items = Vec::with_capacity(node.items.len());

    for item in &node.items {
        let Rendered { markup, save } = render_part(item, cx);
        parts.push(markup);
        items.push(match save {
            Some(save) => ItemSave::Custom(save),
            None => ItemSave::Default(default_saved(item, &policy)),
        });
    }

    let install = match policy.composite_save {
        CompositeSave::Always => true,
        CompositeSave::WhenCustomized => items.iter().any(ItemSave::is_custom),
    };
    let save = install.then(|| compose_list(node, items, policy.strip_values));

    let markup = wrap_with_value(
        node.value.as_deref(),
        format!("{}{}{}", node.open, parts.join(&node.separator), node.close),
    );
    Rendered { markup, save }
}
