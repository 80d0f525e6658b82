use quire_core::{Document, HtmlOutput};
use quire_core::markup::{fresh_element_id, wrap_with_value};

use crate::context::{RenderContext, Rendered};
use crate::error::{HookFailure, SaveError};
use crate::save::SaveFn;
use crate::scheduler::Mount;

/// Raw markup goes in verbatim inside an id-carrying span; named hooks are bound to that id.
///
/// A hook name missing from the registry is reported and otherwise ignored.
pub(crate) fn render_html(node: &HtmlOutput, cx: &mut RenderContext<'_>) -> Rendered {
    let id = fresh_element_id();

    if let Some(name) = &node.did_mount {
        match cx.hooks.mount(name) {
            Some(hook) => {
                let (id, hook_name) = (id.clone(), name.clone());
                cx.mount.push(Box::new(move |mount: &mut Mount<'_>| {
                    hook(mount.document(), &id).map_err(|source| HookFailure {
                        hook: hook_name,
                        source,
                    })
                }));
            }
            None => cx.errors.report(&format!("Unknown hook: {name}")),
        }
    }

    if let Some(name) = &node.will_unmount {
        match cx.hooks.unmount(name) {
            Some(hook) => {
                let (id, hook_name) = (id.clone(), name.clone());
                cx.unmount.push(Box::new(move |document: &mut dyn Document| {
                    hook(document, &id).map_err(|source| HookFailure {
                        hook: hook_name,
                        source,
                    })
                }));
            }
            None => cx.errors.report(&format!("Unknown hook: {name}")),
        }
    }

    let save = node
        .save_hook
        .as_ref()
        .and_then(|name| match cx.hooks.save(name) {
            Some(hook) => {
                let (id, hook_name) = (id.clone(), name.clone());
                let save: SaveFn = Box::new(move |document: &dyn Document| {
                    hook(document, &id).map_err(|source| {
                        SaveError::Hook(HookFailure {
                            hook: hook_name.clone(),
                            source,
                        })
                    })
                });
                Some(save)
            }
            None => {
                cx.errors.report(&format!("Unknown hook: {name}"));
                None
            }
        });

    let markup = wrap_with_value(
        node.value.as_deref(),
        format!(r#"<span id="{id}">{}</span>"#, node.content),
    );
    Rendered { markup, save }
}
