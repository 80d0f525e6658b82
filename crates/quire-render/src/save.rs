//! Composition of per-node save functions into the saved form of a tree.

use quire_core::{Document, ListLikeOutput, OutputNode, SavePolicy};

use crate::error::SaveError;

/// Produces the saved form of one rendered node from the live document.
pub type SaveFn = Box<dyn Fn(&dyn Document) -> Result<OutputNode, SaveError>>;

/// The saved form of a node that installed no save function. Unknown nodes are kept verbatim.
pub(crate) fn default_saved(node: &OutputNode, policy: &SavePolicy) -> OutputNode {
    if policy.strip_values && !matches!(node, OutputNode::Unknown(_)) {
        node.without_value()
    } else {
        node.clone()
    }
}

/// How one list item is saved.
pub(crate) enum ItemSave {
    Default(OutputNode),
    Custom(SaveFn),
}

impl ItemSave {
    fn save(&self, document: &dyn Document) -> Result<OutputNode, SaveError> {
        match self {
            Self::Default(node) => Ok(node.clone()),
            Self::Custom(save) => save(document),
        }
    }

    pub(crate) fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

/// Rebuilds a list-like node from the saved forms of its items.
///
/// The clone keeps every field of the original except `items` (and `value` when stripping).
pub(crate) fn compose_list(node: &ListLikeOutput, items: Vec<ItemSave>, strip_values: bool) -> SaveFn {
    let template = ListLikeOutput {
        items: Vec::new(),
        open: node.open.clone(),
        close: node.close.clone(),
        separator: node.separator.clone(),
        value: if strip_values { None } else { node.value.clone() },
        extra: node.extra.clone(),
    };
    Box::new(move |document| {
        let mut saved = template.clone();
        saved.items = items
            .iter()
            .map(|item| item.save(document))
            .collect::<Result<_, _>>()?;
        Ok(OutputNode::ListLike(saved))
    })
}
