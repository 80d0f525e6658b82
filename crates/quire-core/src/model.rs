//! The output tree handed to the renderer by the worksheet layer.
//!
//! Nodes are tagged by their JSON `type` field. Objects with an unrecognised (or missing) `type`
//! are kept verbatim as [`OutputNode::Unknown`] so that they survive an export round-trip.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const HTML_TYPE: &str = "html";
pub const LIST_LIKE_TYPE: &str = "list-like";
pub const VEGA_TYPE: &str = "vega";
pub const LATEX_TYPE: &str = "latex";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Html,
    ListLike,
    Vega,
    Latex,
    Unknown,
}

impl OutputKind {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            HTML_TYPE => Self::Html,
            LIST_LIKE_TYPE => Self::ListLike,
            VEGA_TYPE => Self::Vega,
            LATEX_TYPE => Self::Latex,
            _ => Self::Unknown,
        }
    }
}

/// Raw markup. `content` is trusted and embedded verbatim.
///
/// The hook fields name entries of a [`crate::HookRegistry`]; they are never evaluated as code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlOutput {
    pub content: String,
    #[serde(rename = "didMount", default, skip_serializing_if = "Option::is_none")]
    pub did_mount: Option<String>,
    #[serde(rename = "willUnmount", default, skip_serializing_if = "Option::is_none")]
    pub will_unmount: Option<String>,
    #[serde(rename = "saveHook", default, skip_serializing_if = "Option::is_none")]
    pub save_hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A delimited sequence of child outputs (vectors, maps, sets, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListLikeOutput {
    pub items: Vec<OutputNode>,
    #[serde(default)]
    pub open: String,
    #[serde(default)]
    pub close: String,
    #[serde(default)]
    pub separator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A declarative Vega chart, compiled and drawn after mount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VegaOutput {
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// TeX source, typeset after mount when a typesetter is available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatexOutput {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputNode {
    Html(HtmlOutput),
    ListLike(ListLikeOutput),
    Vega(VegaOutput),
    Latex(LatexOutput),
    Unknown(Value),
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Tagged {
    #[serde(rename = "html")]
    Html(HtmlOutput),
    #[serde(rename = "list-like")]
    ListLike(ListLikeOutput),
    #[serde(rename = "vega")]
    Vega(VegaOutput),
    #[serde(rename = "latex")]
    Latex(LatexOutput),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum TaggedRef<'a> {
    #[serde(rename = "html")]
    Html(&'a HtmlOutput),
    #[serde(rename = "list-like")]
    ListLike(&'a ListLikeOutput),
    #[serde(rename = "vega")]
    Vega(&'a VegaOutput),
    #[serde(rename = "latex")]
    Latex(&'a LatexOutput),
}

impl From<Tagged> for OutputNode {
    fn from(value: Tagged) -> Self {
        match value {
            Tagged::Html(v) => Self::Html(v),
            Tagged::ListLike(v) => Self::ListLike(v),
            Tagged::Vega(v) => Self::Vega(v),
            Tagged::Latex(v) => Self::Latex(v),
        }
    }
}

impl Serialize for OutputNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Html(v) => TaggedRef::Html(v).serialize(serializer),
            Self::ListLike(v) => TaggedRef::ListLike(v).serialize(serializer),
            Self::Vega(v) => TaggedRef::Vega(v).serialize(serializer),
            Self::Latex(v) => TaggedRef::Latex(v).serialize(serializer),
            Self::Unknown(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OutputNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

impl OutputNode {
    /// Builds a node from host JSON. Known `type`s must be well-formed; anything else becomes
    /// [`OutputNode::Unknown`].
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(OutputKind::from_type_tag)
            .unwrap_or(OutputKind::Unknown);
        if kind == OutputKind::Unknown {
            return Ok(Self::Unknown(value));
        }
        Ok(serde_json::from_value::<Tagged>(value)?.into())
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self::Html(HtmlOutput {
            content: content.into(),
            ..Default::default()
        })
    }

    pub fn list_like(
        items: Vec<OutputNode>,
        open: impl Into<String>,
        close: impl Into<String>,
        separator: impl Into<String>,
    ) -> Self {
        Self::ListLike(ListLikeOutput {
            items,
            open: open.into(),
            close: close.into(),
            separator: separator.into(),
            ..Default::default()
        })
    }

    pub fn vega(spec: Value) -> Self {
        Self::Vega(VegaOutput {
            content: spec,
            ..Default::default()
        })
    }

    pub fn latex(source: impl Into<String>) -> Self {
        Self::Latex(LatexOutput {
            content: source.into(),
            ..Default::default()
        })
    }

    /// Sets the copy/paste value. Has no effect on unknown nodes that are not JSON objects.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        match &mut self {
            Self::Html(v) => v.value = Some(value),
            Self::ListLike(v) => v.value = Some(value),
            Self::Vega(v) => v.value = Some(value),
            Self::Latex(v) => v.value = Some(value),
            Self::Unknown(Value::Object(obj)) => {
                obj.insert("value".to_string(), Value::String(value));
            }
            Self::Unknown(_) => {}
        }
        self
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            Self::Html(_) => OutputKind::Html,
            Self::ListLike(_) => OutputKind::ListLike,
            Self::Vega(_) => OutputKind::Vega,
            Self::Latex(_) => OutputKind::Latex,
            Self::Unknown(_) => OutputKind::Unknown,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Html(v) => v.value.as_deref(),
            Self::ListLike(v) => v.value.as_deref(),
            Self::Vega(v) => v.value.as_deref(),
            Self::Latex(v) => v.value.as_deref(),
            Self::Unknown(v) => v.get("value").and_then(Value::as_str),
        }
    }

    /// Removes this node's own `value`. Children of a list-like node are left untouched.
    pub fn strip_value(&mut self) {
        match self {
            Self::Html(v) => v.value = None,
            Self::ListLike(v) => v.value = None,
            Self::Vega(v) => v.value = None,
            Self::Latex(v) => v.value = None,
            Self::Unknown(Value::Object(obj)) => {
                obj.remove("value");
            }
            Self::Unknown(_) => {}
        }
    }

    pub fn without_value(&self) -> Self {
        let mut copy = self.clone();
        copy.strip_value();
        copy
    }
}
