use quire_core::LatexOutput;
use quire_core::markup::{fresh_element_id, wrap_with_value};

use crate::context::{RenderContext, Rendered};
use crate::error::TypesetError;
use crate::scheduler::Mount;

/// Inline math delimiter placed around the TeX source in the emitted markup.
pub const MATH_SENTINEL: &str = "@@";

/// Error-sink prefix for typesetting failures.
pub const LATEX_ERROR_PREFIX: &str = "LaTeX error: ";

/// Turns a TeX source into markup.
pub trait Typesetter {
    fn typeset(&self, tex: &str) -> Result<String, TypesetError>;
}

/// The math element carries its source between sentinels; once mounted, the typesetter (if
/// one is installed) replaces exactly that element's content. The typesetter sees the
/// element's text, with entities decoded.
pub(crate) fn render_latex(node: &LatexOutput, cx: &mut RenderContext<'_>) -> Rendered {
    let id = fresh_element_id();

    {
        let id = id.clone();
        let typesetter = cx.typesetter.clone();
        let errors = cx.errors.clone();
        cx.mount.push(Box::new(move |mount: &mut Mount<'_>| {
            let Some(typesetter) = typesetter else {
                return Ok(());
            };
            let document = mount.document();
            let Some(inner) = document.inner_html(&id) else {
                tracing::debug!(id, "math element gone before typesetting");
                return Ok(());
            };
            let tex = htmlize::unescape(strip_sentinels(&inner));
            match typesetter.typeset(&tex) {
                Ok(html) => {
                    if let Err(err) = document.set_inner_html(&id, &html) {
                        errors.report(&format!("{LATEX_ERROR_PREFIX}{err}"));
                    }
                }
                Err(err) => errors.report(&format!("{LATEX_ERROR_PREFIX}{err}")),
            }
            Ok(())
        }));
    }

    let markup = wrap_with_value(
        node.value.as_deref(),
        format!(
            r#"<span class="latex-span" id="{id}">{MATH_SENTINEL}{}{MATH_SENTINEL}</span>"#,
            node.content
        ),
    );
    Rendered { markup, save: None }
}

fn strip_sentinels(text: &str) -> &str {
    let text = text.strip_prefix(MATH_SENTINEL).unwrap_or(text);
    text.strip_suffix(MATH_SENTINEL).unwrap_or(text)
}

/// KaTeX-backed inline typesetting.
#[cfg(feature = "katex")]
#[derive(Debug, Clone, Copy, Default)]
pub struct KatexTypesetter {
    pub display_mode: bool,
}

#[cfg(feature = "katex")]
impl Typesetter for KatexTypesetter {
    fn typeset(&self, tex: &str) -> Result<String, TypesetError> {
        use katex::{OptsBuilder, OutputType};

        let mut builder = OptsBuilder::default();
        builder.display_mode(self.display_mode);
        builder.output_type(OutputType::Html);
        let opts = builder.build().map_err(|err| TypesetError::Config {
            message: err.to_string(),
        })?;

        katex::render_with_opts(tex, opts).map_err(|err| TypesetError::Source {
            message: err.to_string(),
        })
    }
}
