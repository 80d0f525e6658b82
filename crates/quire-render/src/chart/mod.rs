//! Chart outputs: compile a declarative spec, draw it into its container once mounted, and
//! snapshot the drawn SVG at save time.

mod plot;

pub use plot::PlotCompiler;

use std::rc::Rc;

use futures::FutureExt as _;
use futures::future::LocalBoxFuture;
use quire_core::markup::{fresh_element_id, wrap_with_value};
use quire_core::{ChartOptions, ChartSnapshot, Document, OutputNode, SvgElement, VegaOutput};
use serde_json::Value;

use crate::context::{RenderContext, Rendered};
use crate::error::{ChartError, SaveError};
use crate::save::SaveFn;
use crate::scheduler::{DrawFn, Mount};
use crate::sink::ErrorSink;

/// Prefix of every chart message sent to the error sink.
pub const CHART_ERROR_PREFIX: &str = "Chart error: ";

/// A compiled chart, ready to draw.
pub trait ChartView {
    fn render_svg(&self) -> Result<String, ChartError>;
}

/// Turns a chart spec into a [`ChartView`], possibly asynchronously.
///
/// Diagnostics that do not stop compilation go to `errors`.
pub trait ChartCompiler {
    fn compile(
        &self,
        spec: &Value,
        errors: ErrorSink,
    ) -> LocalBoxFuture<'static, Result<Box<dyn ChartView>, ChartError>>;
}

pub(crate) fn render_vega(node: &VegaOutput, cx: &mut RenderContext<'_>) -> Rendered {
    let id = fresh_element_id();

    {
        let id = id.clone();
        let spec = node.content.clone();
        let compiler = Rc::clone(&cx.charts);
        let errors = cx.errors.prefixed(CHART_ERROR_PREFIX);
        cx.mount.push(Box::new(move |mount: &mut Mount<'_>| {
            let compiled = compiler.compile(&spec, errors.clone());
            mount.defer_draw(
                compiled
                    .map(move |result| -> DrawFn {
                        Box::new(move |document: &mut dyn Document| {
                            if let Err(err) = draw(document, &id, result) {
                                errors.report(&err.to_string());
                            }
                        })
                    })
                    .boxed_local(),
            );
            Ok(())
        }));
    }

    let save = chart_save(id.clone(), cx.options.chart.clone());
    let markup = wrap_with_value(
        node.value.as_deref(),
        format!(r#"<span class="vega-span" id="{id}"></span>"#),
    );
    Rendered {
        markup,
        save: Some(save),
    }
}

fn draw(
    document: &mut dyn Document,
    id: &str,
    compiled: Result<Box<dyn ChartView>, ChartError>,
) -> Result<(), ChartError> {
    let view = compiled?;
    // The output may have been cleared while the chart was compiling.
    if !document.contains(id) {
        return Err(ChartError::ContainerMissing { id: id.to_string() });
    }
    let svg = view.render_svg()?;
    document.set_inner_html(id, &svg)?;
    tracing::debug!(id, "chart drawn");
    Ok(())
}

/// Saves every outermost `<svg>` drawn inside the container as one raw-markup node.
fn chart_save(id: String, options: ChartOptions) -> SaveFn {
    Box::new(move |document: &dyn Document| {
        let mut content = String::new();
        for svg in document.svg_elements(&id)? {
            content.push_str(&snapshot(&svg, &options)?);
        }
        Ok(OutputNode::html(content))
    })
}

fn snapshot(svg: &SvgElement, options: &ChartOptions) -> Result<String, SaveError> {
    match options.snapshot {
        ChartSnapshot::Svg => Ok(svg.markup.clone()),
        format => raster_img(svg, format, options),
    }
}

#[cfg(feature = "raster")]
fn raster_img(
    svg: &SvgElement,
    format: ChartSnapshot,
    options: &ChartOptions,
) -> Result<String, SaveError> {
    use base64::Engine as _;

    let bytes = match format {
        ChartSnapshot::Jpeg => crate::raster::svg_to_jpeg(&svg.markup, &options.raster)?,
        _ => crate::raster::svg_to_png(&svg.markup, &options.raster)?,
    };
    let data = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!(
        r#"<img src="data:{};base64,{data}" />"#,
        format.mime_type()
    ))
}

#[cfg(not(feature = "raster"))]
fn raster_img(
    _svg: &SvgElement,
    _format: ChartSnapshot,
    _options: &ChartOptions,
) -> Result<String, SaveError> {
    Err(SaveError::RasterUnavailable)
}
