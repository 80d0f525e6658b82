#![forbid(unsafe_code)]

//! `quire` renders the output trees a notebook evaluator produces (raw markup, bracketed
//! collections, charts and math) and exports them back to data for saving.
//!
//! # Features
//!
//! - `render`: the render/export engine (`quire::render`)
//! - `raster`: PNG/JPEG chart snapshots via pure-Rust SVG rasterization
//! - `katex`: a KaTeX-backed [`Typesetter`](render::Typesetter)

pub use quire_core::*;

#[cfg(feature = "render")]
pub mod render {
    pub use quire_render::*;

    use quire_core::{HtmlDocument, OutputNode};

    /// Id of the host element [`render_headless`] renders into.
    pub const HOST_ID: &str = "quire-host";

    #[derive(Debug, thiserror::Error)]
    pub enum HeadlessError {
        #[error(transparent)]
        Render(#[from] RenderError),
        #[error(transparent)]
        Save(#[from] SaveError),
    }

    pub type Result<T> = std::result::Result<T, HeadlessError>;

    /// A settled render into a fresh [`HtmlDocument`].
    #[derive(Debug)]
    pub struct HeadlessRender {
        pub document: HtmlDocument,
        pub output: RenderedOutput,
        /// Everything reported to the error sink during the pass.
        pub messages: Vec<String>,
    }

    /// Renders `node` into an empty host and waits for every chart draw.
    pub fn render_headless(renderer: &Renderer, node: &OutputNode) -> Result<HeadlessRender> {
        let mut document = HtmlDocument::with_host(HOST_ID);
        let (sink, messages) = ErrorSink::collecting();
        let mut output = renderer.render(node, &mut document, HOST_ID, sink)?;
        futures::executor::block_on(output.settle(&mut document));
        let messages = messages.take();
        Ok(HeadlessRender {
            document,
            output,
            messages,
        })
    }

    /// Renders `node` headlessly and returns its saved form.
    pub fn export_headless(
        renderer: &Renderer,
        node: &OutputNode,
    ) -> Result<(OutputNode, Vec<String>)> {
        let HeadlessRender {
            mut document,
            mut output,
            messages,
        } = render_headless(renderer, node)?;
        let saved = futures::executor::block_on(output.export(&mut document))?;
        Ok((saved, messages))
    }
}
