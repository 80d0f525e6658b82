use std::fmt;
use std::rc::Rc;

use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use quire_core::markup::fresh_region_id;
use quire_core::{Document, HookErrorPolicy, HookRegistry, Modifiers, OutputNode, RenderOptions};

use crate::chart::{ChartCompiler, PlotCompiler};
use crate::context::{RenderContext, Rendered, render_part};
use crate::error::{RenderError, SaveError};
use crate::events::{AppEvent, ClickEvent, EventBus};
use crate::math::Typesetter;
use crate::save::{SaveFn, default_saved};
use crate::scheduler::{
    CallbackQueue, PendingDraw, UnmountCallback, run_mount_queue, run_unmount_queue,
};
use crate::sink::ErrorSink;

/// Renders output trees into a [`Document`].
///
/// The hook registry, chart compiler and typesetter are fixed per renderer; the error sink is
/// supplied per pass.
pub struct Renderer {
    hooks: HookRegistry,
    charts: Rc<dyn ChartCompiler>,
    typesetter: Option<Rc<dyn Typesetter>>,
    events: Option<Rc<dyn EventBus>>,
    options: RenderOptions,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("hooks", &self.hooks)
            .field("typesetter", &self.typesetter.is_some())
            .field("events", &self.events.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            hooks: HookRegistry::with_builtins(),
            charts: Rc::new(PlotCompiler),
            typesetter: None,
            events: None,
            options: RenderOptions::default(),
        }
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_chart_compiler(mut self, compiler: impl ChartCompiler + 'static) -> Self {
        self.charts = Rc::new(compiler);
        self
    }

    pub fn with_typesetter(mut self, typesetter: impl Typesetter + 'static) -> Self {
        self.typesetter = Some(Rc::new(typesetter));
        self
    }

    pub fn with_event_bus(mut self, bus: impl EventBus + 'static) -> Self {
        self.events = Some(Rc::new(bus));
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Renders `node` and appends it, wrapped in a fresh output region, to `host_id`.
    ///
    /// Mount callbacks run after the markup is attached. Chart draws they start stay pending
    /// on the returned [`RenderedOutput`] until it is settled. When a mount failure
    /// propagates, the unmount callbacks collected so far run (their failures are reported,
    /// not raised) and the region is removed before the error is returned.
    pub fn render(
        &self,
        node: &OutputNode,
        document: &mut dyn Document,
        host_id: &str,
        errors: ErrorSink,
    ) -> Result<RenderedOutput, RenderError> {
        let mut cx = RenderContext {
            mount: CallbackQueue::new(),
            unmount: CallbackQueue::new(),
            errors: errors.clone(),
            hooks: &self.hooks,
            charts: Rc::clone(&self.charts),
            typesetter: self.typesetter.clone(),
            options: &self.options,
        };
        let Rendered { markup, save } = render_part(node, &mut cx);
        let RenderContext {
            mut mount,
            mut unmount,
            ..
        } = cx;

        let region_id = fresh_region_id();
        document.append_html(
            host_id,
            &format!(r#"<pre class="output" id="{region_id}">{markup}</pre>"#),
        )?;
        tracing::debug!(
            region = %region_id,
            kind = ?node.kind(),
            mount = mount.len(),
            unmount = unmount.len(),
            "output attached"
        );

        let mut draws = Vec::new();
        if let Err(err) = run_mount_queue(
            &mut mount,
            document,
            &mut draws,
            self.options.hook_errors,
            &errors,
        ) {
            tracing::debug!(region = %region_id, "mount failed, detaching output");
            run_unmount_queue(&mut unmount, document, HookErrorPolicy::Report, &errors)?;
            document.remove(&region_id)?;
            return Err(err);
        }

        Ok(RenderedOutput {
            region_id,
            unmount,
            save,
            fallback: default_saved(node, &self.options.save),
            pending: draws.into_iter().collect(),
            hook_errors: self.options.hook_errors,
            show_value_modifier: self.options.show_value_modifier,
            events: self.events.clone(),
            errors,
        })
    }
}

/// The handle a host keeps for one rendered output: teardown, saving and click handling.
pub struct RenderedOutput {
    region_id: String,
    unmount: CallbackQueue<UnmountCallback>,
    save: Option<SaveFn>,
    fallback: OutputNode,
    pending: FuturesUnordered<PendingDraw>,
    hook_errors: HookErrorPolicy,
    show_value_modifier: Modifiers,
    events: Option<Rc<dyn EventBus>>,
    errors: ErrorSink,
}

impl fmt::Debug for RenderedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedOutput")
            .field("region_id", &self.region_id)
            .field("unmount", &self.unmount)
            .field("has_save_output", &self.has_save_output())
            .field("pending_draws", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl RenderedOutput {
    /// Id of the `<pre class="output">` element wrapping this output.
    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Applies every outstanding asynchronous draw, in completion order.
    pub async fn settle(&mut self, document: &mut dyn Document) {
        while let Some(draw) = self.pending.next().await {
            draw(&mut *document);
        }
    }

    /// Runs the unmount callbacks. They run at most once; later calls do nothing.
    pub fn output_will_unmount(&mut self, document: &mut dyn Document) -> Result<(), RenderError> {
        run_unmount_queue(&mut self.unmount, document, self.hook_errors, &self.errors)
    }

    /// Unmounts and then removes the output region from the document.
    pub fn clear(mut self, document: &mut dyn Document) -> Result<(), RenderError> {
        self.output_will_unmount(document)?;
        document.remove(&self.region_id)?;
        Ok(())
    }

    /// Whether the output installed its own save function. When it did not, the host keeps
    /// its original data.
    pub fn has_save_output(&self) -> bool {
        self.save.is_some()
    }

    /// The saved tree as JSON, or `None` when the output has no save function. Errors with
    /// [`SaveError::PendingDraws`] if a chart has not been drawn yet.
    pub fn save_output_now(&self, document: &dyn Document) -> Result<Option<String>, SaveError> {
        if !self.pending.is_empty() {
            return Err(SaveError::PendingDraws {
                count: self.pending.len(),
            });
        }
        let Some(save) = &self.save else {
            return Ok(None);
        };
        Ok(Some(serde_json::to_string(&save(document)?)?))
    }

    /// Settles pending draws, then saves.
    pub async fn save_output(
        &mut self,
        document: &mut dyn Document,
    ) -> Result<Option<String>, SaveError> {
        self.settle(document).await;
        self.save_output_now(document)
    }

    /// Settles pending draws, then returns the saved tree. Outputs without a save function
    /// export their default saved form.
    pub async fn export(&mut self, document: &mut dyn Document) -> Result<OutputNode, SaveError> {
        self.settle(document).await;
        match &self.save {
            Some(save) => save(document),
            None => Ok(self.fallback.clone()),
        }
    }

    /// Publishes a show-value event when the clicked element, or its nearest ancestor inside
    /// this output's region, carries a value and the configured modifier is held. Returns
    /// whether an event was published.
    pub fn handle_click(&self, document: &dyn Document, click: &ClickEvent) -> bool {
        let Some(events) = &self.events else {
            return false;
        };
        if !click.modifiers.contains(self.show_value_modifier) {
            return false;
        }
        let Some(value) = document.closest_value(&self.region_id, &click.target) else {
            return false;
        };
        tracing::debug!(region = %self.region_id, target = %click.target, "show value");
        events.publish(AppEvent::ShowValue(value));
        true
    }
}
