use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::block_on;
use quire_core::{
    ChartSnapshot, Document, HookError, HookErrorPolicy, HookRegistry, HookResult, HtmlDocument,
    HtmlOutput, OutputNode, RenderOptions, SavePolicy,
};
use quire_render::{
    ErrorSink, RenderError, RenderedOutput, Renderer, SaveError, TypesetError, Typesetter,
    UNKNOWN_RENDER_TYPE,
};
use serde_json::json;

thread_local! {
    static MOUNTED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static UNMOUNTED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record_mount(document: &mut dyn Document, id: &str) -> HookResult<()> {
    assert!(document.contains(id), "{id} ran before it was attached");
    MOUNTED.with(|log| log.borrow_mut().push(id.to_string()));
    Ok(())
}

fn record_unmount(document: &mut dyn Document, id: &str) -> HookResult<()> {
    assert!(document.contains(id));
    UNMOUNTED.with(|log| log.borrow_mut().push(id.to_string()));
    Ok(())
}

fn go_live(document: &mut dyn Document, id: &str) -> HookResult<()> {
    document.set_inner_html(id, "<b>live</b>")?;
    Ok(())
}

fn refuse(_: &mut dyn Document, _: &str) -> HookResult<()> {
    Err(HookError::failed("refused"))
}

fn renderer() -> Renderer {
    let mut hooks = HookRegistry::with_builtins();
    hooks.insert_mount("record", record_mount);
    hooks.insert_mount("go-live", go_live);
    hooks.insert_mount("refuse", refuse);
    hooks.insert_unmount("record", record_unmount);
    Renderer::new().with_hooks(hooks)
}

struct Rendered {
    doc: HtmlDocument,
    out: RenderedOutput,
    messages: Rc<RefCell<Vec<String>>>,
}

impl Rendered {
    fn region(&self) -> String {
        self.doc.inner_html(self.out.region_id()).unwrap()
    }
}

fn render_with(renderer: &Renderer, node: &OutputNode) -> Rendered {
    let mut doc = HtmlDocument::with_host("host");
    let (sink, messages) = ErrorSink::collecting();
    let out = renderer.render(node, &mut doc, "host", sink).unwrap();
    Rendered { doc, out, messages }
}

fn out_ids(html: &str) -> Vec<String> {
    html.match_indices(r#"id="out-"#)
        .map(|(i, _)| {
            let start = i + r#"id=""#.len();
            let end = start + html[start..].find('"').unwrap();
            html[start..end].to_string()
        })
        .collect()
}

fn html_with_mount(content: &str, hook: &str) -> OutputNode {
    OutputNode::Html(HtmlOutput {
        content: content.to_string(),
        did_mount: Some(hook.to_string()),
        ..Default::default()
    })
}

fn scatter() -> OutputNode {
    OutputNode::vega(json!({
        "width": 40,
        "height": 20,
        "data": [{"name": "t", "values": [{"x": 1, "y": 2}, {"x": 3, "y": 5}]}],
        "marks": [{"type": "symbol", "from": {"data": "t"}}]
    }))
}

struct Bracket;

impl Typesetter for Bracket {
    fn typeset(&self, tex: &str) -> Result<String, TypesetError> {
        if tex.contains("\\undefined") {
            return Err(TypesetError::Source {
                message: "undefined control sequence".to_string(),
            });
        }
        Ok(format!("<math>{tex}</math>"))
    }
}

#[test]
fn raw_markup_hook_is_bound_to_its_single_element() {
    MOUNTED.take();
    let r = render_with(&renderer(), &html_with_mount("<i>hi</i>", "record"));
    let ids = out_ids(r.doc.html());
    assert_eq!(ids.len(), 1);
    assert_eq!(MOUNTED.take(), ids);
    assert_eq!(r.doc.inner_html(&ids[0]).as_deref(), Some("<i>hi</i>"));
}

#[test]
fn math_is_typeset_in_place() {
    let renderer = renderer().with_typesetter(Bracket);
    let r = render_with(&renderer, &OutputNode::latex("x^2"));
    let ids = out_ids(r.doc.html());
    assert_eq!(ids.len(), 1);
    assert_eq!(
        r.doc.inner_html(&ids[0]).as_deref(),
        Some("<math>x^2</math>")
    );
    assert!(r.region().starts_with(r#"<span class="latex-span""#));
}

#[test]
fn typesetter_sees_decoded_math_text() {
    struct Capture(Rc<RefCell<Vec<String>>>);
    impl Typesetter for Capture {
        fn typeset(&self, tex: &str) -> Result<String, TypesetError> {
            self.0.borrow_mut().push(tex.to_string());
            Ok("<math></math>".to_string())
        }
    }

    let seen = Rc::new(RefCell::new(Vec::new()));
    let renderer = renderer().with_typesetter(Capture(Rc::clone(&seen)));
    render_with(&renderer, &OutputNode::latex("x &lt; y &amp; z"));
    assert_eq!(*seen.borrow(), vec!["x < y & z".to_string()]);
}

#[test]
fn math_without_a_typesetter_keeps_the_delimited_source() {
    let r = render_with(&renderer(), &OutputNode::latex("x^2"));
    let ids = out_ids(r.doc.html());
    assert_eq!(r.doc.inner_html(&ids[0]).as_deref(), Some("@@x^2@@"));
    assert!(r.messages.borrow().is_empty());
}

#[test]
fn typesetting_failures_are_reported() {
    let renderer = renderer().with_typesetter(Bracket);
    let r = render_with(&renderer, &OutputNode::latex("\\undefined"));
    let messages = r.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("LaTeX error: "));
    assert!(messages[0].contains("undefined control sequence"));
}

#[test]
fn chart_is_drawn_into_its_container_after_settling() {
    let mut r = render_with(&renderer(), &scatter());
    let ids = out_ids(r.doc.html());
    assert_eq!(ids.len(), 1);
    assert_eq!(r.doc.inner_html(&ids[0]).as_deref(), Some(""));
    assert_eq!(r.out.pending_draws(), 1);

    block_on(r.out.settle(&mut r.doc));

    assert_eq!(r.out.pending_draws(), 0);
    let svg = r.doc.inner_html(&ids[0]).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(r.messages.borrow().is_empty());
}

#[test]
fn mount_callbacks_run_in_document_order_across_nesting() {
    MOUNTED.take();
    let node = OutputNode::list_like(
        vec![
            html_with_mount("a", "record"),
            OutputNode::list_like(
                vec![html_with_mount("b", "record"), html_with_mount("c", "record")],
                "(",
                ")",
                " ",
            ),
            html_with_mount("d", "record"),
        ],
        "[",
        "]",
        " ",
    );
    let r = render_with(&renderer(), &node);
    let mounted = MOUNTED.take();
    assert_eq!(mounted.len(), 4);
    assert_eq!(mounted, out_ids(r.doc.html()));
}

#[test]
fn empty_composite_is_just_its_delimiters() {
    let r = render_with(&renderer(), &OutputNode::list_like(vec![], "[", "]", ", "));
    assert_eq!(r.region(), "[]");
}

#[test]
fn composite_joins_items_with_the_separator() {
    let node = OutputNode::list_like(
        vec![OutputNode::html("1"), OutputNode::html("2")],
        "#{",
        "}",
        ", ",
    );
    let r = render_with(&renderer(), &node);
    let ids = out_ids(r.doc.html());
    assert_eq!(
        r.region(),
        format!(
            r#"#{{<span id="{}">1</span>, <span id="{}">2</span>}}"#,
            ids[0], ids[1]
        )
    );
}

#[test]
fn value_wrapper_exposes_the_value_for_clicks() {
    let node = OutputNode::list_like(vec![OutputNode::html("1").with_value("1")], "[", "]", " ")
        .with_value(r#"["1"]"#);
    let r = render_with(&renderer(), &node);
    assert!(r.region().starts_with(r#"<span class="value" data-value="[&quot;1&quot;]">["#));
    assert_eq!(
        r.doc.value_attributes(),
        vec![r#"["1"]"#.to_string(), "1".to_string()]
    );
}

#[test]
fn raw_markup_without_save_hook_exports_itself_minus_value() {
    let node = OutputNode::html("<b>x</b>").with_value("x");
    let mut r = render_with(&renderer(), &node);
    assert!(!r.out.has_save_output());
    assert_eq!(r.out.save_output_now(&r.doc).unwrap(), None);
    let exported = block_on(r.out.export(&mut r.doc)).unwrap();
    assert_eq!(exported, OutputNode::html("<b>x</b>"));
}

#[test]
fn preserving_policy_keeps_values_and_leaves_plain_lists_to_the_host() {
    let renderer =
        renderer().with_options(RenderOptions::new().with_save_policy(SavePolicy::preserving()));
    let node = OutputNode::list_like(vec![OutputNode::html("1").with_value("1")], "[", "]", " ")
        .with_value("[1]");
    let mut r = render_with(&renderer, &node);
    assert!(!r.out.has_save_output());
    assert_eq!(block_on(r.out.export(&mut r.doc)).unwrap(), node);
}

#[test]
fn default_policy_always_composes_list_saves() {
    let node = OutputNode::list_like(vec![OutputNode::html("1").with_value("1")], "[", "]", " ")
        .with_value("[1]");
    let mut r = render_with(&renderer(), &node);
    assert!(r.out.has_save_output());
    let saved = block_on(r.out.save_output(&mut r.doc)).unwrap().unwrap();
    let saved = OutputNode::from_json_str(&saved).unwrap();
    assert_eq!(
        saved,
        OutputNode::list_like(vec![OutputNode::html("1")], "[", "]", " ")
    );
}

#[test]
fn save_hooks_capture_the_live_element() {
    let item = OutputNode::Html(HtmlOutput {
        content: "<i>placeholder</i>".to_string(),
        did_mount: Some("go-live".to_string()),
        save_hook: Some("inner-html".to_string()),
        ..Default::default()
    });
    let renderer =
        renderer().with_options(RenderOptions::new().with_save_policy(SavePolicy::preserving()));
    let node = OutputNode::list_like(vec![item, OutputNode::html("2")], "[", "]", " ");
    let mut r = render_with(&renderer, &node);
    assert!(r.out.has_save_output());
    let exported = block_on(r.out.export(&mut r.doc)).unwrap();
    assert_eq!(
        exported,
        OutputNode::list_like(
            vec![OutputNode::html("<b>live</b>"), OutputNode::html("2")],
            "[",
            "]",
            " "
        )
    );
}

#[test]
fn failing_chart_compile_is_reported_not_raised() {
    use futures::FutureExt as _;
    use futures::future::LocalBoxFuture;
    use quire_render::{ChartCompiler, ChartError, ChartView};

    struct Broken;
    impl ChartCompiler for Broken {
        fn compile(
            &self,
            _spec: &serde_json::Value,
            _errors: ErrorSink,
        ) -> LocalBoxFuture<'static, Result<Box<dyn ChartView>, ChartError>> {
            futures::future::ready(Err(ChartError::InvalidSpec {
                message: "spec exploded".to_string(),
            }))
            .boxed_local()
        }
    }

    let mut r = render_with(&renderer().with_chart_compiler(Broken), &scatter());
    block_on(r.out.settle(&mut r.doc));
    let messages = r.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Chart error: "));
    assert!(messages[0].contains("spec exploded"));
}

#[test]
fn unsupported_marks_are_reported_through_the_sink() {
    let node = OutputNode::vega(json!({
        "data": [{"name": "t", "values": []}],
        "marks": [{"type": "arc", "from": {"data": "t"}}]
    }));
    let mut r = render_with(&renderer(), &node);
    block_on(r.out.settle(&mut r.doc));
    assert_eq!(
        *r.messages.borrow(),
        vec!["Chart error: unsupported mark type: arc".to_string()]
    );
}

#[test]
fn chart_drawn_after_removal_fails_soft() {
    let mut r = render_with(&renderer(), &scatter());
    r.doc.remove(r.out.region_id()).unwrap();
    block_on(r.out.settle(&mut r.doc));
    let messages = r.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("is not in the document"));
}

#[test]
fn saving_before_charts_settle_is_refused() {
    let renderer =
        renderer().with_options(RenderOptions::new().with_chart_snapshot(ChartSnapshot::Svg));
    let mut r = render_with(&renderer, &scatter());
    assert!(matches!(
        r.out.save_output_now(&r.doc),
        Err(SaveError::PendingDraws { count: 1 })
    ));
    assert!(block_on(r.out.save_output(&mut r.doc)).unwrap().is_some());
}

#[test]
fn chart_exports_as_vector_snapshot() {
    let renderer =
        renderer().with_options(RenderOptions::new().with_chart_snapshot(ChartSnapshot::Svg));
    let node = scatter().with_value("#plot");
    let mut r = render_with(&renderer, &node);
    let OutputNode::Html(saved) = block_on(r.out.export(&mut r.doc)).unwrap() else {
        panic!("chart saves as raw markup");
    };
    assert_eq!(saved.value, None);
    assert!(saved.content.starts_with("<svg"));
    assert!(roxmltree::Document::parse(&saved.content).is_ok());
}

#[test]
fn chart_snapshot_finds_svg_inside_wrapper_elements() {
    use futures::FutureExt as _;
    use futures::future::LocalBoxFuture;
    use quire_render::{ChartCompiler, ChartError, ChartView};

    struct Wrapped;
    impl ChartView for Wrapped {
        fn render_svg(&self) -> Result<String, ChartError> {
            Ok(concat!(
                r#"<div class="vega"><svg xmlns="http://www.w3.org/2000/svg" width="4" height="4">"#,
                r#"<rect width="4" height="4"></rect></svg></div>"#
            )
            .to_string())
        }
    }
    struct WrappingCompiler;
    impl ChartCompiler for WrappingCompiler {
        fn compile(
            &self,
            _spec: &serde_json::Value,
            _errors: ErrorSink,
        ) -> LocalBoxFuture<'static, Result<Box<dyn ChartView>, ChartError>> {
            futures::future::ready(Ok(Box::new(Wrapped) as Box<dyn ChartView>)).boxed_local()
        }
    }

    let renderer = renderer()
        .with_chart_compiler(WrappingCompiler)
        .with_options(RenderOptions::new().with_chart_snapshot(ChartSnapshot::Svg));
    let mut r = render_with(&renderer, &scatter());
    let OutputNode::Html(saved) = block_on(r.out.export(&mut r.doc)).unwrap() else {
        panic!("chart saves as raw markup");
    };
    assert!(saved.content.starts_with("<svg"), "got {:?}", saved.content);
    assert!(saved.content.contains("<rect"));
    assert!(!saved.content.contains("vega"));
}

#[cfg(feature = "raster")]
#[test]
fn chart_exports_as_png_by_default() {
    let mut r = render_with(&renderer(), &scatter());
    let OutputNode::Html(saved) = block_on(r.out.export(&mut r.doc)).unwrap() else {
        panic!("chart saves as raw markup");
    };
    assert!(saved.content.starts_with(r#"<img src="data:image/png;base64,"#));
    assert!(saved.content.ends_with(r#"" />"#));
}

#[test]
fn unknown_type_renders_fallback_without_callbacks() {
    let node = OutputNode::from_value(json!({"type": "sparkline", "points": [1, 2]})).unwrap();
    let mut r = render_with(&renderer(), &node);
    assert_eq!(r.region(), UNKNOWN_RENDER_TYPE);
    assert!(!r.out.has_save_output());
    assert_eq!(r.out.pending_draws(), 0);
    assert_eq!(block_on(r.out.export(&mut r.doc)).unwrap(), node);
}

#[test]
fn unknown_hook_names_are_reported() {
    let r = render_with(&renderer(), &html_with_mount("x", "no-such-hook"));
    assert_eq!(
        *r.messages.borrow(),
        vec!["Unknown hook: no-such-hook".to_string()]
    );
}

#[test]
fn hook_failures_follow_the_policy() {
    let node = html_with_mount("x", "refuse");

    let mut doc = HtmlDocument::with_host("host");
    let err = renderer()
        .render(&node, &mut doc, "host", ErrorSink::log_only())
        .unwrap_err();
    assert!(matches!(err, RenderError::Hook(ref failure) if failure.hook == "refuse"));

    let reporting =
        renderer().with_options(RenderOptions::new().with_hook_errors(HookErrorPolicy::Report));
    let r = render_with(&reporting, &node);
    let messages = r.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Hook error: "));
    assert!(messages[0].contains("refused"));
}

#[test]
fn propagated_mount_failure_detaches_the_region() {
    UNMOUNTED.take();
    let node = OutputNode::list_like(
        vec![
            OutputNode::Html(HtmlOutput {
                content: "a".to_string(),
                will_unmount: Some("record".to_string()),
                ..Default::default()
            }),
            html_with_mount("b", "refuse"),
        ],
        "[",
        "]",
        " ",
    );

    let mut doc = HtmlDocument::with_host("host");
    let (sink, messages) = ErrorSink::collecting();
    let err = renderer()
        .render(&node, &mut doc, "host", sink)
        .unwrap_err();
    assert!(matches!(err, RenderError::Hook(ref failure) if failure.hook == "refuse"));
    assert_eq!(UNMOUNTED.take().len(), 1);
    assert_eq!(doc.html(), r#"<div id="host"></div>"#);
    assert!(messages.borrow().is_empty());
}

#[test]
fn unmount_runs_once_then_clear_removes_the_region() {
    UNMOUNTED.take();
    let node = OutputNode::Html(HtmlOutput {
        content: "x".to_string(),
        will_unmount: Some("record".to_string()),
        ..Default::default()
    });
    let mut r = render_with(&renderer(), &node);
    let ids = out_ids(r.doc.html());

    r.out.output_will_unmount(&mut r.doc).unwrap();
    r.out.output_will_unmount(&mut r.doc).unwrap();
    assert_eq!(UNMOUNTED.take(), ids);

    let region = r.out.region_id().to_string();
    r.out.clear(&mut r.doc).unwrap();
    assert!(!r.doc.contains(&region));
    assert_eq!(r.doc.html(), r#"<div id="host"></div>"#);
    assert!(UNMOUNTED.take().is_empty());
}

#[test]
fn render_into_a_missing_host_fails() {
    let mut doc = HtmlDocument::new();
    let err = renderer()
        .render(&OutputNode::html("x"), &mut doc, "host", ErrorSink::log_only())
        .unwrap_err();
    assert!(matches!(err, RenderError::Document(_)));
}

#[test]
fn regions_append_in_render_order() {
    let renderer = renderer();
    let mut doc = HtmlDocument::with_host("host");
    let first = renderer
        .render(&OutputNode::html("1"), &mut doc, "host", ErrorSink::log_only())
        .unwrap();
    let second = renderer
        .render(&OutputNode::html("2"), &mut doc, "host", ErrorSink::log_only())
        .unwrap();
    let html = doc.html();
    let a = html.find(first.region_id()).unwrap();
    let b = html.find(second.region_id()).unwrap();
    assert!(a < b);
    assert!(html.contains(r#"<pre class="output" id="region-"#));
}
