//! A small, dependency-free compiler for the plot specs notebook plotting helpers emit.
//!
//! Supported: `width`/`height`/`padding`, named `data` tables of `{x, y}` points, and
//! `symbol`/`line`/`rect`/`area` marks drawn against auto-ranged linear `x`/`y` scales.
//! Explicit numeric scale domains, `nice` and `zero` are honoured; other chart properties
//! are ignored.

use std::collections::HashMap;
use std::fmt::Write as _;

use futures::FutureExt as _;
use futures::future::LocalBoxFuture;
use quire_core::markup::escape_attr;
use serde_json::{Map, Value};

use super::{ChartCompiler, ChartView};
use crate::error::ChartError;
use crate::sink::ErrorSink;

const DEFAULT_WIDTH: f64 = 400.0;
const DEFAULT_HEIGHT: f64 = 247.2;
const DEFAULT_COLOR: &str = "steelblue";
const DEFAULT_SYMBOL_SIZE: f64 = 70.0;
const TICK_COUNT: usize = 5;
const MAX_TICKS: usize = 4 * TICK_COUNT;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlotCompiler;

impl ChartCompiler for PlotCompiler {
    fn compile(
        &self,
        spec: &Value,
        errors: ErrorSink,
    ) -> LocalBoxFuture<'static, Result<Box<dyn ChartView>, ChartError>> {
        let compiled =
            Plot::from_spec(spec, &errors).map(|plot| Box::new(plot) as Box<dyn ChartView>);
        futures::future::ready(compiled).boxed_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Padding {
    top: f64,
    right: f64,
    bottom: f64,
    left: f64,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            top: 10.0,
            right: 10.0,
            bottom: 40.0,
            left: 55.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkKind {
    Symbol,
    Line,
    Rect,
    Area,
}

impl MarkKind {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "symbol" => Some(Self::Symbol),
            "line" => Some(Self::Line),
            "rect" => Some(Self::Rect),
            "area" => Some(Self::Area),
            _ => None,
        }
    }

    /// Bars and areas are measured from zero.
    fn anchors_at_zero(self) -> bool {
        matches!(self, Self::Rect | Self::Area)
    }
}

#[derive(Debug, Clone)]
struct Mark {
    kind: MarkKind,
    points: Vec<(f64, f64)>,
    fill: Option<String>,
    stroke: Option<String>,
    stroke_width: f64,
    size: f64,
    opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    fn map(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        r0 + (v - d0) / (d1 - d0) * (r1 - r0)
    }

    fn ticks(&self) -> Vec<f64> {
        let (lo, hi) = self.domain;
        let step = nice_step((hi - lo) / TICK_COUNT as f64);
        let start = (lo / step).ceil() * step;
        // Past 2^53 a step can be below the float spacing; fall back to the domain ends.
        if !start.is_finite() || start + step == start {
            return if lo == hi { vec![lo] } else { vec![lo, hi] };
        }
        (0..=MAX_TICKS)
            .map(|i| start + i as f64 * step)
            .take_while(|t| *t <= hi + step * 1e-9)
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Plot {
    width: f64,
    height: f64,
    padding: Padding,
    x: LinearScale,
    y: LinearScale,
    marks: Vec<Mark>,
    axes: bool,
}

impl Plot {
    fn from_spec(spec: &Value, errors: &ErrorSink) -> Result<Self, ChartError> {
        let Some(spec) = spec.as_object() else {
            return Err(invalid("chart spec must be a JSON object"));
        };

        let width = dimension(spec, "width", DEFAULT_WIDTH)?;
        let height = dimension(spec, "height", DEFAULT_HEIGHT)?;
        let padding = padding(spec.get("padding"));
        let tables = data_tables(spec, errors)?;

        let mut marks = Vec::new();
        if let Some(raw) = spec.get("marks") {
            let Some(raw) = raw.as_array() else {
                return Err(invalid("`marks` must be an array"));
            };
            for (i, mark) in raw.iter().enumerate() {
                marks.push(parse_mark(i, mark, &tables)?);
            }
        }

        let x_domain = domain(
            scale_spec(spec, "x"),
            marks.iter().flat_map(|m| m.points.iter().map(|p| p.0)),
            false,
        );
        let y_domain = domain(
            scale_spec(spec, "y"),
            marks.iter().flat_map(|m| m.points.iter().map(|p| p.1)),
            marks.iter().any(|m| m.kind.anchors_at_zero()),
        );

        let axes = spec
            .get("axes")
            .and_then(Value::as_array)
            .is_some_and(|axes| !axes.is_empty());

        Ok(Self {
            width,
            height,
            padding,
            x: LinearScale {
                domain: x_domain,
                range: (0.0, width),
            },
            y: LinearScale {
                domain: y_domain,
                range: (height, 0.0),
            },
            marks,
            axes,
        })
    }

    fn baseline(&self) -> f64 {
        let (lo, hi) = self.y.domain;
        self.y.map(0.0_f64.clamp(lo, hi))
    }

    fn write_mark(&self, out: &mut String, mark: &Mark) {
        let fill = mark.fill.as_deref().map(escape_attr);
        let stroke = mark.stroke.as_deref().map(escape_attr);
        match mark.kind {
            MarkKind::Symbol => {
                let r = (mark.size / std::f64::consts::PI).sqrt();
                for &(x, y) in &mark.points {
                    let _ = write!(
                        out,
                        r#"<circle cx="{}" cy="{}" r="{}" fill="{}" fill-opacity="{}""#,
                        Num(self.x.map(x)),
                        Num(self.y.map(y)),
                        Num(r),
                        fill.as_deref().unwrap_or(DEFAULT_COLOR),
                        Num(mark.opacity),
                    );
                    write_stroke(out, stroke.as_deref(), mark.stroke_width);
                    out.push_str("/>");
                }
            }
            MarkKind::Line => {
                let _ = write!(
                    out,
                    r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-opacity="{}"/>"#,
                    self.polyline(&mark.points),
                    stroke.as_deref().unwrap_or(DEFAULT_COLOR),
                    Num(mark.stroke_width),
                    Num(mark.opacity),
                );
            }
            MarkKind::Rect => {
                let band = self.width / mark.points.len().max(1) as f64 * 0.8;
                let base = self.baseline();
                for &(x, y) in &mark.points {
                    let top = self.y.map(y);
                    let _ = write!(
                        out,
                        r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}" fill-opacity="{}""#,
                        Num(self.x.map(x) - band / 2.0),
                        Num(top.min(base)),
                        Num(band),
                        Num((base - top).abs()),
                        fill.as_deref().unwrap_or(DEFAULT_COLOR),
                        Num(mark.opacity),
                    );
                    write_stroke(out, stroke.as_deref(), mark.stroke_width);
                    out.push_str("/>");
                }
            }
            MarkKind::Area => {
                let (Some(first), Some(last)) = (mark.points.first(), mark.points.last()) else {
                    return;
                };
                let base = self.baseline();
                let _ = write!(
                    out,
                    r#"<path d="{} L{},{} L{},{} Z" fill="{}" fill-opacity="{}""#,
                    self.polyline(&mark.points),
                    Num(self.x.map(last.0)),
                    Num(base),
                    Num(self.x.map(first.0)),
                    Num(base),
                    fill.as_deref().unwrap_or(DEFAULT_COLOR),
                    Num(mark.opacity),
                );
                write_stroke(out, stroke.as_deref(), mark.stroke_width);
                out.push_str("/>");
            }
        }
    }

    fn polyline(&self, points: &[(f64, f64)]) -> String {
        let mut d = String::new();
        for (i, &(x, y)) in points.iter().enumerate() {
            let cmd = if i == 0 { 'M' } else { 'L' };
            if i > 0 {
                d.push(' ');
            }
            let _ = write!(d, "{cmd}{},{}", Num(self.x.map(x)), Num(self.y.map(y)));
        }
        d
    }

    fn write_axes(&self, out: &mut String) {
        out.push_str(r##"<g class="axis x" stroke="#000" font-size="11" text-anchor="middle">"##);
        let _ = write!(
            out,
            r#"<line x1="0" y1="{h}" x2="{w}" y2="{h}"/>"#,
            w = Num(self.width),
            h = Num(self.height),
        );
        for t in self.x.ticks() {
            let x = Num(self.x.map(t));
            let _ = write!(
                out,
                r#"<line x1="{x}" y1="{h}" x2="{x}" y2="{}"/><text x="{x}" y="{}" stroke="none">{}</text>"#,
                Num(self.height + 6.0),
                Num(self.height + 18.0),
                Num(t),
                h = Num(self.height),
            );
        }
        out.push_str("</g>");

        out.push_str(r##"<g class="axis y" stroke="#000" font-size="11" text-anchor="end">"##);
        let _ = write!(out, r#"<line x1="0" y1="0" x2="0" y2="{}"/>"#, Num(self.height));
        for t in self.y.ticks() {
            let y = Num(self.y.map(t));
            let _ = write!(
                out,
                r#"<line x1="-6" y1="{y}" x2="0" y2="{y}"/><text x="-9" y="{y}" dy="0.32em" stroke="none">{}</text>"#,
                Num(t),
            );
        }
        out.push_str("</g>");
    }
}

impl ChartView for Plot {
    fn render_svg(&self) -> Result<String, ChartError> {
        let total_w = self.width + self.padding.left + self.padding.right;
        let total_h = self.height + self.padding.top + self.padding.bottom;
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="marks" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><g transform="translate({},{})">"#,
            Num(self.padding.left),
            Num(self.padding.top),
            w = Num(total_w),
            h = Num(total_h),
        );
        for mark in &self.marks {
            self.write_mark(&mut out, mark);
        }
        if self.axes {
            self.write_axes(&mut out);
        }
        out.push_str("</g></svg>");
        Ok(out)
    }
}

fn write_stroke(out: &mut String, stroke: Option<&str>, width: f64) {
    if let Some(stroke) = stroke {
        let _ = write!(out, r#" stroke="{stroke}" stroke-width="{}""#, Num(width));
    }
}

fn invalid(message: impl Into<String>) -> ChartError {
    ChartError::InvalidSpec {
        message: message.into(),
    }
}

fn dimension(spec: &Map<String, Value>, key: &str, default: f64) -> Result<f64, ChartError> {
    match spec.get(key) {
        None => Ok(default),
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() && n > 0.0 => Ok(n),
            _ => Err(invalid(format!("`{key}` must be a positive number"))),
        },
    }
}

fn padding(raw: Option<&Value>) -> Padding {
    let default = Padding::default();
    match raw {
        Some(Value::Number(n)) => {
            let n = n.as_f64().unwrap_or(0.0).max(0.0);
            Padding {
                top: n,
                right: n,
                bottom: n,
                left: n,
            }
        }
        Some(Value::Object(sides)) => {
            let side = |key: &str, fallback: f64| {
                sides
                    .get(key)
                    .and_then(Value::as_f64)
                    .map_or(fallback, |v| v.max(0.0))
            };
            Padding {
                top: side("top", default.top),
                right: side("right", default.right),
                bottom: side("bottom", default.bottom),
                left: side("left", default.left),
            }
        }
        // "auto" and anything else.
        _ => default,
    }
}

fn data_tables(
    spec: &Map<String, Value>,
    errors: &ErrorSink,
) -> Result<HashMap<String, Vec<(f64, f64)>>, ChartError> {
    let mut tables = HashMap::new();
    let Some(raw) = spec.get("data") else {
        return Ok(tables);
    };
    let Some(raw) = raw.as_array() else {
        return Err(invalid("`data` must be an array"));
    };

    for table in raw {
        let Some(name) = table.get("name").and_then(Value::as_str) else {
            return Err(invalid("every data table needs a string `name`"));
        };
        let mut points = Vec::new();
        let values = table.get("values").and_then(Value::as_array);
        for (i, point) in values.into_iter().flatten().enumerate() {
            let x = point.get("x").and_then(Value::as_f64);
            let y = point.get("y").and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => points.push((x, y)),
                _ => errors.report(&format!(
                    "data table `{name}`: skipping point {i} without numeric x and y"
                )),
            }
        }
        tables.insert(name.to_string(), points);
    }
    Ok(tables)
}

fn parse_mark(
    index: usize,
    mark: &Value,
    tables: &HashMap<String, Vec<(f64, f64)>>,
) -> Result<Mark, ChartError> {
    let Some(kind) = mark.get("type").and_then(Value::as_str) else {
        return Err(invalid(format!("mark {index} has no `type`")));
    };
    let kind = MarkKind::parse(kind).ok_or_else(|| ChartError::UnsupportedMark {
        mark: kind.to_string(),
    })?;
    let Some(source) = mark.pointer("/from/data").and_then(Value::as_str) else {
        return Err(invalid(format!("mark {index} has no `from.data` source")));
    };
    let points = tables
        .get(source)
        .ok_or_else(|| ChartError::MissingData {
            name: source.to_string(),
        })?
        .clone();

    let props = MarkProperties(mark.get("properties"));
    let default_width = if kind == MarkKind::Line { 2.0 } else { 1.0 };
    Ok(Mark {
        kind,
        points,
        fill: props.string("fill"),
        stroke: props.string("stroke"),
        stroke_width: props.number("strokeWidth").unwrap_or(default_width),
        size: props.number("size").unwrap_or(DEFAULT_SYMBOL_SIZE),
        opacity: props
            .number("fillOpacity")
            .or_else(|| props.number("opacity"))
            .unwrap_or(1.0),
    })
}

/// `properties.enter.<name>.value`, falling back to `properties.update.<name>.value`.
struct MarkProperties<'a>(Option<&'a Value>);

impl MarkProperties<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        let props = self.0?;
        ["enter", "update"]
            .iter()
            .find_map(|set| props.get(*set)?.get(name)?.get("value"))
    }

    fn string(&self, name: &str) -> Option<String> {
        self.lookup(name)?.as_str().map(str::to_string)
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.lookup(name)?.as_f64().filter(|v| v.is_finite())
    }
}

fn scale_spec<'a>(spec: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    spec.get("scales")?
        .as_array()?
        .iter()
        .find(|scale| scale.get("name").and_then(Value::as_str) == Some(name))
}

fn domain(scale: Option<&Value>, values: impl Iterator<Item = f64>, zero: bool) -> (f64, f64) {
    let explicit = scale
        .and_then(|s| s.get("domain"))
        .and_then(Value::as_array)
        .and_then(|d| Some((d.first()?.as_f64()?, d.get(1)?.as_f64()?)));
    let flag = |key: &str| {
        scale
            .and_then(|s| s.get(key))
            .and_then(Value::as_bool)
    };

    let (mut lo, mut hi) = match explicit {
        Some(domain) => domain,
        None => values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        }),
    };
    if !lo.is_finite() || !hi.is_finite() {
        (lo, hi) = (0.0, 1.0);
    }
    if explicit.is_none() && flag("zero").unwrap_or(zero) {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if lo == hi {
        let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.5 };
        (lo, hi) = (lo - pad, hi + pad);
    }
    if flag("nice").unwrap_or(false) {
        let step = nice_step((hi - lo) / TICK_COUNT as f64);
        (lo, hi) = ((lo / step).floor() * step, (hi / step).ceil() * step);
    }
    (lo, hi)
}

/// Rounds a raw tick step up to 1, 2 or 5 times a power of ten.
fn nice_step(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude;
    let nice = if residual <= 1.0 {
        1.0
    } else if residual <= 2.0 {
        2.0
    } else if residual <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// SVG number formatting without `-0` or float noise.
struct Num(f64);

impl std::fmt::Display for Num {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut v = self.0;
        if !v.is_finite() {
            return f.write_str("0");
        }
        v = (v * 1000.0).round() / 1000.0;
        if v == -0.0 {
            v = 0.0;
        }
        write!(f, "{v}")
    }
}
