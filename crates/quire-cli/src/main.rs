use quire::render::raster::{self, RasterError};
use quire::render::{HeadlessError, Renderer, export_headless, render_headless};
use quire::{OutputNode, RasterOptions, RenderOptions};
use std::io::Read;
use std::str::FromStr;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Json(serde_json::Error),
    Options(serde_json::Error),
    Headless(HeadlessError),
    Raster(RasterError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Options(err) => write!(f, "invalid options file: {err}"),
            CliError::Headless(err) => write!(f, "{err}"),
            CliError::Raster(err) => write!(f, "{err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<HeadlessError> for CliError {
    fn from(value: HeadlessError) -> Self {
        Self::Headless(value)
    }
}

impl From<RasterError> for CliError {
    fn from(value: RasterError) -> Self {
        Self::Raster(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Render,
    Export,
    Raster,
}

#[derive(Debug, Clone, Copy, Default)]
enum RasterFormat {
    #[default]
    Png,
    Jpeg,
}

impl RasterFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl FromStr for RasterFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    options: Option<String>,
    pretty: bool,
    verbose: bool,
    raster_format: RasterFormat,
    raster_scale: f32,
    background: Option<String>,
    out: Option<String>,
}

fn usage() -> &'static str {
    "quire-cli\n\
\n\
USAGE:\n\
  quire-cli [render] [--options <json>] [--out <path>] [<path>|-]\n\
  quire-cli export [--pretty] [--options <json>] [--out <path>] [<path>|-]\n\
  quire-cli raster [--format png|jpg] [--scale <n>] [--background <css-color>] [--out <path>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - render and export read an output tree as JSON; raster reads an SVG file.\n\
  - render prints the rendered HTML (charts drawn) to stdout by default.\n\
  - export prints the saved output tree as JSON.\n\
  - raster output defaults to writing next to the input file (or ./out.png for stdin).\n\
  - --options points at a JSON file of render options; missing fields keep their defaults.\n\
  - -v/--verbose enables debug logging (RUST_LOG is honoured too).\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args {
        raster_scale: 1.0,
        ..Default::default()
    };

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "render" => args.command = Command::Render,
            "export" => args.command = Command::Export,
            "raster" => args.command = Command::Raster,
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            "--options" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.options = Some(path.clone());
            }
            "--format" => {
                let Some(fmt) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.raster_format = fmt
                    .parse::<RasterFormat>()
                    .map_err(|_| CliError::Usage(usage()))?;
            }
            "--scale" => {
                let Some(scale) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.raster_scale = scale.parse::<f32>().map_err(|_| CliError::Usage(usage()))?;
                if !(args.raster_scale.is_finite() && args.raster_scale > 0.0) {
                    return Err(CliError::Usage(usage()));
                }
            }
            "--background" => {
                let Some(bg) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                if !bg.trim().is_empty() {
                    args.background = Some(bg.trim().to_string());
                }
            }
            "--out" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn load_options(path: Option<&str>) -> Result<RenderOptions, CliError> {
    let Some(path) = path else {
        return Ok(RenderOptions::default());
    };
    let text = std::fs::read_to_string(path)?;
    RenderOptions::from_json_str(&text).map_err(CliError::Options)
}

fn build_renderer(options: RenderOptions) -> Renderer {
    let renderer = Renderer::new().with_options(options);
    #[cfg(feature = "katex")]
    let renderer = renderer.with_typesetter(quire::render::KatexTypesetter::default());
    renderer
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None => {
            print!("{text}");
            Ok(())
        }
        Some(path) => {
            std::fs::write(path, text)?;
            Ok(())
        }
    }
}

fn default_raster_out_path(input: Option<&str>, ext: &str) -> std::path::PathBuf {
    match input {
        Some(path) if path != "-" => std::path::PathBuf::from(path).with_extension(ext),
        _ => std::path::PathBuf::from(format!("out.{ext}")),
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let text = read_input(args.input.as_deref())?;

    match args.command {
        Command::Render => {
            let node = OutputNode::from_json_str(&text)?;
            let renderer = build_renderer(load_options(args.options.as_deref())?);
            let rendered = render_headless(&renderer, &node)?;
            tracing::debug!(messages = rendered.messages.len(), "render finished");
            write_text(rendered.document.html(), args.out.as_deref())
        }
        Command::Export => {
            let node = OutputNode::from_json_str(&text)?;
            let renderer = build_renderer(load_options(args.options.as_deref())?);
            let (saved, _messages) = export_headless(&renderer, &node)?;
            let mut json = if args.pretty {
                serde_json::to_string_pretty(&saved)?
            } else {
                serde_json::to_string(&saved)?
            };
            json.push('\n');
            write_text(&json, args.out.as_deref())
        }
        Command::Raster => {
            let options = RasterOptions {
                scale: args.raster_scale,
                background: args.background.clone(),
                ..RasterOptions::default()
            };
            let bytes = match args.raster_format {
                RasterFormat::Png => raster::svg_to_png(&text, &options)?,
                RasterFormat::Jpeg => raster::svg_to_jpeg(&text, &options)?,
            };
            let out = match args.out.as_deref() {
                Some(path) => std::path::PathBuf::from(path),
                None => default_raster_out_path(
                    args.input.as_deref(),
                    args.raster_format.extension(),
                ),
            };
            std::fs::write(out, bytes)?;
            Ok(())
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_tracing(args.verbose);

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("quire-cli")
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_raster_flags() {
        let args = parse_args(&argv(&[
            "raster", "--format", "jpg", "--scale", "2", "--background", "white", "in.svg",
        ]))
        .unwrap();
        assert!(matches!(args.command, Command::Raster));
        assert!(matches!(args.raster_format, RasterFormat::Jpeg));
        assert_eq!(args.raster_scale, 2.0);
        assert_eq!(args.background.as_deref(), Some("white"));
        assert_eq!(args.input.as_deref(), Some("in.svg"));
    }

    #[test]
    fn rejects_bad_usage() {
        assert!(matches!(
            parse_args(&argv(&["--scale", "0"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&argv(&["a.json", "b.json"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&argv(&["--bogus"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn default_out_path_follows_the_input() {
        assert_eq!(
            default_raster_out_path(Some("plots/a.svg"), "png"),
            std::path::PathBuf::from("plots/a.png")
        );
        assert_eq!(
            default_raster_out_path(None, "jpg"),
            std::path::PathBuf::from("out.jpg")
        );
    }
}
