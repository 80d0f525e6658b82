use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Keyboard modifiers held during a click.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
        const META  = 1 << 3;
    }
}

/// When a list-like node installs its own save function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeSave {
    /// Always; the saved tree is rebuilt from the per-item save functions.
    #[default]
    Always,
    /// Only when some descendant customised its save behaviour. Otherwise the host keeps
    /// the original data.
    WhenCustomized,
}

/// How the saved form of a tree is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavePolicy {
    /// Drop `value` from default-saved leaves and from list-like clones.
    pub strip_values: bool,
    pub composite_save: CompositeSave,
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self {
            strip_values: true,
            composite_save: CompositeSave::Always,
        }
    }
}

impl SavePolicy {
    /// Keeps `value` fields and leaves untouched trees to the host.
    pub fn preserving() -> Self {
        Self {
            strip_values: false,
            composite_save: CompositeSave::WhenCustomized,
        }
    }
}

/// What happens when a registered hook returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookErrorPolicy {
    /// Abort the pass and hand the error to the host.
    #[default]
    Propagate,
    /// Forward the message to the error sink and keep going.
    Report,
}

/// The saved form of a drawn chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartSnapshot {
    #[default]
    Png,
    Jpeg,
    /// Keep the drawn SVG markup as-is.
    Svg,
}

impl ChartSnapshot {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    pub scale: f32,
    /// A CSS colour (`white`, `#fff`, `#ffffff80`, ...). JPEG needs an opaque one.
    pub background: Option<String>,
    pub jpeg_quality: u8,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            background: None,
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    pub snapshot: ChartSnapshot,
    pub raster: RasterOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub save: SavePolicy,
    pub hook_errors: HookErrorPolicy,
    pub chart: ChartOptions,
    /// Modifier that turns a click on a value into a `show-value` event.
    pub show_value_modifier: Modifiers,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            save: SavePolicy::default(),
            hook_errors: HookErrorPolicy::default(),
            chart: ChartOptions::default(),
            show_value_modifier: Modifiers::ALT,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save_policy(mut self, save: SavePolicy) -> Self {
        self.save = save;
        self
    }

    pub fn with_hook_errors(mut self, policy: HookErrorPolicy) -> Self {
        self.hook_errors = policy;
        self
    }

    pub fn with_chart_snapshot(mut self, snapshot: ChartSnapshot) -> Self {
        self.chart.snapshot = snapshot;
        self
    }

    pub fn with_raster(mut self, raster: RasterOptions) -> Self {
        self.chart.raster = raster;
        self
    }

    pub fn with_show_value_modifier(mut self, modifier: Modifiers) -> Self {
        self.show_value_modifier = modifier;
        self
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
