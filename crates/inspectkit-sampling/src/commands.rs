//! Operator commands
//!
//! One command per line, a keyword followed by `key=value` arguments:
//!
//! ```text
//! home
//! stop
//! goto x=120 y=95 z=0.4
//! focus z_min=0.2 z_max=0.6 step=0.05
//! sample n=25 save=true
//! scan step_x=2 step_y=2
//! load id=S-1 mount=puck layer_mm=0.01 height=12 width=10 length=8 cx=120 cy=95
//! camera exposure=8000 kelvin=6500
//! disable
//! clear
//! ```

use inspectkit_core::data::metadata::is_name_char;
use inspectkit_core::{CameraSettings, CommandError, PartialPosition, Point2, Sample};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Parameters for loading a new sample
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSpec {
    /// Operator-assigned identifier
    pub sample_id: String,
    /// Mount type
    pub mount_type: String,
    /// Material removed per layer in mm
    pub mm_per_layer: f64,
    /// Initial surface height in mm
    pub initial_height_mm: f64,
    /// Bounding box width in mm
    pub width_mm: f64,
    /// Bounding box height in mm
    pub height_mm: f64,
    /// Bounding box centre; the stage centre when omitted
    pub center: Option<Point2>,
}

impl SampleSpec {
    /// Reject identifiers that are not plain file-name text and non-positive extents
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.sample_id.is_empty() || !self.sample_id.chars().all(is_name_char) {
            return Err(invalid("id", "use ASCII letters, digits, '-', '_' or '.'"));
        }
        if !(self.mm_per_layer.is_finite() && self.mm_per_layer >= 0.0) {
            return Err(invalid("layer_mm", "must be a finite, non-negative mm value"));
        }
        if !self.initial_height_mm.is_finite() {
            return Err(invalid("height", "must be finite"));
        }
        for (argument, extent) in [("width", self.width_mm), ("length", self.height_mm)] {
            if !(extent.is_finite() && extent > 0.0) {
                return Err(invalid(argument, "must be a positive, finite mm value"));
            }
        }
        if let Some(center) = self.center {
            if !center.x.is_finite() || !center.y.is_finite() {
                return Err(invalid("cx/cy", "must be finite"));
            }
        }
        Ok(())
    }

    /// Build the sample with its bounding box centred on `center` or `fallback`
    pub fn build(&self, fallback: Point2) -> Sample {
        let mut sample = Sample::new(
            self.sample_id.clone(),
            self.mount_type.clone(),
            self.mm_per_layer,
            self.initial_height_mm,
        );
        sample.set_bounding_box(
            self.center.unwrap_or(fallback),
            self.width_mm,
            self.height_mm,
        );
        sample
    }
}

/// Partial camera settings update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraUpdate {
    /// Exposure in microseconds
    pub exposure_us: Option<u32>,
    /// Analogue gain
    pub gain: Option<f64>,
    /// Contrast multiplier
    pub contrast: Option<f64>,
    /// White point in Kelvin
    pub color_temperature_k: Option<u32>,
}

impl CameraUpdate {
    /// Overlay the present fields on `base`
    pub fn apply_to(&self, base: CameraSettings) -> CameraSettings {
        CameraSettings {
            exposure_us: self.exposure_us.unwrap_or(base.exposure_us),
            gain: self.gain.unwrap_or(base.gain),
            contrast: self.contrast.unwrap_or(base.contrast),
            color_temperature_k: self.color_temperature_k.unwrap_or(base.color_temperature_k),
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Operator command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Full homing cycle
    Home,
    /// Request every running routine to stop
    Stop,
    /// Move to an absolute position, omitted axes stay put
    GoTo(PartialPosition),
    /// Run autofocus; omitted bounds use the configured defaults
    Focus {
        /// Lower Z bound in mm
        z_min: Option<f64>,
        /// Upper Z bound in mm
        z_max: Option<f64>,
        /// Z step in mm
        step: Option<f64>,
    },
    /// Random sampling over the bounding box
    StartSampling {
        /// Number of points
        count: usize,
        /// Inverted: set means no metadata records are written
        save_images: bool,
    },
    /// Grid scan over the bounding box
    StartScanning {
        /// X step in whole mm
        step_x: u32,
        /// Y step in whole mm
        step_y: u32,
        /// Inverted: set means no metadata records are written
        save_images: bool,
    },
    /// Replace the loaded sample
    LoadSample(SampleSpec),
    /// Update camera settings
    UpdateCameraSettings(CameraUpdate),
    /// De-energize the motors
    DisableMotors,
    /// Clear the alarm message
    ClearAlarm,
}

impl Command {
    /// Whether the command runs on the worker thread
    pub fn is_long_running(&self) -> bool {
        matches!(
            self,
            Self::Home
                | Self::GoTo(_)
                | Self::Focus { .. }
                | Self::StartSampling { .. }
                | Self::StartScanning { .. }
        )
    }

    /// Keyword of the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Stop => "stop",
            Self::GoTo(_) => "goto",
            Self::Focus { .. } => "focus",
            Self::StartSampling { .. } => "sample",
            Self::StartScanning { .. } => "scan",
            Self::LoadSample(_) => "load",
            Self::UpdateCameraSettings(_) => "camera",
            Self::DisableMotors => "disable",
            Self::ClearAlarm => "clear",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

struct Args<'a> {
    input: &'a str,
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Args<'a> {
    fn parse(input: &'a str, tokens: impl Iterator<Item = &'a str>) -> Result<Self, CommandError> {
        let mut values = HashMap::new();
        for token in tokens {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| parse_error(input, format!("expected key=value, got '{}'", token)))?;
            if key.is_empty() || value.is_empty() {
                return Err(parse_error(input, format!("malformed argument '{}'", token)));
            }
            if values.insert(key, value).is_some() {
                return Err(parse_error(input, format!("duplicate argument '{}'", key)));
            }
        }
        Ok(Self { input, values })
    }

    fn optional<T: FromStr>(&mut self, key: &str) -> Result<Option<T>, CommandError> {
        let input = self.input;
        match self.values.remove(key) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| parse_error(input, format!("invalid value for {}: '{}'", key, raw))),
            None => Ok(None),
        }
    }

    fn required<T: FromStr>(&mut self, key: &str) -> Result<T, CommandError> {
        self.optional(key)?
            .ok_or_else(|| parse_error(self.input, format!("missing argument '{}'", key)))
    }

    // f64::from_str accepts "nan" and "inf"
    fn finite(&mut self, key: &str) -> Result<Option<f64>, CommandError> {
        match self.optional::<f64>(key)? {
            Some(value) if !value.is_finite() => Err(parse_error(
                self.input,
                format!("{} must be finite, got {}", key, value),
            )),
            value => Ok(value),
        }
    }

    fn required_finite(&mut self, key: &str) -> Result<f64, CommandError> {
        self.finite(key)?
            .ok_or_else(|| parse_error(self.input, format!("missing argument '{}'", key)))
    }

    fn finish(self) -> Result<(), CommandError> {
        match self.values.keys().next() {
            Some(key) => Err(parse_error(self.input, format!("unknown argument '{}'", key))),
            None => Ok(()),
        }
    }
}

fn invalid(argument: &str, reason: &str) -> CommandError {
    CommandError::InvalidArgument {
        argument: argument.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_error(input: &str, reason: impl Into<String>) -> CommandError {
    CommandError::Parse {
        input: input.to_string(),
        reason: reason.into(),
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let mut tokens = input.split_whitespace();
        let keyword = tokens
            .next()
            .ok_or_else(|| parse_error(input, "empty command"))?
            .to_ascii_lowercase();
        let mut args = Args::parse(input, tokens)?;

        let command = match keyword.as_str() {
            "home" => Self::Home,
            "stop" => Self::Stop,
            "disable" => Self::DisableMotors,
            "clear" => Self::ClearAlarm,
            "goto" => {
                let target = PartialPosition {
                    x: args.finite("x")?,
                    y: args.finite("y")?,
                    z: args.finite("z")?,
                };
                if target.is_empty() {
                    return Err(parse_error(input, "goto needs at least one of x, y, z"));
                }
                Self::GoTo(target)
            }
            "focus" => Self::Focus {
                z_min: args.finite("z_min")?,
                z_max: args.finite("z_max")?,
                step: args.finite("step")?,
            },
            "sample" => Self::StartSampling {
                count: args.required("n")?,
                save_images: args.optional("save")?.unwrap_or(false),
            },
            "scan" => Self::StartScanning {
                step_x: args.required("step_x")?,
                step_y: args.required("step_y")?,
                save_images: args.optional("save")?.unwrap_or(false),
            },
            "load" => {
                let cx = args.finite("cx")?;
                let cy = args.finite("cy")?;
                let center = match (cx, cy) {
                    (Some(x), Some(y)) => Some(Point2::new(x, y)),
                    (None, None) => None,
                    _ => return Err(parse_error(input, "cx and cy must be given together")),
                };
                let spec = SampleSpec {
                    sample_id: args.required("id")?,
                    mount_type: args.required("mount")?,
                    mm_per_layer: args.required_finite("layer_mm")?,
                    initial_height_mm: args.required_finite("height")?,
                    width_mm: args.required_finite("width")?,
                    height_mm: args.required_finite("length")?,
                    center,
                };
                spec.validate().map_err(|e| parse_error(input, e.to_string()))?;
                Self::LoadSample(spec)
            }
            "camera" => {
                let update = CameraUpdate {
                    exposure_us: args.optional("exposure")?,
                    gain: args.finite("gain")?,
                    contrast: args.finite("contrast")?,
                    color_temperature_k: args.optional("kelvin")?,
                };
                if update.is_empty() {
                    return Err(parse_error(input, "camera needs at least one setting"));
                }
                Self::UpdateCameraSettings(update)
            }
            other => return Err(parse_error(input, format!("unknown command '{}'", other))),
        };

        args.finish()?;
        Ok(command)
    }
}
