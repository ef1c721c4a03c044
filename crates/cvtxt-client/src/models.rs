//! Request and response records of the controller REST API.
//!
//! Field names match the controller's JSON. Optional fields are omitted when `None`.

use serde::{Deserialize, Serialize};

/// Identity and firmware versions of one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controller {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_lib_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<i64>,
}

/// Sensor attached to a controller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputDevice {
    MiniSwitch,
    PhotoResistor,
    UltrasonicDistanceMeter,
    PhotoTransistor,
    ColorSensor,
    NtcResistor,
    TrailFollower,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<InputDevice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

/// Rotation direction of a motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "CW")]
    Clockwise,
    #[serde(rename = "CCW")]
    CounterClockwise,
}

/// A generic controller output with one value per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub values: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motor {
    #[serde(flatten)]
    pub output: Output,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl Motor {
    /// A motor update driving all channels at `speed` in `direction`.
    pub fn new(speed: i32, direction: Direction) -> Self {
        Self {
            output: Output {
                values: vec![speed],
                ..Output::default()
            },
            direction: Some(direction),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Servomotor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: i32,
}

/// Camera capture settings sent when starting the camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub debug: bool,
    pub fps: u32,
    pub height: u32,
    pub rotate: bool,
    pub width: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            debug: false,
            fps: 30,
            height: 480,
            rotate: false,
            width: 640,
        }
    }
}

/// An area of the camera image, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rectangle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallDetector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Rectangle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_range_value: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ball_diameter: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ball_diameter: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgb: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_range_value: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl Default for BallDetector {
    fn default() -> Self {
        Self {
            area: None,
            end_range_value: Some(100),
            max_ball_diameter: Some(20),
            min_ball_diameter: Some(5),
            name: None,
            rgb: None,
            start_range_value: Some(-100),
            tolerance: Some(1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorDetector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Rectangle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for ColorDetector {
    fn default() -> Self {
        Self {
            area: None,
            contrast: Some(1.0),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineDetector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Rectangle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_range_value: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_line_width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_line_width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_lines: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_range_value: Option<i32>,
}

impl Default for LineDetector {
    fn default() -> Self {
        Self {
            area: None,
            end_range_value: Some(100),
            invert: None,
            max_line_width: Some(20),
            min_line_width: Some(5),
            name: None,
            number_of_lines: Some(1),
            start_range_value: Some(-100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDetector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Rectangle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self {
            area: None,
            name: None,
            tolerance: Some(1.0),
        }
    }
}

/// Detectors the camera runs on every captured image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRecognitionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ball_detectors: Option<Vec<BallDetector>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_areas: Option<Vec<Rectangle>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_detectors: Option<Vec<ColorDetector>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_detectors: Option<Vec<LineDetector>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_detectors: Option<Vec<MotionDetector>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub line: u32,
}

/// A watch expression evaluated by the remote debugger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub expression_key: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramLocation {
    pub current_frame: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methodname: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<Vec<Breakpoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expressions: Option<Vec<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdb_args: Option<Vec<String>>,
}

/// Debugger state reported at a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebuggerResponse {
    pub breakpoints: Vec<Breakpoint>,
    pub callstack: Vec<ProgramLocation>,
    pub expressions: Vec<Expression>,
    pub program_location: ProgramLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enabled {
    pub enabled: bool,
}
