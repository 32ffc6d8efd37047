//! Shared data model for the SprayGate stack.
//!
//! Everything that crosses a crate boundary lives here: the canonical
//! [`SystemState`], the parsed [`TelegramEvent`] variants, the subscriber
//! envelope [`ServerMessage`], configuration value types, and the global
//! [`GatewayError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of spray rows in a full pattern. Fixed by the physical jig.
pub const TOTAL_ROWS: u32 = 9;

// ────────────────────────────────────────────────────────────────────────────
// Controller status
// ────────────────────────────────────────────────────────────────────────────

/// Controller-reported machine status.
///
/// Wire state names that do not map to a variant become [`Status::Unknown`];
/// the status field is never left undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Idle,
    HomingX,
    HomingY,
    HomingRotation,
    Homed,
    Stopped,
    Paused,
    ExecutingPattern,
    Error,
    CycleComplete,
    Cleaning,
    PaintingSide,
    ManualRotating,
    Priming,
    Unknown,
}

impl Status {
    /// Map a controller state name (from a `State changed:` telegram) to a
    /// status variant. Unrecognized names map to [`Status::Unknown`].
    pub fn from_wire(name: &str) -> Self {
        match name {
            "IDLE" => Status::Idle,
            "HOMING_X" => Status::HomingX,
            "HOMING_Y" => Status::HomingY,
            "HOMING_ROTATION" => Status::HomingRotation,
            "HOMED" => Status::Homed,
            "STOPPED" => Status::Stopped,
            "PAUSED" => Status::Paused,
            "EXECUTING_PATTERN" => Status::ExecutingPattern,
            "ERROR" => Status::Error,
            "CYCLE_COMPLETE" => Status::CycleComplete,
            "CLEANING" => Status::Cleaning,
            "PAINTING_SIDE" => Status::PaintingSide,
            "MANUAL_ROTATING" => Status::ManualRotating,
            "PRIMING" => Status::Priming,
            _ => Status::Unknown,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Axes and sides
// ────────────────────────────────────────────────────────────────────────────

/// A motion axis of the gantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Parse a wire axis letter (`"X"` / `"Y"`).
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "X" => Some(Axis::X),
            "Y" => Some(Axis::Y),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A limit-switch direction on an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitDirection {
    Min,
    Max,
}

/// One of the five paint-application targets, independently enabled and
/// offset-configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Right,
    Back,
    Left,
    Lip,
}

impl Side {
    /// The outbound wire keyword for this side.
    pub fn keyword(&self) -> &'static str {
        match self {
            Side::Front => "FRONT",
            Side::Right => "RIGHT",
            Side::Back => "BACK",
            Side::Left => "LEFT",
            Side::Lip => "LIP",
        }
    }

    /// All sides in wire order (the order `SET_ENABLED_SIDES` lists them).
    pub fn all() -> [Side; 5] {
        [Side::Front, Side::Right, Side::Back, Side::Left, Side::Lip]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// System state
// ────────────────────────────────────────────────────────────────────────────

/// Gantry position in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Ambient controller health data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemInfo {
    /// Last reported controller temperature in °C.
    pub temperature: f64,
    /// Seconds since gateway process start, derived at snapshot time.
    pub uptime_secs: u64,
    pub last_maintenance_date: Option<DateTime<Utc>>,
}

/// Progress through the active spray pattern.
///
/// `row` is zero-based; the controller reports 1-based rows, which the state
/// store decrements on every merge. `completed_rows` never holds duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternProgress {
    pub command: u32,
    pub total_commands: u32,
    pub row: u32,
    pub total_rows: u32,
    pub pattern: String,
    pub single_side: bool,
    pub completed_rows: Vec<u32>,
    pub duration_ms: u64,
    pub axis: Option<Axis>,
    pub details: Option<String>,
}

impl Default for PatternProgress {
    fn default() -> Self {
        Self {
            command: 0,
            total_commands: 0,
            row: 0,
            total_rows: TOTAL_ROWS,
            pattern: String::new(),
            single_side: false,
            completed_rows: Vec::new(),
            duration_ms: 0,
            axis: None,
            details: None,
        }
    }
}

impl PatternProgress {
    /// Record a completed zero-based row. Idempotent: repeated reports of the
    /// same row leave `completed_rows` unchanged.
    pub fn mark_row_complete(&mut self, row: u32) {
        if !self.completed_rows.contains(&row) {
            self.completed_rows.push(row);
        }
    }
}

/// Per-axis limit-switch flags.
///
/// Flags are set only by an explicit trigger telegram and cleared only by an
/// explicit clear telegram for the axis, never implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AxisLimits {
    pub min: bool,
    pub max: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LimitSwitches {
    pub x: AxisLimits,
    pub y: AxisLimits,
}

/// The canonical, long-lived system state. Mutated only by the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemState {
    pub status: Status,
    pub position: Position,
    pub system_info: SystemInfo,
    pub pattern_progress: PatternProgress,
    pub pressure_pot_active: bool,
    pub limit_switches: LimitSwitches,
    pub servo_angle: i32,
}

// ────────────────────────────────────────────────────────────────────────────
// Telegram events
// ────────────────────────────────────────────────────────────────────────────

/// Optional fields carried by a pipe-delimited keyed-event telegram.
///
/// Absent keys stay `None`; unknown keys are dropped by the parser.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyedFields {
    pub command: Option<u32>,
    pub total_commands: Option<u32>,
    /// 1-based row as reported on the wire.
    pub row: Option<u32>,
    pub pattern: Option<String>,
    pub single_side: Option<bool>,
    pub details: Option<String>,
    pub duration_ms: Option<u64>,
    pub movement_axis: Option<Axis>,
}

/// One parsed inbound telegram. Created, consumed, and discarded within a
/// single processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelegramEvent {
    StateChanged(Status),
    KeyedEvent {
        event_type: String,
        fields: KeyedFields,
    },
    PositionReport {
        x: f64,
        y: f64,
    },
    TemperatureReport(f64),
    PressurePotReport(bool),
    LimitTriggered {
        axis: Axis,
        direction: LimitDirection,
    },
    LimitCleared(Axis),
    ServoReport(i32),
    Warning(String),
    Unrecognized,
}

// ────────────────────────────────────────────────────────────────────────────
// Notifications & subscriber envelope
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A side-channel notification delivered alongside state snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

/// Messages sent from the gateway to subscribers, as `{type, payload}`
/// structured text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    StateUpdate(SystemState),
    SettingsUpdate(Settings),
    ConfigsUpdate(Vec<ProfileInfo>),
    PatternConfig(PatternSettings),
    PositionUpdate(Position),
    ServoUpdate { angle: i32 },
    Warning(Notification),
    Error { message: String, timestamp: DateTime<Utc> },
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration value types
// ────────────────────────────────────────────────────────────────────────────

/// Per-side painting speed (fraction of maximum, (0, 1]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speeds {
    pub front: f64,
    pub right: f64,
    pub back: f64,
    pub left: f64,
    pub lip: f64,
}

impl Default for Speeds {
    fn default() -> Self {
        Self {
            front: 1.0,
            right: 1.0,
            back: 1.0,
            left: 1.0,
            lip: 1.0,
        }
    }
}

impl Speeds {
    pub fn get(&self, side: Side) -> f64 {
        match side {
            Side::Front => self.front,
            Side::Right => self.right,
            Side::Back => self.back,
            Side::Left => self.left,
            Side::Lip => self.lip,
        }
    }

    pub fn set(&mut self, side: Side, value: f64) {
        match side {
            Side::Front => self.front = value,
            Side::Right => self.right = value,
            Side::Back => self.back = value,
            Side::Left => self.left = value,
            Side::Lip => self.lip = value,
        }
    }
}

/// Maintenance cycle timings in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    pub prime_time_secs: u32,
    pub clean_time_secs: u32,
    pub back_wash_time_secs: u32,
    pub last_maintenance_date: Option<DateTime<Utc>>,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            prime_time_secs: 5,
            clean_time_secs: 10,
            back_wash_time_secs: 10,
            last_maintenance_date: None,
        }
    }
}

/// A pair of per-axis distances in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Travel {
    pub x: f64,
    pub y: f64,
}

/// Grid dimensions of the piece holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub x: u32,
    pub y: u32,
}

impl Default for GridSize {
    fn default() -> Self {
        Self { x: 9, y: 6 }
    }
}

/// Physical offset applied before painting one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SideOffset {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SideOffsets {
    pub front: SideOffset,
    pub right: SideOffset,
    pub back: SideOffset,
    pub left: SideOffset,
    pub lip: SideOffset,
}

impl SideOffsets {
    pub fn get(&self, side: Side) -> SideOffset {
        match side {
            Side::Front => self.front,
            Side::Right => self.right,
            Side::Back => self.back,
            Side::Left => self.left,
            Side::Lip => self.lip,
        }
    }

    pub fn set(&mut self, side: Side, offset: SideOffset) {
        match side {
            Side::Front => self.front = offset,
            Side::Right => self.right = offset,
            Side::Back => self.back = offset,
            Side::Left => self.left = offset,
            Side::Lip => self.lip = offset,
        }
    }
}

/// Which sides are enabled for painting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledSides {
    pub front: bool,
    pub right: bool,
    pub back: bool,
    pub left: bool,
    pub lip: bool,
}

impl Default for EnabledSides {
    fn default() -> Self {
        Self {
            front: true,
            right: true,
            back: true,
            left: true,
            lip: true,
        }
    }
}

impl EnabledSides {
    pub fn is_enabled(&self, side: Side) -> bool {
        match side {
            Side::Front => self.front,
            Side::Right => self.right,
            Side::Back => self.back,
            Side::Left => self.left,
            Side::Lip => self.lip,
        }
    }

    pub fn set(&mut self, side: Side, enabled: bool) {
        match side {
            Side::Front => self.front = enabled,
            Side::Right => self.right = enabled,
            Side::Back => self.back = enabled,
            Side::Left => self.left = enabled,
            Side::Lip => self.lip = enabled,
        }
    }

    /// True when at least one side is enabled.
    pub fn any(&self) -> bool {
        self.front || self.right || self.back || self.left || self.lip
    }
}

/// Pattern geometry pushed to the controller on every settings change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PatternSettings {
    pub grid: GridSize,
    pub horizontal_travel: Travel,
    pub vertical_travel: Travel,
    pub lip_travel: Travel,
    pub offsets: SideOffsets,
    pub enabled_sides: EnabledSides,
}

/// The full persisted configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub speeds: Speeds,
    #[serde(default)]
    pub maintenance: MaintenanceSettings,
    #[serde(default)]
    pub pattern: PatternSettings,
}

/// Metadata of one saved configuration profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub saved_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning serial-link failures, command validation, and
/// configuration I/O.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Serial open/write failure. Hands control to the reconnect supervisor.
    #[error("Link failure: {0}")]
    Link(String),

    /// Operator command failed validation. Delivered only to the requester.
    #[error("Command rejected: {0}")]
    CommandRejected(String),

    /// Configuration store I/O failure.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A broadcast or mpsc channel was closed unexpectedly.
    #[error("Channel error: {0}")]
    Channel(String),
}
