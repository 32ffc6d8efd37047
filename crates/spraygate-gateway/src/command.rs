//! Typed operator command set.
//!
//! Subscriber messages arrive as `{type, payload}` JSON. Decoding into
//! [`OperatorCommand`] is the first validation gate: a missing or mis-typed
//! field rejects the message before any handler runs.

use serde::{Deserialize, Serialize};
use spraygate_types::{Axis, PatternSettings, Settings, Side};

/// Start/stop selector for spray and manual-motion commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchState {
    Start,
    Stop,
}

/// Jog direction for manual motion, as sent by the operator UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveDirection {
    Left,
    Right,
    Forward,
    Backward,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
}

impl MoveDirection {
    /// Per-axis motion sign: `(x, y)` where `Some(true)` is the positive
    /// direction. Right is +X, forward is +Y.
    pub fn axes(&self) -> (Option<bool>, Option<bool>) {
        match self {
            MoveDirection::Left => (Some(false), None),
            MoveDirection::Right => (Some(true), None),
            MoveDirection::Forward => (None, Some(true)),
            MoveDirection::Backward => (None, Some(false)),
            MoveDirection::ForwardLeft => (Some(false), Some(true)),
            MoveDirection::ForwardRight => (Some(true), Some(true)),
            MoveDirection::BackwardLeft => (Some(false), Some(false)),
            MoveDirection::BackwardRight => (Some(true), Some(false)),
        }
    }
}

/// Every command a subscriber may send, one variant per `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorCommand {
    StartPainting,
    Stop,
    Home,
    Prime,
    Clean,
    BackWash,
    TogglePressurePot,
    PaintFront,
    PaintRight,
    PaintBack,
    PaintLeft,
    PaintLip,
    PaintPiece {
        row: u32,
        col: u32,
    },
    RotateSpinner {
        direction: String,
        degrees: u32,
    },
    SetServoAngle {
        angle: f64,
    },
    MoveToPosition {
        x: f64,
        y: f64,
        speed: Option<f64>,
        acceleration: Option<f64>,
    },
    MoveAxis {
        axis: Axis,
        distance: f64,
    },
    GotoAxis {
        axis: Axis,
        position: f64,
    },
    ManualMove {
        direction: MoveDirection,
        state: SwitchState,
        speed: Option<f64>,
        acceleration: Option<f64>,
    },
    ToggleSpray {
        state: SwitchState,
    },
    SetSpeed {
        side: Side,
        value: f64,
    },
    SetPrimeTime {
        seconds: u32,
    },
    SetCleanTime {
        seconds: u32,
    },
    SetBackWashTime {
        seconds: u32,
    },
    UpdatePatternConfig(PatternSettings),
    UpdateSettings(Settings),
    SaveConfig {
        name: String,
        description: Option<String>,
    },
    LoadConfig {
        name: String,
    },
    GetConfigs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_command_decodes_from_bare_type() {
        let cmd: OperatorCommand = serde_json::from_str(r#"{"type":"START_PAINTING"}"#).unwrap();
        assert_eq!(cmd, OperatorCommand::StartPainting);
    }

    #[test]
    fn paint_piece_decodes_with_payload() {
        let cmd: OperatorCommand =
            serde_json::from_str(r#"{"type":"PAINT_PIECE","payload":{"row":5,"col":8}}"#).unwrap();
        assert_eq!(cmd, OperatorCommand::PaintPiece { row: 5, col: 8 });
    }

    #[test]
    fn missing_required_field_is_a_decode_error() {
        let result: Result<OperatorCommand, _> =
            serde_json::from_str(r#"{"type":"PAINT_PIECE","payload":{"row":5}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_type_is_a_decode_error() {
        let result: Result<OperatorCommand, _> =
            serde_json::from_str(r#"{"type":"SELF_DESTRUCT"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn manual_move_decodes_kebab_case_direction() {
        let cmd: OperatorCommand = serde_json::from_str(
            r#"{"type":"MANUAL_MOVE","payload":{"direction":"forward-left","state":"START"}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            OperatorCommand::ManualMove {
                direction: MoveDirection::ForwardLeft,
                state: SwitchState::Start,
                speed: None,
                acceleration: None,
            }
        );
    }

    #[test]
    fn mistyped_field_is_a_decode_error() {
        let result: Result<OperatorCommand, _> =
            serde_json::from_str(r#"{"type":"SET_SERVO_ANGLE","payload":{"angle":"ninety"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn direction_axes_cover_cardinals_and_diagonals() {
        assert_eq!(MoveDirection::Right.axes(), (Some(true), None));
        assert_eq!(MoveDirection::Backward.axes(), (None, Some(false)));
        assert_eq!(MoveDirection::BackwardRight.axes(), (Some(true), Some(false)));
    }

}
