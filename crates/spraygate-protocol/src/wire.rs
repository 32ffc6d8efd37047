//! Outbound command lines.
//!
//! Every command the gateway can send to the controller is a variant of
//! [`OutboundLine`]; the `Display` impl produces the exact ASCII line (no
//! trailing newline; the link layer appends it on write).

use spraygate_types::{Axis, EnabledSides, GridSize, Side, SideOffset, Travel};

/// One encoded outbound line of the controller protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundLine {
    Start,
    Stop,
    Home,
    Prime,
    Clean,
    BackWash,
    Pressure,
    /// Paint a single side: encodes the bare side keyword.
    PaintSide(Side),
    /// Signed rotation in degrees; right-hand rotations are positive.
    Rotate(i32),
    PaintPiece { row: u32, col: u32 },
    Speed { side: Side, value: f64 },
    MoveAxis { axis: Axis, distance: f64 },
    GotoAxis { axis: Axis, position: f64 },
    Goto { x: f64, y: f64 },
    Servo(i32),
    PrimeTime(u32),
    CleanTime(u32),
    BackWashTime(u32),
    SetHorizontalTravel(Travel),
    SetVerticalTravel(Travel),
    SetLipTravel(Travel),
    SetGrid(GridSize),
    SetEnabledSides(EnabledSides),
    SetOffset { side: Side, offset: SideOffset },
    ManualMove {
        axis: Axis,
        positive: bool,
        speed: f64,
        acceleration: f64,
    },
    ManualMoveDiagonal {
        x_positive: bool,
        y_positive: bool,
        speed: f64,
        acceleration: f64,
    },
    ManualStop,
    SprayStart,
    SprayStop,
}

fn sign(positive: bool) -> char {
    if positive { '+' } else { '-' }
}

impl std::fmt::Display for OutboundLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboundLine::Start => write!(f, "START"),
            OutboundLine::Stop => write!(f, "STOP"),
            OutboundLine::Home => write!(f, "HOME"),
            OutboundLine::Prime => write!(f, "PRIME"),
            OutboundLine::Clean => write!(f, "CLEAN"),
            OutboundLine::BackWash => write!(f, "BACK_WASH"),
            OutboundLine::Pressure => write!(f, "PRESSURE"),
            OutboundLine::PaintSide(side) => write!(f, "{}", side.keyword()),
            OutboundLine::Rotate(degrees) => write!(f, "ROTATE {degrees}"),
            OutboundLine::PaintPiece { row, col } => write!(f, "PAINT_PIECE {row} {col}"),
            OutboundLine::Speed { side, value } => {
                write!(f, "SPEED {} {}", side.keyword(), value)
            }
            OutboundLine::MoveAxis { axis, distance } => write!(f, "MOVE_{axis} {distance}"),
            OutboundLine::GotoAxis { axis, position } => write!(f, "GOTO_{axis} {position}"),
            OutboundLine::Goto { x, y } => write!(f, "GOTO {x:.2} {y:.2}"),
            OutboundLine::Servo(angle) => write!(f, "SERVO {angle}"),
            OutboundLine::PrimeTime(secs) => write!(f, "PRIME_TIME {secs}"),
            OutboundLine::CleanTime(secs) => write!(f, "CLEAN_TIME {secs}"),
            OutboundLine::BackWashTime(secs) => write!(f, "BACK_WASH_TIME {secs}"),
            OutboundLine::SetHorizontalTravel(t) => {
                write!(f, "SET_HORIZONTAL_TRAVEL {} {}", t.x, t.y)
            }
            OutboundLine::SetVerticalTravel(t) => write!(f, "SET_VERTICAL_TRAVEL {} {}", t.x, t.y),
            OutboundLine::SetLipTravel(t) => write!(f, "SET_LIP_TRAVEL {} {}", t.x, t.y),
            OutboundLine::SetGrid(g) => write!(f, "SET_GRID {} {}", g.x, g.y),
            OutboundLine::SetEnabledSides(sides) => {
                write!(
                    f,
                    "SET_ENABLED_SIDES FRONT={} RIGHT={} BACK={} LEFT={} LIP={}",
                    sides.front as u8,
                    sides.right as u8,
                    sides.back as u8,
                    sides.left as u8,
                    sides.lip as u8,
                )
            }
            OutboundLine::SetOffset { side, offset } => {
                write!(
                    f,
                    "SET_OFFSET {} {} {} {}",
                    side.keyword(),
                    offset.x,
                    offset.y,
                    offset.angle
                )
            }
            OutboundLine::ManualMove {
                axis,
                positive,
                speed,
                acceleration,
            } => {
                write!(
                    f,
                    "MANUAL_MOVE {axis} {} {speed} {acceleration}",
                    sign(*positive)
                )
            }
            OutboundLine::ManualMoveDiagonal {
                x_positive,
                y_positive,
                speed,
                acceleration,
            } => {
                write!(
                    f,
                    "MANUAL_MOVE_DIAGONAL X{} Y{} {speed} {acceleration}",
                    sign(*x_positive),
                    sign(*y_positive)
                )
            }
            OutboundLine::ManualStop => write!(f, "MANUAL_STOP"),
            OutboundLine::SprayStart => write!(f, "SPRAY_START"),
            OutboundLine::SprayStop => write!(f, "SPRAY_STOP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_keywords() {
        assert_eq!(OutboundLine::Start.to_string(), "START");
        assert_eq!(OutboundLine::BackWash.to_string(), "BACK_WASH");
        assert_eq!(OutboundLine::PaintSide(Side::Lip).to_string(), "LIP");
        assert_eq!(OutboundLine::ManualStop.to_string(), "MANUAL_STOP");
    }

    #[test]
    fn rotate_carries_sign() {
        assert_eq!(OutboundLine::Rotate(90).to_string(), "ROTATE 90");
        assert_eq!(OutboundLine::Rotate(-45).to_string(), "ROTATE -45");
    }

    #[test]
    fn paint_piece_row_col() {
        assert_eq!(
            OutboundLine::PaintPiece { row: 5, col: 8 }.to_string(),
            "PAINT_PIECE 5 8"
        );
    }

    #[test]
    fn goto_uses_two_decimal_places() {
        assert_eq!(
            OutboundLine::Goto { x: 1.5, y: 2.125 }.to_string(),
            "GOTO 1.50 2.13"
        );
    }

    #[test]
    fn axis_moves() {
        assert_eq!(
            OutboundLine::MoveAxis { axis: Axis::X, distance: 2.5 }.to_string(),
            "MOVE_X 2.5"
        );
        assert_eq!(
            OutboundLine::GotoAxis { axis: Axis::Y, position: 10.0 }.to_string(),
            "GOTO_Y 10"
        );
    }

    #[test]
    fn manual_move_cardinal_and_diagonal() {
        let line = OutboundLine::ManualMove {
            axis: Axis::Y,
            positive: false,
            speed: 0.5,
            acceleration: 1.0,
        };
        assert_eq!(line.to_string(), "MANUAL_MOVE Y - 0.5 1");

        let line = OutboundLine::ManualMoveDiagonal {
            x_positive: true,
            y_positive: false,
            speed: 1.0,
            acceleration: 0.8,
        };
        assert_eq!(line.to_string(), "MANUAL_MOVE_DIAGONAL X+ Y- 1 0.8");
    }

    #[test]
    fn enabled_sides_bitmap() {
        let mut sides = EnabledSides::default();
        sides.set(Side::Back, false);
        sides.set(Side::Lip, false);
        assert_eq!(
            OutboundLine::SetEnabledSides(sides).to_string(),
            "SET_ENABLED_SIDES FRONT=1 RIGHT=1 BACK=0 LEFT=1 LIP=0"
        );
    }

    #[test]
    fn offset_line() {
        let line = OutboundLine::SetOffset {
            side: Side::Right,
            offset: SideOffset { x: 1.5, y: -0.25, angle: 90.0 },
        };
        assert_eq!(line.to_string(), "SET_OFFSET RIGHT 1.5 -0.25 90");
    }

    #[test]
    fn maintenance_timings() {
        assert_eq!(OutboundLine::PrimeTime(5).to_string(), "PRIME_TIME 5");
        assert_eq!(OutboundLine::CleanTime(30).to_string(), "CLEAN_TIME 30");
        assert_eq!(OutboundLine::BackWashTime(12).to_string(), "BACK_WASH_TIME 12");
    }

    #[test]
    fn grid_and_travel() {
        assert_eq!(
            OutboundLine::SetGrid(GridSize { x: 9, y: 6 }).to_string(),
            "SET_GRID 9 6"
        );
        assert_eq!(
            OutboundLine::SetHorizontalTravel(Travel { x: 24.0, y: 6.5 }).to_string(),
            "SET_HORIZONTAL_TRAVEL 24 6.5"
        );
    }
}
