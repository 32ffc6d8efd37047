//! Command validation and encoding.
//!
//! The [`CommandGateway`] is the only writer to the serial link. Every
//! operator command is validated against the active configuration, encoded
//! into one or more outbound lines, and written as a single awaited sequence.
//! A rejected command returns [`GatewayError::CommandRejected`] before any
//! byte reaches the link.

use spraygate_config::ConfigStore;
use spraygate_link::LinkHandle;
use spraygate_protocol::OutboundLine;
use spraygate_state::BroadcastHub;
use spraygate_types::{Axis, GatewayError, PatternSettings, ServerMessage, Side};
use tracing::{debug, info};

use crate::command::{MoveDirection, OperatorCommand, SwitchState};

/// Largest accepted spinner rotation per command. Also keeps the signed wire
/// value far away from integer overflow when negating.
const MAX_ROTATION_DEGREES: u32 = 360;

// ────────────────────────────────────────────────────────────────────────────
// CommandGateway
// ────────────────────────────────────────────────────────────────────────────

/// Validates operator commands and drives the serial link.
pub struct CommandGateway {
    config: ConfigStore,
    link: LinkHandle,
    hub: BroadcastHub,
}

impl CommandGateway {
    pub fn new(config: ConfigStore, link: LinkHandle, hub: BroadcastHub) -> Self {
        Self { config, link, hub }
    }

    /// The active configuration store.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Validate, encode, and execute one operator command.
    ///
    /// # Errors
    ///
    /// [`GatewayError::CommandRejected`] when validation fails (nothing is
    /// written), [`GatewayError::Link`] when the serial write fails, and
    /// [`GatewayError::Config`] when a configuration mutation cannot be
    /// persisted.
    pub async fn handle(&mut self, command: OperatorCommand) -> Result<(), GatewayError> {
        debug!(?command, "handling operator command");

        match command {
            OperatorCommand::StartPainting => {
                if !self.config.pattern().enabled_sides.any() {
                    return Err(GatewayError::CommandRejected(
                        "cannot start painting: no sides are enabled".to_string(),
                    ));
                }
                self.send(OutboundLine::Start).await
            }
            OperatorCommand::Stop => self.send(OutboundLine::Stop).await,
            OperatorCommand::Home => self.send(OutboundLine::Home).await,
            OperatorCommand::Prime => self.send(OutboundLine::Prime).await,
            OperatorCommand::Clean => self.send(OutboundLine::Clean).await,
            OperatorCommand::BackWash => self.send(OutboundLine::BackWash).await,
            OperatorCommand::TogglePressurePot => self.send(OutboundLine::Pressure).await,
            OperatorCommand::PaintFront => self.paint_side(Side::Front).await,
            OperatorCommand::PaintRight => self.paint_side(Side::Right).await,
            OperatorCommand::PaintBack => self.paint_side(Side::Back).await,
            OperatorCommand::PaintLeft => self.paint_side(Side::Left).await,
            OperatorCommand::PaintLip => self.paint_side(Side::Lip).await,
            OperatorCommand::PaintPiece { row, col } => {
                if row >= 6 {
                    return Err(GatewayError::CommandRejected(format!(
                        "piece row {row} out of range, must be 0..=5"
                    )));
                }
                if col >= 9 {
                    return Err(GatewayError::CommandRejected(format!(
                        "piece column {col} out of range, must be 0..=8"
                    )));
                }
                self.send(OutboundLine::PaintPiece { row, col }).await
            }
            OperatorCommand::RotateSpinner { direction, degrees } => {
                if degrees > MAX_ROTATION_DEGREES {
                    return Err(GatewayError::CommandRejected(format!(
                        "rotation of {degrees} degrees out of range, must be 0..={MAX_ROTATION_DEGREES}"
                    )));
                }
                let signed = if direction == "right" {
                    degrees as i32
                } else {
                    -(degrees as i32)
                };
                self.send(OutboundLine::Rotate(signed)).await
            }
            OperatorCommand::SetServoAngle { angle } => {
                if !(0.0..=180.0).contains(&angle) {
                    return Err(GatewayError::CommandRejected(format!(
                        "servo angle {angle} out of range, must be 0..=180"
                    )));
                }
                self.send(OutboundLine::Servo(angle.round() as i32)).await
            }
            OperatorCommand::MoveToPosition {
                x,
                y,
                speed,
                acceleration,
            } => {
                fraction("speed", speed)?;
                fraction("acceleration", acceleration)?;
                self.send(OutboundLine::Goto { x, y }).await
            }
            OperatorCommand::MoveAxis { axis, distance } => {
                self.send(OutboundLine::MoveAxis { axis, distance }).await
            }
            OperatorCommand::GotoAxis { axis, position } => {
                self.send(OutboundLine::GotoAxis { axis, position }).await
            }
            OperatorCommand::ManualMove {
                direction,
                state,
                speed,
                acceleration,
            } => {
                if state == SwitchState::Stop {
                    return self.send(OutboundLine::ManualStop).await;
                }
                let speed = fraction("speed", speed)?;
                let acceleration = fraction("acceleration", acceleration)?;
                self.send(manual_move_line(direction, speed, acceleration))
                    .await
            }
            OperatorCommand::ToggleSpray { state } => match state {
                SwitchState::Start => self.send(OutboundLine::SprayStart).await,
                SwitchState::Stop => self.send(OutboundLine::SprayStop).await,
            },
            OperatorCommand::SetSpeed { side, value } => {
                let value = fraction("speed", Some(value))?;
                self.config.update_speed(side, value)?;
                self.send_settings_change(OutboundLine::Speed { side, value })
                    .await
            }
            OperatorCommand::SetPrimeTime { seconds } => {
                let seconds = seconds.clamp(1, 30);
                let mut maintenance = self.config.maintenance().clone();
                maintenance.prime_time_secs = seconds;
                self.config.update_maintenance(maintenance)?;
                self.send_settings_change(OutboundLine::PrimeTime(seconds))
                    .await
            }
            OperatorCommand::SetCleanTime { seconds } => {
                let seconds = seconds.clamp(1, 60);
                let mut maintenance = self.config.maintenance().clone();
                maintenance.clean_time_secs = seconds;
                self.config.update_maintenance(maintenance)?;
                self.send_settings_change(OutboundLine::CleanTime(seconds))
                    .await
            }
            OperatorCommand::SetBackWashTime { seconds } => {
                let seconds = seconds.clamp(1, 120);
                let mut maintenance = self.config.maintenance().clone();
                maintenance.back_wash_time_secs = seconds;
                self.config.update_maintenance(maintenance)?;
                self.send_settings_change(OutboundLine::BackWashTime(seconds))
                    .await
            }
            OperatorCommand::UpdatePatternConfig(pattern) => {
                self.config.update_pattern(pattern)?;
                self.push_configuration().await?;
                self.hub
                    .publish(ServerMessage::PatternConfig(self.config.pattern().clone()));
                self.broadcast_settings();
                Ok(())
            }
            OperatorCommand::UpdateSettings(settings) => {
                self.config.update_settings(settings)?;
                self.push_configuration().await?;
                self.broadcast_settings();
                Ok(())
            }
            OperatorCommand::SaveConfig { name, description } => {
                let info = self.config.save_profile(&name, description.as_deref())?;
                info!(name = info.name, "profile saved");
                self.broadcast_profiles()?;
                Ok(())
            }
            OperatorCommand::LoadConfig { name } => {
                self.config.load_profile(&name)?;
                info!(name, "profile loaded");
                self.push_configuration().await?;
                self.broadcast_settings();
                self.broadcast_profiles()?;
                Ok(())
            }
            OperatorCommand::GetConfigs => self.broadcast_profiles(),
        }
    }

    async fn paint_side(&self, side: Side) -> Result<(), GatewayError> {
        if !self.config.pattern().enabled_sides.is_enabled(side) {
            return Err(GatewayError::CommandRejected(format!(
                "side {} is disabled in the pattern configuration",
                side.keyword()
            )));
        }
        self.send(OutboundLine::PaintSide(side)).await
    }

    async fn send(&self, line: OutboundLine) -> Result<(), GatewayError> {
        self.link.write_line(&line.to_string()).await
    }

    async fn send_burst(&self, lines: Vec<OutboundLine>) -> Result<(), GatewayError> {
        let rendered: Vec<String> = lines.iter().map(ToString::to_string).collect();
        self.link.write_lines(&rendered).await
    }

    /// Push the full derived configuration to the controller as one
    /// uninterruptible write burst.
    pub async fn push_configuration(&self) -> Result<(), GatewayError> {
        self.send_burst(configuration_lines(self.config.pattern()))
            .await
    }

    /// Scalar settings change: the dedicated line plus the re-derived full
    /// configuration sequence, one burst, then the settings broadcast.
    async fn send_settings_change(&self, line: OutboundLine) -> Result<(), GatewayError> {
        self.send_burst(settings_burst(line, self.config.pattern()))
            .await?;
        self.broadcast_settings();
        Ok(())
    }

    fn broadcast_settings(&self) {
        self.hub
            .publish(ServerMessage::SettingsUpdate(self.config.settings().clone()));
    }

    fn broadcast_profiles(&self) -> Result<(), GatewayError> {
        let profiles = self.config.list_profiles()?;
        self.hub.publish(ServerMessage::ConfigsUpdate(profiles));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Encoding helpers
// ────────────────────────────────────────────────────────────────────────────

/// The outbound configuration sequence derived from the pattern settings:
/// grid, travel distances, per-side offsets, then the enabled-sides bitmap.
pub fn configuration_lines(pattern: &PatternSettings) -> Vec<OutboundLine> {
    let mut lines = vec![
        OutboundLine::SetGrid(pattern.grid),
        OutboundLine::SetHorizontalTravel(pattern.horizontal_travel),
        OutboundLine::SetVerticalTravel(pattern.vertical_travel),
        OutboundLine::SetLipTravel(pattern.lip_travel),
    ];
    for side in Side::all() {
        lines.push(OutboundLine::SetOffset {
            side,
            offset: pattern.offsets.get(side),
        });
    }
    lines.push(OutboundLine::SetEnabledSides(pattern.enabled_sides));
    lines
}

/// The write burst for a scalar settings command: the dedicated line first,
/// then the full configuration sequence re-derived from the pattern settings.
fn settings_burst(line: OutboundLine, pattern: &PatternSettings) -> Vec<OutboundLine> {
    let mut lines = vec![line];
    lines.extend(configuration_lines(pattern));
    lines
}

fn manual_move_line(direction: MoveDirection, speed: f64, acceleration: f64) -> OutboundLine {
    match direction.axes() {
        (Some(x_positive), Some(y_positive)) => OutboundLine::ManualMoveDiagonal {
            x_positive,
            y_positive,
            speed,
            acceleration,
        },
        (Some(positive), None) => OutboundLine::ManualMove {
            axis: Axis::X,
            positive,
            speed,
            acceleration,
        },
        (None, Some(positive)) => OutboundLine::ManualMove {
            axis: Axis::Y,
            positive,
            speed,
            acceleration,
        },
        (None, None) => OutboundLine::ManualStop,
    }
}

/// Default-and-validate an optional motion fraction: absent means 1.0, and
/// any present value must lie in (0, 1].
fn fraction(name: &str, value: Option<f64>) -> Result<f64, GatewayError> {
    let v = value.unwrap_or(1.0);
    if v > 0.0 && v <= 1.0 {
        Ok(v)
    } else {
        Err(GatewayError::CommandRejected(format!(
            "{name} must be in (0, 1], got {v}"
        )))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
