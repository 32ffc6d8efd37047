//! Single-writer state store.
//!
//! [`StateStore::apply`] computes the next full [`SystemState`] from the
//! current state plus one parsed telegram, replaces it, and broadcasts an
//! immutable snapshot through the [`BroadcastHub`]. The store is owned by
//! exactly one task (the telegram processing loop), so telegrams are applied
//! strictly in arrival order with no interleaving.

use chrono::Utc;
use spraygate_types::{
    Axis, KeyedFields, LimitDirection, Notification, PatternProgress, ServerMessage, Severity,
    Status, SystemState, TelegramEvent,
};
use std::time::Instant;
use tracing::{debug, warn};

use crate::hub::BroadcastHub;

const DEFAULT_ERROR_DETAILS: &str = "Unknown error occurred";

/// Owns the canonical [`SystemState`].
pub struct StateStore {
    state: SystemState,
    hub: BroadcastHub,
    started_at: Instant,
}

impl StateStore {
    pub fn new(hub: BroadcastHub) -> Self {
        Self {
            state: SystemState::default(),
            hub,
            started_at: Instant::now(),
        }
    }

    /// An immutable copy of the current state with uptime filled in.
    pub fn snapshot(&self) -> SystemState {
        let mut snap = self.state.clone();
        snap.system_info.uptime_secs = self.started_at.elapsed().as_secs();
        snap
    }

    /// Apply one parsed telegram and broadcast the resulting snapshot.
    ///
    /// [`TelegramEvent::Unrecognized`] is a strict no-op: no mutation, no
    /// broadcast. [`TelegramEvent::Warning`] leaves the canonical state
    /// untouched and only emits a low-severity notification.
    pub fn apply(&mut self, event: TelegramEvent) {
        match event {
            TelegramEvent::Unrecognized => return,
            TelegramEvent::Warning(text) => {
                warn!(%text, "controller warning");
                self.hub.publish(ServerMessage::Warning(Notification {
                    severity: Severity::Warning,
                    title: "Controller warning".to_string(),
                    message: text,
                }));
                return;
            }
            TelegramEvent::StateChanged(status) => self.apply_state_change(status),
            TelegramEvent::KeyedEvent { event_type, fields } => {
                self.apply_keyed_event(&event_type, fields)
            }
            TelegramEvent::PositionReport { x, y } => {
                self.state.position.x = x;
                self.state.position.y = y;
                self.hub
                    .publish(ServerMessage::PositionUpdate(self.state.position));
            }
            TelegramEvent::TemperatureReport(value) => {
                self.state.system_info.temperature = value;
            }
            TelegramEvent::PressurePotReport(active) => {
                self.state.pressure_pot_active = active;
            }
            TelegramEvent::LimitTriggered { axis, direction } => {
                let limits = match axis {
                    Axis::X => &mut self.state.limit_switches.x,
                    Axis::Y => &mut self.state.limit_switches.y,
                };
                match direction {
                    LimitDirection::Min => limits.min = true,
                    LimitDirection::Max => limits.max = true,
                }
                warn!(%axis, ?direction, "limit switch triggered");
            }
            TelegramEvent::LimitCleared(axis) => {
                let limits = match axis {
                    Axis::X => &mut self.state.limit_switches.x,
                    Axis::Y => &mut self.state.limit_switches.y,
                };
                limits.min = false;
                limits.max = false;
            }
            TelegramEvent::ServoReport(angle) => {
                self.state.servo_angle = angle;
                self.hub.publish(ServerMessage::ServoUpdate { angle });
            }
        }

        self.hub.publish(ServerMessage::StateUpdate(self.snapshot()));
    }

    /// Mirror the configuration collaborator's last-maintenance date into
    /// the canonical state. Broadcasts only when the value actually changes,
    /// so the processing loop can call this after every settings command.
    pub fn set_maintenance_date(&mut self, date: Option<chrono::DateTime<Utc>>) {
        if self.state.system_info.last_maintenance_date != date {
            self.state.system_info.last_maintenance_date = date;
            self.hub.publish(ServerMessage::StateUpdate(self.snapshot()));
        }
    }

    /// Force the error state after a serial-link failure and notify
    /// subscribers. Called by the supervisor path, not by telegrams.
    pub fn mark_link_failure(&mut self, message: &str) {
        self.state.status = Status::Error;
        self.hub.publish(ServerMessage::Error {
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        self.hub.publish(ServerMessage::StateUpdate(self.snapshot()));
    }

    // ── Transition rules ────────────────────────────────────────────────────

    fn apply_state_change(&mut self, status: Status) {
        debug!(from = ?self.state.status, to = ?status, "state changed");
        self.state.status = status;
        if status == Status::Homed {
            // Homing completes a cycle: pattern progress starts over.
            self.state.pattern_progress = PatternProgress::default();
        }
    }

    fn apply_keyed_event(&mut self, event_type: &str, fields: KeyedFields) {
        match event_type {
            "PATTERN_START" => {
                self.state.status = Status::ExecutingPattern;
                self.merge_progress(&fields, false);
            }
            "PATTERN_COMPLETE" => {
                self.state.status = if fields.single_side.unwrap_or(false) {
                    Status::Idle
                } else {
                    Status::Homed
                };
                self.state.pattern_progress.command = 0;
                self.state.pattern_progress.completed_rows.clear();
            }
            "SPRAY_COMPLETE" => {
                if let Some(row) = fields.row {
                    self.state
                        .pattern_progress
                        .mark_row_complete(row.saturating_sub(1));
                }
            }
            "SPRAY_START" => {
                if let Some(row) = fields.row {
                    self.state.pattern_progress.row = row.saturating_sub(1);
                }
            }
            "MOVE_X" | "MOVE_Y" => {
                self.merge_progress(&fields, true);
            }
            "ERROR" => {
                self.state.status = Status::Error;
                let details = fields
                    .details
                    .unwrap_or_else(|| DEFAULT_ERROR_DETAILS.to_string());
                warn!(%details, "controller error event");
                self.hub.publish(ServerMessage::Error {
                    message: details,
                    timestamp: Utc::now(),
                });
            }
            other => {
                debug!(event_type = other, "keyed event with no transition rule");
            }
        }
    }

    /// Merge present keyed fields into `pattern_progress`. Wire rows are
    /// 1-based and stored 0-based. `with_motion` additionally merges the
    /// movement axis and duration (MOVE_X / MOVE_Y events).
    fn merge_progress(&mut self, fields: &KeyedFields, with_motion: bool) {
        let progress = &mut self.state.pattern_progress;
        if let Some(command) = fields.command {
            progress.command = command;
        }
        if let Some(total) = fields.total_commands {
            progress.total_commands = total;
        }
        if let Some(row) = fields.row {
            progress.row = row.saturating_sub(1);
        }
        if let Some(single_side) = fields.single_side {
            progress.single_side = single_side;
        }
        if let Some(pattern) = &fields.pattern {
            progress.pattern = pattern.clone();
        }
        if with_motion {
            if let Some(axis) = fields.movement_axis {
                progress.axis = Some(axis);
            }
            if let Some(duration) = fields.duration_ms {
                progress.duration_ms = duration;
            }
        }
        if let Some(details) = &fields.details {
            progress.details = Some(details.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spraygate_protocol::parse_line;
    use spraygate_types::TOTAL_ROWS;
    use tokio::sync::broadcast::error::TryRecvError;

    fn store() -> StateStore {
        StateStore::new(BroadcastHub::default())
    }

    fn feed(store: &mut StateStore, line: &str) {
        store.apply(parse_line(line));
    }

    #[test]
    fn keyed_rows_are_stored_zero_based() {
        let mut s = store();
        feed(&mut s, "PATTERN_START|command=1|total_commands=20|row=4|pattern=grid");
        assert_eq!(s.snapshot().pattern_progress.row, 3);

        feed(&mut s, "SPRAY_START|row=7");
        assert_eq!(s.snapshot().pattern_progress.row, 6);
    }

    #[test]
    fn pattern_start_sets_executing_status() {
        let mut s = store();
        feed(&mut s, "PATTERN_START|command=1|total_commands=20|row=1|pattern=grid");
        let snap = s.snapshot();
        assert_eq!(snap.status, Status::ExecutingPattern);
        assert_eq!(snap.pattern_progress.pattern, "grid");
        assert_eq!(snap.pattern_progress.total_commands, 20);
    }

    #[test]
    fn spray_complete_is_idempotent() {
        let mut s = store();
        for _ in 0..5 {
            feed(&mut s, "SPRAY_COMPLETE|row=3");
        }
        feed(&mut s, "SPRAY_COMPLETE|row=4");
        assert_eq!(s.snapshot().pattern_progress.completed_rows, vec![2, 3]);
    }

    #[test]
    fn pattern_complete_single_side_goes_idle() {
        let mut s = store();
        feed(&mut s, "SPRAY_COMPLETE|row=1");
        feed(&mut s, "PATTERN_COMPLETE|single_side=true");
        let snap = s.snapshot();
        assert_eq!(snap.status, Status::Idle);
        assert_eq!(snap.pattern_progress.command, 0);
        assert!(snap.pattern_progress.completed_rows.is_empty());
    }

    #[test]
    fn pattern_complete_double_side_goes_homed() {
        let mut s = store();
        feed(&mut s, "PATTERN_COMPLETE|single_side=false");
        assert_eq!(s.snapshot().status, Status::Homed);
    }

    #[test]
    fn homed_resets_pattern_progress_fully() {
        let mut s = store();
        feed(&mut s, "PATTERN_START|command=5|total_commands=30|row=6|pattern=grid|single_side=true");
        feed(&mut s, "SPRAY_COMPLETE|row=6");
        feed(&mut s, "MOVE_X|movement_axis=X|duration_ms=900");
        feed(&mut s, "State changed: HOMED");

        let progress = s.snapshot().pattern_progress;
        assert_eq!(progress, PatternProgress::default());
        assert_eq!(progress.total_rows, TOTAL_ROWS);
        assert!(progress.axis.is_none());
    }

    #[test]
    fn move_events_merge_axis_and_duration_without_status_change() {
        let mut s = store();
        feed(&mut s, "State changed: PAINTING_SIDE");
        feed(&mut s, "MOVE_Y|command=3|row=2|movement_axis=Y|duration_ms=1200");
        let snap = s.snapshot();
        assert_eq!(snap.status, Status::PaintingSide);
        assert_eq!(snap.pattern_progress.axis, Some(Axis::Y));
        assert_eq!(snap.pattern_progress.duration_ms, 1200);
        assert_eq!(snap.pattern_progress.row, 1);
    }

    #[test]
    fn limit_trigger_sets_one_flag_clear_resets_axis() {
        let mut s = store();
        feed(&mut s, "LIMIT:X_MIN");
        let snap = s.snapshot();
        assert!(snap.limit_switches.x.min);
        assert!(!snap.limit_switches.x.max);
        assert!(!snap.limit_switches.y.min);
        assert!(!snap.limit_switches.y.max);

        feed(&mut s, "LIMIT:X_MAX");
        feed(&mut s, "LIMIT:Y_MAX");
        feed(&mut s, "LIMIT_CLEAR:X");
        let snap = s.snapshot();
        assert!(!snap.limit_switches.x.min);
        assert!(!snap.limit_switches.x.max);
        assert!(snap.limit_switches.y.max, "other axis must be untouched");
    }

    #[test]
    fn limits_not_cleared_by_position_or_state_telegrams() {
        let mut s = store();
        feed(&mut s, "LIMIT:Y_MIN");
        feed(&mut s, "Position:3.0,4.0");
        feed(&mut s, "State changed: IDLE");
        assert!(s.snapshot().limit_switches.y.min);
    }

    #[test]
    fn scalar_reports_update_only_their_fields() {
        let mut s = store();
        feed(&mut s, "Position - X: 1.25 inches, Y: 2.5 inches");
        feed(&mut s, "Temperature:41.5");
        feed(&mut s, "Servo - Angle: 120");
        feed(&mut s, "Pressure pot activated");

        let snap = s.snapshot();
        assert_eq!(snap.position.x, 1.25);
        assert_eq!(snap.position.y, 2.5);
        assert_eq!(snap.system_info.temperature, 41.5);
        assert_eq!(snap.servo_angle, 120);
        assert!(snap.pressure_pot_active);
        assert_eq!(snap.status, Status::Idle, "scalar reports never change status");
    }

    #[test]
    fn error_event_sets_status_and_notifies() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let mut s = StateStore::new(hub);

        feed(&mut s, "ERROR|details=Servo driver fault");
        assert_eq!(s.snapshot().status, Status::Error);

        let msg = rx.try_recv().unwrap();
        let ServerMessage::Error { message, .. } = msg else {
            panic!("expected Error notification first, got {msg:?}");
        };
        assert_eq!(message, "Servo driver fault");
        // Followed by the snapshot broadcast.
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::StateUpdate(_)));
    }

    #[test]
    fn error_event_without_details_uses_default_message() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let mut s = StateStore::new(hub);

        feed(&mut s, "ERROR|command=9");
        let ServerMessage::Error { message, .. } = rx.try_recv().unwrap() else {
            panic!("expected Error notification");
        };
        assert_eq!(message, DEFAULT_ERROR_DETAILS);
    }

    #[test]
    fn warning_notifies_without_mutating_state() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let mut s = StateStore::new(hub);
        let before = s.snapshot();

        feed(&mut s, "WARNING: Low paint level");

        let msg = rx.try_recv().unwrap();
        let ServerMessage::Warning(n) = msg else {
            panic!("expected Warning, got {msg:?}");
        };
        assert_eq!(n.severity, Severity::Warning);
        assert_eq!(n.message, "Low paint level");
        // No snapshot broadcast and no state change.
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
        let mut after = s.snapshot();
        after.system_info.uptime_secs = before.system_info.uptime_secs;
        assert_eq!(after, before);
    }

    #[test]
    fn unrecognized_is_a_strict_noop() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let mut s = StateStore::new(hub);
        let before = s.snapshot();

        feed(&mut s, "xyz garbage");

        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
        let mut after = s.snapshot();
        after.system_info.uptime_secs = before.system_info.uptime_secs;
        assert_eq!(after, before);
    }

    #[test]
    fn every_mutation_broadcasts_a_snapshot() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let mut s = StateStore::new(hub);

        feed(&mut s, "State changed: PRIMING");
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::StateUpdate(_)));

        feed(&mut s, "Servo - Angle: 45");
        // Servo reports publish the dedicated update first, then the snapshot.
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::ServoUpdate { angle: 45 }));
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::StateUpdate(_)));
    }

    #[test]
    fn maintenance_date_is_mirrored_into_snapshots() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let mut s = StateStore::new(hub);
        assert_eq!(s.snapshot().system_info.last_maintenance_date, None);

        let date = Utc::now();
        s.set_maintenance_date(Some(date));
        assert_eq!(s.snapshot().system_info.last_maintenance_date, Some(date));
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::StateUpdate(_)));

        // Same value again: no extra broadcast.
        s.set_maintenance_date(Some(date));
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn mark_link_failure_forces_error_state() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let mut s = StateStore::new(hub);

        s.mark_link_failure("serial port disappeared");
        assert_eq!(s.snapshot().status, Status::Error);
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Error { .. }));
    }
}
