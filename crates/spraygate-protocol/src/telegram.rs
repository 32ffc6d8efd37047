//! Inbound telegram parser.
//!
//! [`parse_line`] is a pure, total function over one trimmed line. Matchers
//! are tried in a fixed precedence order and the first success wins; every
//! documented line form produces its event exactly once. Anything else is
//! [`TelegramEvent::Unrecognized`] and dropped silently by the caller.

use spraygate_types::{Axis, KeyedFields, LimitDirection, Status, TelegramEvent};

/// Parse one raw inbound line into a [`TelegramEvent`].
pub fn parse_line(raw: &str) -> TelegramEvent {
    let line = raw.trim();
    if line.is_empty() {
        return TelegramEvent::Unrecognized;
    }

    if let Some(event) = match_verbose_position(line) {
        return event;
    }
    if line.starts_with("Pressure pot") {
        return TelegramEvent::PressurePotReport(!line.contains("deactivated"));
    }
    if let Some(rest) = line.strip_prefix("State changed:") {
        return TelegramEvent::StateChanged(Status::from_wire(rest.trim()));
    }
    if let Some(event) = match_keyed_event(line) {
        return event;
    }
    if let Some(event) = match_legacy_position(line) {
        return event;
    }
    if let Some(rest) = line.strip_prefix("Temperature:")
        && let Ok(value) = rest.trim().parse::<f64>()
    {
        return TelegramEvent::TemperatureReport(value);
    }
    if line.starts_with("WARNING:") {
        // Warning text starts after the separator, i.e. "WARNING: <text>".
        let text = line.get(9..).unwrap_or("").to_string();
        return TelegramEvent::Warning(text);
    }
    if let Some(rest) = line.strip_prefix("LIMIT_CLEAR:")
        && let Some(axis) = Axis::from_wire(rest.trim())
    {
        return TelegramEvent::LimitCleared(axis);
    }
    if let Some(event) = match_limit_trigger(line) {
        return event;
    }
    if let Some(rest) = line.strip_prefix("Servo - Angle:")
        && let Ok(angle) = rest.trim().parse::<i32>()
    {
        return TelegramEvent::ServoReport(angle);
    }

    TelegramEvent::Unrecognized
}

/// `Position - X: <float> inches, Y: <float> inches`
fn match_verbose_position(line: &str) -> Option<TelegramEvent> {
    let rest = line.strip_prefix("Position - X:")?;
    let (x_part, y_part) = rest.split_once(',')?;
    let x = x_part.trim().strip_suffix("inches")?.trim().parse().ok()?;
    let y = y_part
        .trim()
        .strip_prefix("Y:")?
        .trim()
        .strip_suffix("inches")?
        .trim()
        .parse()
        .ok()?;
    Some(TelegramEvent::PositionReport { x, y })
}

/// `Position:<x>,<y>` (legacy colon form)
fn match_legacy_position(line: &str) -> Option<TelegramEvent> {
    let rest = line.strip_prefix("Position:")?;
    let (x_part, y_part) = rest.split_once(',')?;
    let x = x_part.trim().parse().ok()?;
    let y = y_part.trim().parse().ok()?;
    Some(TelegramEvent::PositionReport { x, y })
}

/// `LIMIT:<axis>_<MIN|MAX>`
fn match_limit_trigger(line: &str) -> Option<TelegramEvent> {
    let rest = line.strip_prefix("LIMIT:")?;
    let (axis_part, dir_part) = rest.trim().split_once('_')?;
    let axis = Axis::from_wire(axis_part)?;
    let direction = match dir_part {
        "MIN" => LimitDirection::Min,
        "MAX" => LimitDirection::Max,
        _ => return None,
    };
    Some(TelegramEvent::LimitTriggered { axis, direction })
}

/// `EVENTTYPE|k1=v1|k2=v2|...`: pipe-delimited with at least one key=value
/// segment. Unknown keys are ignored without error.
fn match_keyed_event(line: &str) -> Option<TelegramEvent> {
    let mut segments = line.split('|');
    let event_type = segments.next()?.trim();
    if event_type.is_empty() || event_type.contains('=') {
        return None;
    }

    let mut fields = KeyedFields::default();
    let mut saw_pair = false;
    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        saw_pair = true;
        match key.trim() {
            "command" => fields.command = value.trim().parse().ok(),
            "total_commands" => fields.total_commands = value.trim().parse().ok(),
            "row" => fields.row = value.trim().parse().ok(),
            "pattern" => fields.pattern = Some(value.to_string()),
            "single_side" => fields.single_side = Some(value.trim() == "true"),
            "details" => fields.details = Some(value.to_string()),
            "duration_ms" => fields.duration_ms = value.trim().parse().ok(),
            "movement_axis" => fields.movement_axis = Axis::from_wire(value.trim()),
            _ => {}
        }
    }
    if !saw_pair {
        return None;
    }

    Some(TelegramEvent::KeyedEvent {
        event_type: event_type.to_string(),
        fields,
    })
}
