/// Keyboard to command mapping
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

/// Camera distance change per key press
pub const DISTANCE_STEP: f32 = 0.1;
/// Model rotation per key press (radians)
pub const ROTATION_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Change the orbit camera distance by the given amount
    Zoom(f32),
    Rotate { dx: f32, dy: f32, dz: f32 },
    ToggleModel,
    TogglePoints,
    /// Scale the pending resample density by the given factor
    ScaleDensity(f32),
    Resample,
    Save,
    Quit,
}

pub fn command_for_key(event: &KeyEvent) -> Option<Command> {
    // Some platforms also report releases and repeats
    if event.kind != KeyEventKind::Press {
        return None;
    }

    let command = match event.code {
        KeyCode::Char('q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char(',') => Command::Zoom(-DISTANCE_STEP),
        KeyCode::Char('.') => Command::Zoom(DISTANCE_STEP),
        KeyCode::Char('1') => Command::ToggleModel,
        KeyCode::Char('2') => Command::TogglePoints,
        KeyCode::Char('[') => Command::ScaleDensity(0.5),
        KeyCode::Char(']') => Command::ScaleDensity(2.0),
        KeyCode::Char('r') => Command::Resample,
        KeyCode::Char('s') => Command::Save,
        KeyCode::Char('w') | KeyCode::Up => Command::Rotate {
            dx: ROTATION_STEP,
            dy: 0.0,
            dz: 0.0,
        },
        KeyCode::Down => Command::Rotate {
            dx: -ROTATION_STEP,
            dy: 0.0,
            dz: 0.0,
        },
        KeyCode::Char('a') | KeyCode::Left => Command::Rotate {
            dx: 0.0,
            dy: -ROTATION_STEP,
            dz: 0.0,
        },
        KeyCode::Char('d') | KeyCode::Right => Command::Rotate {
            dx: 0.0,
            dy: ROTATION_STEP,
            dz: 0.0,
        },
        _ => return None,
    };
    Some(command)
}
