// Keyboard jog: Left/Right focus, Up/Down zoom, [/] iris, +/- step size,
// H home all, I toggle IRC, Q quit
//
// Every move blocks until the board replies, so keys pressed during a move are
// handled once it finishes.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{info, warn};

use crate::motor::{LensBoard, Link, MotorId};

const STEP_SIZES: [i32; 3] = [10, 50, 200];
const POLL: Duration = Duration::from_millis(50);

/// Action bound to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogAction {
    Nudge(MotorId, i32),
    HomeAll,
    ToggleIrc,
    Faster,
    Slower,
    Quit,
}

/// Map a key to an action; `step` is the current step size
pub fn action_for(code: KeyCode, step: i32) -> Option<JogAction> {
    match code {
        KeyCode::Right => Some(JogAction::Nudge(MotorId::Focus, step)),
        KeyCode::Left => Some(JogAction::Nudge(MotorId::Focus, -step)),
        KeyCode::Up => Some(JogAction::Nudge(MotorId::Zoom, step)),
        KeyCode::Down => Some(JogAction::Nudge(MotorId::Zoom, -step)),
        // Iris travel is short; nudge it by a tenth of the step size
        KeyCode::Char(']') => Some(JogAction::Nudge(MotorId::Iris, (step / 10).max(1))),
        KeyCode::Char('[') => Some(JogAction::Nudge(MotorId::Iris, -(step / 10).max(1))),
        KeyCode::Char('h') => Some(JogAction::HomeAll),
        KeyCode::Char('i') => Some(JogAction::ToggleIrc),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(JogAction::Faster),
        KeyCode::Char('-') => Some(JogAction::Slower),
        KeyCode::Char('q') | KeyCode::Esc => Some(JogAction::Quit),
        _ => None,
    }
}

/// Run the jog loop until Q/Esc
pub fn run<L: Link>(board: &mut LensBoard<L>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Controls: Left/Right=focus, Up/Down=zoom, [/]=iris, +/-=step, H=home, I=IRC, Q=quit");
    enable_raw_mode()?;
    let result = jog_loop(board);
    disable_raw_mode()?;
    result
}

fn jog_loop<L: Link>(board: &mut LensBoard<L>) -> Result<(), Box<dyn std::error::Error>> {
    let mut step_idx: usize = 1;
    let mut irc_on = false;

    loop {
        if !event::poll(POLL)? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press && kind != KeyEventKind::Repeat {
            continue;
        }

        match action_for(code, STEP_SIZES[step_idx]) {
            Some(JogAction::Nudge(id, steps)) => match board.motor(id) {
                Ok(mut motor) => {
                    if let Err(e) = motor.move_rel(steps, true) {
                        warn!("{} jog failed: {}", id, e);
                    }
                    info!("{} at step {}", id, motor.current_step());
                }
                Err(e) => warn!("{}", e),
            },
            Some(JogAction::HomeAll) => {
                for id in [MotorId::Focus, MotorId::Zoom, MotorId::Iris] {
                    if let Ok(mut motor) = board.motor(id) {
                        match motor.home() {
                            Ok(()) => info!("{} homed at {}", id, motor.current_step()),
                            Err(e) => warn!("{} home failed: {}", id, e),
                        }
                    }
                }
            }
            Some(JogAction::ToggleIrc) => match board.set_irc_state(!irc_on) {
                Ok(()) => irc_on = !irc_on,
                Err(e) => warn!("IRC switch failed: {}", e),
            },
            Some(JogAction::Faster) => {
                step_idx = (step_idx + 1).min(STEP_SIZES.len() - 1);
                info!("Step size: {}", STEP_SIZES[step_idx]);
            }
            Some(JogAction::Slower) => {
                step_idx = step_idx.saturating_sub(1);
                info!("Step size: {}", STEP_SIZES[step_idx]);
            }
            Some(JogAction::Quit) => break,
            None => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(
            action_for(KeyCode::Right, 50),
            Some(JogAction::Nudge(MotorId::Focus, 50))
        );
        assert_eq!(
            action_for(KeyCode::Down, 200),
            Some(JogAction::Nudge(MotorId::Zoom, -200))
        );
        assert_eq!(
            action_for(KeyCode::Char('['), 10),
            Some(JogAction::Nudge(MotorId::Iris, -1))
        );
        assert_eq!(action_for(KeyCode::Esc, 10), Some(JogAction::Quit));
        assert_eq!(action_for(KeyCode::Char('x'), 10), None);
    }
}
