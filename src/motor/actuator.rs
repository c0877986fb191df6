// Shared actuator capability and the IR-cut filter switch
//
// Steppers track a step position; the IRC is a DC motor driven for a fixed
// time in one direction or the other, so it only remembers the last state.

use tracing::{error, info};

use super::codec::Codec;
use super::link::Link;
use super::protocol::{Acceleration, MotorId, MotorType};
use super::stepper::StepperMotor;
use crate::config::{IRC_SWITCH_SPEED, IRC_SWITCH_STEPS, IRC_TRAVEL_STEPS};
use crate::errors::{Component, McrError, Result};
use crate::messages::{IrcFilter, PositionState};

/// Anything the board can move
pub trait Actuator {
    fn id(&self) -> MotorId;

    /// Move by a signed number of steps (for a DC motor, 1 step = 1 ms)
    fn move_steps<L: Link>(&mut self, codec: &mut Codec<L>, steps: i32) -> Result<()>;

    fn position(&self) -> PositionState;
}

impl Actuator for StepperMotor {
    fn id(&self) -> MotorId {
        StepperMotor::id(self)
    }

    fn move_steps<L: Link>(&mut self, codec: &mut Codec<L>, steps: i32) -> Result<()> {
        self.move_rel(codec, steps, true)
    }

    fn position(&self) -> PositionState {
        PositionState::Stepper {
            step: self.current_step(),
            homed: self.is_homed(),
        }
    }
}

/// Two-position IR-cut filter switch (DC motor, no PI feedback)
#[derive(Debug, Clone, Default)]
pub struct IrcSwitch {
    filter: Option<IrcFilter>,
}

impl IrcSwitch {
    /// Configure the IRC motor. It is never homed.
    ///
    /// The travel of 1000 steps allows up to 1 s of activation at 1000 pps.
    pub fn init<L: Link>(codec: &mut Codec<L>) -> Result<Self> {
        let id = MotorId::Irc;
        if let Err(e) = codec.init_motor(id, IRC_TRAVEL_STEPS, 0, id.speed_class(), MotorType::Dc) {
            error!("IRC motor not initialized: {}", e);
            let err = McrError::NotInitialized { motor: id };
            codec.errors().record(err.clone(), Component::Motor(id));
            return Err(err);
        }
        info!("IRC motor initialized");
        Ok(Self::default())
    }

    /// Last filter position commanded, if any
    pub fn filter(&self) -> Option<IrcFilter> {
        self.filter
    }

    /// Drive the switch to the visible (true) or clear (false) filter
    pub fn set_state<L: Link>(&mut self, codec: &mut Codec<L>, on: bool) -> Result<()> {
        let steps = if on { IRC_SWITCH_STEPS } else { -IRC_SWITCH_STEPS };
        self.move_steps(codec, steps)?;
        self.filter = Some(IrcFilter::from(on));
        info!("IRC set to {:?}", IrcFilter::from(on));
        Ok(())
    }
}

impl Actuator for IrcSwitch {
    fn id(&self) -> MotorId {
        MotorId::Irc
    }

    fn move_steps<L: Link>(&mut self, codec: &mut Codec<L>, steps: i32) -> Result<()> {
        codec.move_motor(MotorId::Irc, steps, IRC_SWITCH_SPEED, Acceleration::default())
    }

    fn position(&self) -> PositionState {
        PositionState::Switch {
            filter: self.filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::CodecConfig;
    use crate::errors::ErrorRegistry;
    use crate::motor::link::MockLink;
    use crate::motor::protocol::MoveCommand;

    fn codec() -> Codec<MockLink> {
        let config = CodecConfig {
            response_window: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
            ..CodecConfig::default()
        };
        Codec::new(MockLink::new(), config, ErrorRegistry::new())
    }

    #[test]
    fn test_irc_switch_moves_fixed_duration() {
        let mut codec = codec();
        let mut irc = IrcSwitch::init(&mut codec).unwrap();
        assert_eq!(irc.position(), PositionState::Switch { filter: None });

        irc.set_state(&mut codec, true).unwrap();
        irc.set_state(&mut codec, false).unwrap();
        assert_eq!(irc.filter(), Some(IrcFilter::Clear));

        let link = codec.link().unwrap();
        let setup = &link.written()[0];
        assert_eq!(setup[1], 0x04);
        assert_eq!(setup[2], 0x01); // DC motor
        assert_eq!(&setup[5..7], &[0x03, 0xE8]);

        let moves: Vec<MoveCommand> = link.written()[1..]
            .iter()
            .filter_map(|f| MoveCommand::decode(f))
            .collect();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].signed_steps(), 50);
        assert_eq!(moves[0].speed, 1000);
        assert_eq!(moves[1].signed_steps(), -50);
    }

    #[test]
    fn test_irc_failed_switch_keeps_state() {
        let mut codec = codec();
        let mut irc = IrcSwitch::init(&mut codec).unwrap();
        codec.link_mut().unwrap().push_reply([0x66, 0x01, 0x0D]);
        assert!(irc.set_state(&mut codec, true).is_err());
        assert_eq!(irc.filter(), None);
    }

    #[test]
    fn test_stepper_as_actuator() {
        let mut codec = codec();
        let mut focus = StepperMotor::init(&mut codec, MotorId::Focus, 8390, 7959, 0).unwrap();
        focus.home(&mut codec).unwrap();

        Actuator::move_steps(&mut focus, &mut codec, -500).unwrap();
        assert_eq!(Actuator::id(&focus), MotorId::Focus);
        assert_eq!(
            focus.position(),
            PositionState::Stepper { step: 7459, homed: true }
        );
    }
}
