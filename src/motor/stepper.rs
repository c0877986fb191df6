// Stepper motor state machine for focus, zoom and iris
//
// Position is tracked in software only. Homing drives into the photo
// interrupter (PI) and resets the step counter to the PI step; every other move
// is relative to that belief.

use tracing::{debug, error, info, warn};

use super::codec::Codec;
use super::link::Link;
use super::protocol::{Acceleration, MotorId, MotorType, PiSide, MAX_MOVE_STEPS};
use crate::config::{BACKLASH_OVERSHOOT, FZ_DEFAULT_SPEED, IRIS_DEFAULT_SPEED};
use crate::errors::{Component, McrError, Result};
use crate::messages::MotorStatus;

/// Which boundary a relative move would cross
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitHit {
    None,
    /// Past the PI with the PI on the high side
    HighPi,
    /// Past the PI with the PI on the low side
    LowPi,
    /// Past max steps
    Max,
    /// Below step 0
    Min,
}

impl LimitHit {
    /// Signed flag: 1/-1 for the PI, 2/-2 for the travel range, 0 for none
    pub fn code(self) -> i8 {
        match self {
            LimitHit::None => 0,
            LimitHit::HighPi => 1,
            LimitHit::LowPi => -1,
            LimitHit::Max => 2,
            LimitHit::Min => -2,
        }
    }
}

/// Result of checking a relative move against the limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitCheck {
    pub hit: LimitHit,
    /// Steps to move; clamped onto the violated boundary if clamping was requested
    pub steps: i32,
}

/// Stepper motor with a PI limit switch
#[derive(Debug, Clone)]
pub struct StepperMotor {
    id: MotorId,
    current_step: i32,
    current_speed: u16,
    max_steps: i32,
    pi_step: i32,
    pi_side: PiSide,
    respect_limits: bool,
    acceleration: Acceleration,
    homed: bool,
}

impl StepperMotor {
    /// Configure the motor on the board. No movement is made.
    pub fn init<L: Link>(
        codec: &mut Codec<L>,
        id: MotorId,
        steps: u16,
        pi: u16,
        accel: u8,
    ) -> Result<Self> {
        let motor = Self::new(id, steps, pi, accel);
        if let Err(e) = codec.init_motor(id, steps, pi, id.speed_class(), MotorType::Stepper) {
            error!("{} motor not initialized: {}", id, e);
            let err = McrError::NotInitialized { motor: id };
            codec.errors().record(err.clone(), Component::Motor(id));
            return Err(err);
        }
        info!(
            "{} motor initialized: {} steps, PI at {} ({:?} side)",
            id, steps, pi, motor.pi_side
        );
        Ok(motor)
    }

    fn new(id: MotorId, steps: u16, pi: u16, accel: u8) -> Self {
        let max_steps = i32::from(steps);
        let pi_step = i32::from(pi);
        let current_speed = match id {
            MotorId::Focus | MotorId::Zoom => FZ_DEFAULT_SPEED,
            MotorId::Iris | MotorId::Irc => IRIS_DEFAULT_SPEED,
        };
        Self {
            id,
            current_step: 0,
            current_speed,
            max_steps,
            pi_step,
            pi_side: PiSide::from_range(max_steps, pi_step),
            respect_limits: true,
            acceleration: Acceleration::new(accel),
            homed: false,
        }
    }

    pub fn id(&self) -> MotorId {
        self.id
    }

    pub fn current_step(&self) -> i32 {
        self.current_step
    }

    pub fn current_speed(&self) -> u16 {
        self.current_speed
    }

    pub fn max_steps(&self) -> i32 {
        self.max_steps
    }

    pub fn pi_step(&self) -> i32 {
        self.pi_step
    }

    pub fn pi_side(&self) -> PiSide {
        self.pi_side
    }

    pub fn respect_limits(&self) -> bool {
        self.respect_limits
    }

    pub fn acceleration(&self) -> Acceleration {
        self.acceleration
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    pub fn status(&self) -> MotorStatus {
        MotorStatus {
            motor: self.id,
            current_step: self.current_step,
            current_speed: self.current_speed,
            max_steps: self.max_steps,
            pi_step: self.pi_step,
            pi_side: self.pi_side,
            respect_limits: self.respect_limits,
            homed: self.homed,
        }
    }

    /// Drive into the PI switch and reset the step counter to the PI step
    ///
    /// Moves 110% of the travel range towards the PI; the board stops the motor
    /// as soon as the PI triggers. Limits are forced on for the move and the
    /// previous setting restored afterwards.
    pub fn home<L: Link>(&mut self, codec: &mut Codec<L>) -> Result<()> {
        let steps = (self.max_steps * 11 / 10).min(MAX_MOVE_STEPS) * self.pi_side.sign();

        let restore_ignore_limits = !self.respect_limits;
        if restore_ignore_limits {
            if let Err(e) = self.set_respect_limits(codec, true) {
                warn!("Could not enable {} motor limits for homing: {}", self.id, e);
            }
        }

        let result = codec.move_motor(self.id, steps, self.current_speed, self.acceleration);

        if restore_ignore_limits {
            if let Err(e) = self.set_respect_limits(codec, false) {
                warn!("Could not restore {} motor limits: {}", self.id, e);
            }
        }

        match result {
            Ok(()) => {
                self.current_step = self.pi_step;
                self.homed = true;
                debug!("{} motor homed at {}", self.id, self.pi_step);
                Ok(())
            }
            Err(_) => {
                error!("{} motor home move error", self.id);
                let err = McrError::BadMove { motor: self.id };
                codec.errors().record(err.clone(), Component::Motor(self.id));
                Err(err)
            }
        }
    }

    /// Home, then move to an absolute step
    ///
    /// Going through the PI every time fixes the approach direction, so
    /// backlash compensation always behaves the same way.
    pub fn move_abs<L: Link>(&mut self, codec: &mut Codec<L>, step: i32) -> Result<()> {
        if step < 0 {
            warn!("Target {} motor step {} < 0", self.id, step);
        }
        let Some(steps) = step.checked_sub(self.pi_step) else {
            return Err(self.reject(codec, format!("target step {} is out of range", step)));
        };
        self.home(codec)?;
        self.move_rel(codec, steps, true)
    }

    /// Move by a signed number of steps
    ///
    /// With limits respected the steps are clamped so the motor stays in range.
    /// When moving towards the PI with `correct_backlash`, the motor overshoots
    /// the target and comes back, so it always settles from the same side.
    pub fn move_rel<L: Link>(
        &mut self,
        codec: &mut Codec<L>,
        steps: i32,
        correct_backlash: bool,
    ) -> Result<()> {
        if steps.unsigned_abs() > MAX_MOVE_STEPS.unsigned_abs() {
            return Err(self.reject(codec, format!("{} steps exceeds one move frame", steps)));
        }

        let check = self.check_limits(steps, self.respect_limits);
        if self.respect_limits && check.hit != LimitHit::None {
            warn!("Limiting {} motor relative steps to {}", self.id, check.steps);
        }
        let steps = check.steps;
        if steps == 0 {
            return Ok(());
        }
        let Some(target) = self.current_step.checked_add(steps) else {
            return Err(self.reject(codec, format!("{} steps overflows the position", steps)));
        };
        let sign = self.pi_side.sign();

        // Approaching the PI: overshoot and come back so the motor settles from one side
        let overshoot = if correct_backlash && steps * sign > 0 {
            let distance_to_pi = self.pi_step.abs_diff(target);
            if self.respect_limits && distance_to_pi < BACKLASH_OVERSHOOT.unsigned_abs() {
                distance_to_pi as i32
            } else {
                BACKLASH_OVERSHOOT
            }
        } else {
            0
        };
        let first_leg = steps + sign * overshoot;
        if first_leg.unsigned_abs() > MAX_MOVE_STEPS.unsigned_abs() {
            return Err(self.reject(codec, format!("{} steps exceeds one move frame", first_leg)));
        }

        let (speed, accel) = (self.current_speed, self.acceleration);
        let result = codec.move_motor(self.id, first_leg, speed, accel).and_then(|()| {
            if overshoot == 0 {
                return Ok(());
            }
            codec.move_motor(self.id, -sign * overshoot, speed, accel)
        });

        // The motor may have moved even if the reply was lost
        self.current_step = target;

        if result.is_err() {
            let err = McrError::BadMove { motor: self.id };
            codec.errors().record(err.clone(), Component::Motor(self.id));
            return Err(err);
        }
        Ok(())
    }

    /// Set the speed used for subsequent moves
    pub fn set_speed(&mut self, speed: u16) -> Result<()> {
        let class = self.id.speed_class();
        if !class.contains(speed) {
            warn!(
                "Requested speed {} is outside range {}-{}",
                speed,
                class.min(),
                class.max()
            );
            return Err(McrError::Range {
                speed,
                min: class.min(),
                max: class.max(),
            });
        }
        self.current_speed = speed;
        Ok(())
    }

    /// Stop moves at the PI (true) or allow moving past it (false)
    ///
    /// The local flag always changes; the board's stop configuration is
    /// updated too, which only focus and zoom support.
    pub fn set_respect_limits<L: Link>(
        &mut self,
        codec: &mut Codec<L>,
        state: bool,
    ) -> Result<()> {
        info!("PI limit for {} motor set to {}", self.id, state);
        self.respect_limits = state;
        codec.set_regard_limits(self.id, state, self.pi_side)
    }

    /// Check a relative move against the PI and travel range
    ///
    /// The PI checks only apply when clamping. Without clamping the steps come
    /// back unchanged and the hit is only reported.
    pub fn check_limits(&self, steps: i32, clamp: bool) -> LimitCheck {
        let target = self.current_step.saturating_add(steps);
        let to_pi = self.pi_step.saturating_sub(self.current_step);
        let (hit, clamped) = if clamp && self.pi_side == PiSide::High && target > self.pi_step {
            warn!("Steps exceed PI {}", self.pi_step);
            (LimitHit::HighPi, to_pi.max(0))
        } else if clamp && self.pi_side == PiSide::Low && target < self.pi_step {
            warn!("Steps exceed low PI {}", self.pi_step);
            (LimitHit::LowPi, to_pi.min(0))
        } else if target > self.max_steps {
            warn!("Steps exceed maximum {}", self.max_steps);
            (LimitHit::Max, self.max_steps.saturating_sub(self.current_step).max(0))
        } else if target < 0 {
            warn!("Steps exceed minimum 0");
            (LimitHit::Min, self.current_step.saturating_neg().min(0))
        } else {
            (LimitHit::None, steps)
        };

        LimitCheck {
            hit,
            steps: if clamp { clamped } else { steps },
        }
    }

    #[track_caller]
    fn reject<L: Link>(&self, codec: &Codec<L>, reason: String) -> McrError {
        error!("{} motor move rejected: {}", self.id, reason);
        let err = McrError::InvalidParameter(reason);
        codec.errors().record(err.clone(), Component::Motor(self.id));
        err
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::CodecConfig;
    use crate::errors::ErrorRegistry;
    use crate::motor::link::MockLink;
    use crate::motor::protocol::{opcode, MoveCommand};

    fn codec() -> Codec<MockLink> {
        let config = CodecConfig {
            response_window: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
            ..CodecConfig::default()
        };
        Codec::new(MockLink::new(), config, ErrorRegistry::new())
    }

    fn moves(codec: &Codec<MockLink>) -> Vec<i32> {
        let link = codec.link().unwrap();
        link.written()
            .iter()
            .filter_map(|f| MoveCommand::decode(f))
            .map(|m| m.signed_steps())
            .collect()
    }

    fn clear(codec: &mut Codec<MockLink>) {
        codec.link_mut().unwrap().clear_written();
    }

    fn focus(codec: &mut Codec<MockLink>) -> StepperMotor {
        StepperMotor::init(codec, MotorId::Focus, 8390, 7959, 0).unwrap()
    }

    fn zoom_low_pi(codec: &mut Codec<MockLink>) -> StepperMotor {
        StepperMotor::init(codec, MotorId::Zoom, 4073, 154, 0).unwrap()
    }

    #[test]
    fn test_init_defaults() {
        let mut codec = codec();
        let motor = focus(&mut codec);
        assert_eq!(motor.pi_side(), PiSide::High);
        assert_eq!(motor.current_step(), 0);
        assert_eq!(motor.current_speed(), FZ_DEFAULT_SPEED);
        assert!(motor.respect_limits());
        assert!(!motor.is_homed());

        let iris = StepperMotor::init(&mut codec, MotorId::Iris, 75, 0, 0).unwrap();
        assert_eq!(iris.current_speed(), IRIS_DEFAULT_SPEED);
        assert_eq!(iris.pi_side(), PiSide::Low);
    }

    #[test]
    fn test_init_rejected_by_board() {
        let mut codec = codec();
        codec.link_mut().unwrap().push_reply([0x63, 0x01, 0x0D]);
        let result = StepperMotor::init(&mut codec, MotorId::Focus, 8390, 7959, 0);
        assert_eq!(result.unwrap_err(), McrError::NotInitialized { motor: MotorId::Focus });
        let latest = codec.errors().latest().unwrap();
        assert_eq!(latest.component, Component::Motor(MotorId::Focus));
    }

    #[test]
    fn test_home_moves_oversized_towards_pi() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        clear(&mut codec);

        motor.home(&mut codec).unwrap();
        assert_eq!(motor.current_step(), 7959);
        assert!(motor.is_homed());
        assert_eq!(moves(&codec), vec![9229]);

        let mut zoom = zoom_low_pi(&mut codec);
        clear(&mut codec);
        zoom.home(&mut codec).unwrap();
        assert_eq!(zoom.current_step(), 154);
        assert_eq!(moves(&codec), vec![-4480]);
    }

    #[test]
    fn test_home_failure_is_bad_move() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        codec.link_mut().unwrap().push_reply([0x66, 0x01, 0x0D]);
        assert_eq!(motor.home(&mut codec), Err(McrError::BadMove { motor: MotorId::Focus }));
        assert!(!motor.is_homed());
        assert_eq!(motor.current_step(), 0);
    }

    #[test]
    fn test_home_forces_limits_then_restores() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.set_respect_limits(&mut codec, false).unwrap();
        clear(&mut codec);

        motor.home(&mut codec).unwrap();
        assert!(!motor.respect_limits());

        let link = codec.link().unwrap();
        let ops: Vec<u8> = link.written().iter().map(|f| f[0]).collect();
        assert_eq!(
            ops,
            vec![
                opcode::READ_SETUP,
                opcode::MOTOR_SETUP,
                opcode::MOVE_FORWARD,
                opcode::READ_SETUP,
                opcode::MOTOR_SETUP,
            ]
        );
        // Limits on for the home move, off again afterwards
        let setups = link.frames_with_opcode(opcode::MOTOR_SETUP);
        assert_eq!(setups[0][3], 1);
        assert_eq!(setups[1][3], 0);
    }

    #[test]
    fn test_move_rel_then_home_returns_to_pi() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();

        motor.move_rel(&mut codec, -1000, true).unwrap();
        assert_eq!(motor.current_step(), 6959);
        motor.home(&mut codec).unwrap();
        assert_eq!(motor.current_step(), 7959);
    }

    #[test]
    fn test_move_away_from_pi_is_single_move() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        clear(&mut codec);

        motor.move_rel(&mut codec, -1000, true).unwrap();
        assert_eq!(moves(&codec), vec![-1000]);
    }

    #[test]
    fn test_backlash_overshoot_and_return() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        motor.move_rel(&mut codec, -2000, true).unwrap();
        clear(&mut codec);

        motor.move_rel(&mut codec, 500, true).unwrap();
        let legs = moves(&codec);
        assert_eq!(legs, vec![560, -60]);
        assert_eq!(legs.iter().sum::<i32>(), 500);
        assert_eq!(motor.current_step(), 6459);
    }

    #[test]
    fn test_backlash_overshoot_shortened_near_pi() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        motor.move_rel(&mut codec, -100, true).unwrap();
        clear(&mut codec);

        // Target 7939 is 20 steps short of the PI
        motor.move_rel(&mut codec, 80, true).unwrap();
        assert_eq!(moves(&codec), vec![100, -20]);
        assert_eq!(motor.current_step(), 7939);
    }

    #[test]
    fn test_backlash_on_pi_is_single_move() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        motor.move_rel(&mut codec, -100, true).unwrap();
        clear(&mut codec);

        motor.move_rel(&mut codec, 100, true).unwrap();
        assert_eq!(moves(&codec), vec![100]);
        assert_eq!(motor.current_step(), 7959);
    }

    #[test]
    fn test_backlash_disabled() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        motor.move_rel(&mut codec, -2000, true).unwrap();
        clear(&mut codec);

        motor.move_rel(&mut codec, 500, false).unwrap();
        assert_eq!(moves(&codec), vec![500]);
    }

    #[test]
    fn test_move_rel_clamps_at_pi_and_zero() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();

        motor.move_rel(&mut codec, 300, true).unwrap();
        assert_eq!(motor.current_step(), 7959);

        motor.move_rel(&mut codec, -20_000, true).unwrap();
        assert_eq!(motor.current_step(), 0);

        for steps in [5000, -700, 9000, -12_000, 42, 8000] {
            motor.move_rel(&mut codec, steps, true).unwrap();
            let step = motor.current_step();
            assert!((0..=motor.max_steps()).contains(&step), "step {} out of range", step);
        }
    }

    #[test]
    fn test_move_clamped_to_nothing_sends_no_frame() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        clear(&mut codec);

        motor.move_rel(&mut codec, 300, true).unwrap();
        assert!(moves(&codec).is_empty());
        assert_eq!(motor.current_step(), 7959);
    }

    #[test]
    fn test_extreme_steps_are_rejected() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        clear(&mut codec);

        for steps in [i32::MAX, i32::MIN] {
            assert!(matches!(
                motor.move_rel(&mut codec, steps, true),
                Err(McrError::InvalidParameter(_))
            ));
        }
        assert!(matches!(
            motor.move_abs(&mut codec, i32::MIN),
            Err(McrError::InvalidParameter(_))
        ));
        assert!(codec.link().unwrap().written().is_empty());
        assert_eq!(motor.current_step(), 7959);

        let latest = codec.errors().latest().unwrap();
        assert_eq!(latest.component, Component::Motor(MotorId::Focus));

        let check = motor.check_limits(i32::MAX, true);
        assert_eq!(check.hit, LimitHit::HighPi);
        assert_eq!(check.steps, 0);
        assert_eq!(motor.check_limits(i32::MIN, false).hit, LimitHit::Min);
    }

    #[test]
    fn test_move_larger_than_one_frame_without_limits() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        motor.set_respect_limits(&mut codec, false).unwrap();
        clear(&mut codec);

        assert!(matches!(
            motor.move_rel(&mut codec, 100_000, false),
            Err(McrError::InvalidParameter(_))
        ));
        // The overshoot would push the first leg past one frame
        assert!(matches!(
            motor.move_rel(&mut codec, 65_500, true),
            Err(McrError::InvalidParameter(_))
        ));
        assert!(moves(&codec).is_empty());
        assert_eq!(motor.current_step(), 7959);

        motor.move_rel(&mut codec, 65_535, false).unwrap();
        assert_eq!(moves(&codec), vec![65_535]);
        assert_eq!(motor.current_step(), 7959 + 65_535);
    }

    #[test]
    fn test_move_rel_past_pi_without_limits() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        motor.set_respect_limits(&mut codec, false).unwrap();
        clear(&mut codec);

        motor.move_rel(&mut codec, 200, false).unwrap();
        assert_eq!(motor.current_step(), 8159);
        assert_eq!(moves(&codec), vec![200]);
    }

    #[test]
    fn test_move_rel_zero_is_noop() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        clear(&mut codec);
        motor.move_rel(&mut codec, 0, true).unwrap();
        assert!(codec.link().unwrap().written().is_empty());
    }

    #[test]
    fn test_move_rel_failure_is_bad_move() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();
        codec.link_mut().unwrap().push_reply([0x62, 0x01, 0x0D]);
        assert_eq!(
            motor.move_rel(&mut codec, -100, true),
            Err(McrError::BadMove { motor: MotorId::Focus })
        );
    }

    #[test]
    fn test_move_abs_is_repeatable() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);

        motor.move_abs(&mut codec, 6000).unwrap();
        assert_eq!(motor.current_step(), 6000);

        motor.set_respect_limits(&mut codec, false).unwrap();
        motor.move_rel(&mut codec, 2500, false).unwrap();
        motor.set_respect_limits(&mut codec, true).unwrap();

        motor.move_abs(&mut codec, 6000).unwrap();
        assert_eq!(motor.current_step(), 6000);
    }

    #[test]
    fn test_move_abs_homes_first() {
        let mut codec = codec();
        let mut zoom = zoom_low_pi(&mut codec);
        clear(&mut codec);

        zoom.move_abs(&mut codec, 1000).unwrap();
        // Home towards the low PI, then away from it: no backlash legs
        assert_eq!(moves(&codec), vec![-4480, 846]);
        assert_eq!(zoom.current_step(), 1000);
    }

    #[test]
    fn test_move_abs_propagates_home_failure() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        codec.link_mut().unwrap().push_reply([0x66, 0x01, 0x0D]);
        assert_eq!(
            motor.move_abs(&mut codec, 6000),
            Err(McrError::BadMove { motor: MotorId::Focus })
        );
        assert_eq!(moves(&codec).len(), 1);
    }

    #[test]
    fn test_speed_ranges() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        assert!(matches!(motor.set_speed(99), Err(McrError::Range { .. })));
        assert!(matches!(motor.set_speed(1501), Err(McrError::Range { .. })));
        assert_eq!(motor.current_speed(), FZ_DEFAULT_SPEED);
        motor.set_speed(100).unwrap();
        motor.set_speed(1500).unwrap();
        assert_eq!(motor.current_speed(), 1500);

        let mut iris = StepperMotor::init(&mut codec, MotorId::Iris, 75, 0, 0).unwrap();
        assert!(iris.set_speed(9).is_err());
        assert!(iris.set_speed(201).is_err());
        iris.set_speed(10).unwrap();
        iris.set_speed(200).unwrap();
        assert_eq!(iris.current_speed(), 200);
    }

    #[test]
    fn test_speed_used_in_move_frames() {
        let mut codec = codec();
        let mut motor = zoom_low_pi(&mut codec);
        motor.home(&mut codec).unwrap();
        motor.set_speed(600).unwrap();
        clear(&mut codec);

        motor.move_rel(&mut codec, 500, true).unwrap();
        let link = codec.link().unwrap();
        let frame = MoveCommand::decode(&link.written()[0]).unwrap();
        assert_eq!(frame.speed, 600);
    }

    #[test]
    fn test_check_limits() {
        let mut codec = codec();
        let mut motor = focus(&mut codec);
        motor.home(&mut codec).unwrap();

        let check = motor.check_limits(100, true);
        assert_eq!(check.hit, LimitHit::HighPi);
        assert_eq!(check.hit.code(), 1);
        assert_eq!(check.steps, 0);

        let check = motor.check_limits(-8000, true);
        assert_eq!(check.hit, LimitHit::Min);
        assert_eq!(check.steps, -7959);

        // Without clamping the PI is ignored and only range violations are reported
        let check = motor.check_limits(100, false);
        assert_eq!(check.hit, LimitHit::None);
        let check = motor.check_limits(1000, false);
        assert_eq!(check.hit, LimitHit::Max);
        assert_eq!(check.hit.code(), 2);
        assert_eq!(check.steps, 1000);

        let mut zoom = zoom_low_pi(&mut codec);
        zoom.home(&mut codec).unwrap();
        let check = zoom.check_limits(-100, true);
        assert_eq!(check.hit, LimitHit::LowPi);
        assert_eq!(check.steps, 0);
        let check = zoom.check_limits(5000, true);
        assert_eq!(check.hit, LimitHit::Max);
        assert_eq!(check.steps, 4073 - 154);
    }
}
