//! Discrete motor speed levels

use serde::Serialize;

/// Motor speed selected by the operator.
///
/// The absence of a level (`None`) means the motors are not engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MotorSpeed {
    First,
    Second,
    Third,
}

impl MotorSpeed {
    /// The level following `current` in the cycle first, second, third, not engaged.
    pub fn step(current: Option<MotorSpeed>) -> Option<MotorSpeed> {
        match current {
            None => Some(MotorSpeed::First),
            Some(MotorSpeed::First) => Some(MotorSpeed::Second),
            Some(MotorSpeed::Second) => Some(MotorSpeed::Third),
            Some(MotorSpeed::Third) => None,
        }
    }
}

impl std::fmt::Display for MotorSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MotorSpeed::First => "1",
            MotorSpeed::Second => "2",
            MotorSpeed::Third => "3",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_step_cycle() {
        let mut s = None;
        let mut seen = Vec::new();
        for _ in 0..8 {
            s = MotorSpeed::step(s);
            seen.push(s);
        }

        assert_eq!(&seen[..4], &[
            Some(MotorSpeed::First), Some(MotorSpeed::Second), Some(MotorSpeed::Third), None
        ]);
        assert_eq!(&seen[..4], &seen[4..]);
    }
}
