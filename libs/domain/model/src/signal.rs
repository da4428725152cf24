//! Signal entity.

use crate::aspect::{CallingOnAspect, CompositeAspect, LoopAspect, MainAspect};
use crate::enum_codec::ParseEnumError;
use crate::ids::{CircuitId, SignalId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    Outer,
    Home,
    Starter,
    AdvancedStarter,
}

impl SignalType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Outer => "OUTER",
            Self::Home => "HOME",
            Self::Starter => "STARTER",
            Self::AdvancedStarter => "ADVANCED_STARTER",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "OUTER" => Self::Outer,
            "HOME" => Self::Home,
            "STARTER" => Self::Starter,
            "ADVANCED_STARTER" => Self::AdvancedStarter,
            _ => return Err(ParseEnumError { type_name: "SignalType", value: s.to_string() }),
        })
    }
}

/// A signal as projected from `v_signals_complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: SignalId,
    pub signal_type: SignalType,
    pub main_aspect: MainAspect,
    pub calling_on_aspect: CallingOnAspect,
    pub loop_aspect: LoopAspect,
    pub is_locked: bool,
    pub is_active: bool,
    pub possible_aspects: HashSet<MainAspect>,
    pub protected_track_circuits: Vec<CircuitId>,
    pub interlocked_with: Vec<SignalId>,
}

impl Signal {
    /// The composite aspect this signal currently displays.
    pub fn composite_aspect(&self) -> CompositeAspect {
        CompositeAspect::new(self.main_aspect, self.calling_on_aspect, self.loop_aspect)
    }

    /// A signal may show a non-RED main aspect only if every protected
    /// circuit it lists is clear.
    pub fn protected_circuits_all_clear(&self, is_clear: impl Fn(&CircuitId) -> bool) -> bool {
        self.protected_track_circuits.iter().all(is_clear)
    }

    /// An inactive signal cannot be commanded.
    pub fn is_commandable(&self) -> bool {
        self.is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Signal {
        Signal {
            signal_id: "SIG_A".into(),
            signal_type: SignalType::Home,
            main_aspect: MainAspect::Red,
            calling_on_aspect: CallingOnAspect::Off,
            loop_aspect: LoopAspect::Off,
            is_locked: false,
            is_active: true,
            possible_aspects: [MainAspect::Red, MainAspect::Green].into_iter().collect(),
            protected_track_circuits: vec!["C1".into(), "C2".into()],
            interlocked_with: vec![],
        }
    }

    #[test]
    fn composite_aspect_matches_components() {
        let mut signal = sample();
        signal.calling_on_aspect = CallingOnAspect::White;
        assert_eq!(signal.composite_aspect().encode(), "RED_CALLING");
    }

    #[test]
    fn inactive_signal_is_not_commandable() {
        let mut signal = sample();
        signal.is_active = false;
        assert!(!signal.is_commandable());
    }

    #[test]
    fn protected_circuits_all_clear_short_circuits_on_first_occupied() {
        let signal = sample();
        assert!(!signal.protected_circuits_all_clear(|c| c != "C1"));
        assert!(signal.protected_circuits_all_clear(|_| true));
    }
}
