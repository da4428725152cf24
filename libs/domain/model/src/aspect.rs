//! Composite signal aspects.
//!
//! Historically the composite aspect was a single string built by
//! concatenation (`"RED_CALLING"`, `"YELLOW_LOOP"`, ...). Here it is a
//! product type `(MainAspect, CallingOnAspect, LoopAspect)` with free codec
//! functions that stay backward compatible with the rule document's string
//! encoding (see `signalbox-rules`).

use crate::enum_codec::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The signal's primary indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MainAspect {
    Red,
    Yellow,
    Green,
    SingleYellow,
    DoubleYellow,
}

impl MainAspect {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Yellow => "YELLOW",
            Self::Green => "GREEN",
            Self::SingleYellow => "SINGLE_YELLOW",
            Self::DoubleYellow => "DOUBLE_YELLOW",
        }
    }

    fn parse_opt(s: &str) -> Option<Self> {
        Some(match s {
            "RED" | "" => Self::Red,
            "YELLOW" => Self::Yellow,
            "GREEN" => Self::Green,
            "SINGLE_YELLOW" => Self::SingleYellow,
            "DOUBLE_YELLOW" => Self::DoubleYellow,
            _ => return None,
        })
    }

    pub const fn all() -> [Self; 5] {
        [Self::Red, Self::Yellow, Self::Green, Self::SingleYellow, Self::DoubleYellow]
    }
}

impl fmt::Display for MainAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MainAspect {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_opt(s).ok_or_else(|| ParseEnumError { type_name: "MainAspect", value: s.to_string() })
    }
}

/// The calling-on subsidiary, permitting cautious advance past danger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallingOnAspect {
    Off,
    White,
}

impl CallingOnAspect {
    pub const fn all() -> [Self; 2] {
        [Self::Off, Self::White]
    }

    pub const fn is_on(self) -> bool {
        matches!(self, Self::White)
    }
}

impl From<bool> for CallingOnAspect {
    fn from(turned_on: bool) -> Self {
        if turned_on { Self::White } else { Self::Off }
    }
}

/// The loop subsidiary, indicating divergence into a loop line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopAspect {
    Off,
    Yellow,
}

impl LoopAspect {
    pub const fn all() -> [Self; 2] {
        [Self::Off, Self::Yellow]
    }

    pub const fn is_on(self) -> bool {
        matches!(self, Self::Yellow)
    }
}

impl From<bool> for LoopAspect {
    fn from(turned_on: bool) -> Self {
        if turned_on { Self::Yellow } else { Self::Off }
    }
}

/// The full indicated state of a signal: main aspect plus both subsidiaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeAspect {
    pub main: MainAspect,
    pub calling_on: CallingOnAspect,
    pub r#loop: LoopAspect,
}

impl CompositeAspect {
    pub const fn new(main: MainAspect, calling_on: CallingOnAspect, r#loop: LoopAspect) -> Self {
        Self { main, calling_on, r#loop }
    }

    /// Encodes as the rule document's string form, e.g. `RED_CALLING`, `YELLOW_LOOP`.
    pub fn encode(self) -> String {
        let mut s = self.main.as_str().to_string();
        if matches!(self.calling_on, CallingOnAspect::White) {
            s.push_str("_CALLING");
        }
        if matches!(self.r#loop, LoopAspect::Yellow) {
            s.push_str("_LOOP");
        }
        s
    }

    /// Decodes a composite aspect string of the rule document's form.
    ///
    /// Strips the trailing `_LOOP` suffix (the outermost, rightmost token in
    /// the encoding) and then the trailing `_CALLING` suffix; whatever
    /// remains is the main aspect, defaulting to `RED` when empty.
    pub fn decode(encoded: &str) -> Option<Self> {
        let mut rest = encoded;

        let r#loop = if let Some(stripped) = rest.strip_suffix("_LOOP") {
            rest = stripped;
            LoopAspect::Yellow
        } else {
            LoopAspect::Off
        };

        let calling_on = if let Some(stripped) = rest.strip_suffix("_CALLING") {
            rest = stripped;
            CallingOnAspect::White
        } else {
            CallingOnAspect::Off
        };

        let main = MainAspect::parse_opt(rest)?;
        Some(Self::new(main, calling_on, r#loop))
    }
}

impl fmt::Display for CompositeAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_plain_main_aspects() {
        assert_eq!(
            CompositeAspect::decode("RED"),
            Some(CompositeAspect::new(MainAspect::Red, CallingOnAspect::Off, LoopAspect::Off))
        );
        assert_eq!(
            CompositeAspect::decode("DOUBLE_YELLOW"),
            Some(CompositeAspect::new(MainAspect::DoubleYellow, CallingOnAspect::Off, LoopAspect::Off))
        );
    }

    #[test]
    fn decode_subsidiary_suffixes() {
        assert_eq!(
            CompositeAspect::decode("GREEN_CALLING"),
            Some(CompositeAspect::new(MainAspect::Green, CallingOnAspect::White, LoopAspect::Off))
        );
        assert_eq!(
            CompositeAspect::decode("YELLOW_LOOP"),
            Some(CompositeAspect::new(MainAspect::Yellow, CallingOnAspect::Off, LoopAspect::Yellow))
        );
        assert_eq!(
            CompositeAspect::decode("RED_CALLING_LOOP"),
            Some(CompositeAspect::new(MainAspect::Red, CallingOnAspect::White, LoopAspect::Yellow))
        );
    }

    #[test]
    fn empty_remainder_defaults_to_red() {
        assert_eq!(
            CompositeAspect::decode("_CALLING"),
            Some(CompositeAspect::new(MainAspect::Red, CallingOnAspect::White, LoopAspect::Off))
        );
    }

    /// Invariant #6: the decomposition is a bijection over the full product space.
    #[test]
    fn decode_encode_is_a_bijection_over_the_full_product_space() {
        for main in MainAspect::all() {
            for calling_on in CallingOnAspect::all() {
                for r#loop in LoopAspect::all() {
                    let composite = CompositeAspect::new(main, calling_on, r#loop);
                    let encoded = composite.encode();
                    let decoded = CompositeAspect::decode(&encoded).unwrap();
                    assert_eq!(decoded, composite, "round-trip failed for {encoded}");
                }
            }
        }
    }
}
