use crate::models::detection::PlateKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// All four plate grammars as named alternatives of one anchored pattern.
/// Each alternative sits inside the outer `^(?:...)$`, so every one of them
/// must span the whole string.
///
/// - standard:       ideograph, letter, `·`, 5 letters/digits
/// - international:  1-3 letters, 1-4 digits, 0-3 letters/digits
/// - special_region: `粤Z·`, 4 letters/digits, `港` or `澳`
/// - new_energy:     ideograph, letter, `·`, `D` or `F`, 5 letters/digits
const PLATE_PATTERN: &str = concat!(
    r"^(?:",
    r"(?P<standard>[\x{4e00}-\x{9fff}][A-Z]·[A-Z0-9]{5})",
    r"|(?P<international>[A-Z]{1,3}[0-9]{1,4}[A-Z0-9]{0,3})",
    r"|(?P<special_region>粤Z·[A-Z0-9]{4}[港澳])",
    r"|(?P<new_energy>[\x{4e00}-\x{9fff}][A-Z]·[DF][A-Z0-9]{5})",
    r")$"
);

const GROUPS: [(&str, PlateKind); 4] = [
    ("standard", PlateKind::Standard),
    ("international", PlateKind::International),
    ("special_region", PlateKind::SpecialRegion),
    ("new_energy", PlateKind::NewEnergy),
];

static DEFAULT_VALIDATOR: Lazy<PlateValidator> = Lazy::new(PlateValidator::new);

/// Pure plate format predicate. Matching runs in linear time (regex crate).
#[derive(Debug, Clone)]
pub struct PlateValidator {
    pattern: Regex,
}

impl Default for PlateValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlateValidator {
    pub fn new() -> Self {
        // The pattern is a compile-time constant covered by tests
        let pattern = Regex::new(PLATE_PATTERN).expect("plate pattern must compile");
        Self { pattern }
    }

    /// Shared instance for callers that don't hold their own
    pub fn shared() -> &'static PlateValidator {
        &DEFAULT_VALIDATOR
    }

    /// Which grammar `text` matches in full, if any
    pub fn classify(&self, text: &str) -> Option<PlateKind> {
        let captures = self.pattern.captures(text)?;
        GROUPS
            .iter()
            .find(|(name, _)| captures.name(name).is_some())
            .map(|(_, kind)| *kind)
    }

    pub fn is_valid(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Validate a plate string against the shared validator
pub fn is_valid(text: &str) -> bool {
    PlateValidator::shared().is_valid(text)
}
