//! Strategy Selector (C3).
//!
//! Pure function mapping `(intent, complexity, mode)` to a
//! [`StrategyDescriptor`], per the routing table in spec §4.3.

use super::StrategyDescriptor;
use crate::complexity::ComplexityLevel;
use crate::intent::Intent;
use serde::{Deserialize, Serialize};

/// Which request-handling mode is active. `Legacy` always routes complex
/// cases to Few-Shot; `Nlac` enables the iterative Complex strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Legacy,
    Nlac,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "legacy" => Some(Self::Legacy),
            "nlac" => Some(Self::Nlac),
            _ => None,
        }
    }
}

/// Select a strategy for `(intent, complexity, mode)`. Pure and total:
/// every combination maps to a descriptor, never an error.
pub fn select(intent: Intent, complexity: ComplexityLevel, mode: Mode) -> StrategyDescriptor {
    match complexity {
        ComplexityLevel::Simple => StrategyDescriptor::Simple,
        ComplexityLevel::Moderate => StrategyDescriptor::FewShot { k: 3 },
        ComplexityLevel::Complex => match mode {
            Mode::Legacy => StrategyDescriptor::FewShot { k: 5 },
            Mode::Nlac => StrategyDescriptor::Complex {
                max_iters: 3,
                validator_on: true,
                reflexion_on: matches!(intent, Intent::Debug),
            },
        },
    }
}

/// Apply the deterministic downgrade policy when a strategy's
/// dependencies are unavailable (pool failed to load, complex strategy
/// disabled by configuration). Returns the downgraded descriptor and
/// whether a downgrade actually occurred.
pub fn downgrade_if_unavailable(
    descriptor: StrategyDescriptor,
    pool_available: bool,
    complex_enabled: bool,
) -> (StrategyDescriptor, bool) {
    let mut current = descriptor;
    let mut downgraded = false;

    if matches!(current, StrategyDescriptor::Complex { .. }) && !complex_enabled {
        current = current.downgrade();
        downgraded = true;
    }

    if matches!(current, StrategyDescriptor::FewShot { .. }) && !pool_available {
        current = current.downgrade();
        downgraded = true;
    }

    (current, downgraded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_complexity_always_zero_shot() {
        for intent in [Intent::Debug, Intent::Refactor, Intent::Generate, Intent::Explain] {
            for mode in [Mode::Legacy, Mode::Nlac] {
                assert_eq!(
                    select(intent, ComplexityLevel::Simple, mode),
                    StrategyDescriptor::Simple
                );
            }
        }
    }

    #[test]
    fn test_moderate_complexity_is_few_shot_k3() {
        let result = select(Intent::Generate, ComplexityLevel::Moderate, Mode::Nlac);
        assert_eq!(result, StrategyDescriptor::FewShot { k: 3 });
    }

    #[test]
    fn test_complex_legacy_mode_is_few_shot_k5() {
        let result = select(Intent::Generate, ComplexityLevel::Complex, Mode::Legacy);
        assert_eq!(result, StrategyDescriptor::FewShot { k: 5 });
    }

    #[test]
    fn test_complex_nlac_debug_enables_reflexion() {
        let result = select(Intent::Debug, ComplexityLevel::Complex, Mode::Nlac);
        assert_eq!(
            result,
            StrategyDescriptor::Complex {
                max_iters: 3,
                validator_on: true,
                reflexion_on: true
            }
        );
    }

    #[test]
    fn test_complex_nlac_non_debug_disables_reflexion() {
        let result = select(Intent::Generate, ComplexityLevel::Complex, Mode::Nlac);
        assert_eq!(
            result,
            StrategyDescriptor::Complex {
                max_iters: 3,
                validator_on: true,
                reflexion_on: false
            }
        );
    }

    #[test]
    fn test_downgrade_complex_to_few_shot_when_disabled() {
        let descriptor = StrategyDescriptor::Complex {
            max_iters: 3,
            validator_on: true,
            reflexion_on: false,
        };
        let (downgraded, changed) = downgrade_if_unavailable(descriptor, true, false);
        assert!(changed);
        assert_eq!(downgraded, StrategyDescriptor::FewShot { k: 5 });
    }

    #[test]
    fn test_downgrade_few_shot_to_simple_when_pool_unavailable() {
        let descriptor = StrategyDescriptor::FewShot { k: 3 };
        let (downgraded, changed) = downgrade_if_unavailable(descriptor, false, true);
        assert!(changed);
        assert_eq!(downgraded, StrategyDescriptor::Simple);
    }

    #[test]
    fn test_no_downgrade_when_dependencies_available() {
        let descriptor = StrategyDescriptor::Complex {
            max_iters: 3,
            validator_on: true,
            reflexion_on: false,
        };
        let (result, changed) = downgrade_if_unavailable(descriptor.clone(), true, true);
        assert!(!changed);
        assert_eq!(result, descriptor);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(Mode::parse("legacy"), Some(Mode::Legacy));
        assert_eq!(Mode::parse("NLAC"), Some(Mode::Nlac));
        assert_eq!(Mode::parse("bogus"), None);
    }
}
