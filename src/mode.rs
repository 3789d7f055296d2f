//! Transport modes and the per-mode values used by a calibration study.
use crate::id::define_id_type;
use indexmap::IndexMap;

define_id_type! {Mode}

/// A map of mode shares (proportions between 0 and 1), keyed by mode
pub type ModeShareMap = IndexMap<Mode, f64>;

/// A map of alternative-specific constants, keyed by mode
pub type AscMap = IndexMap<Mode, f64>;

/// The label assigned to all public transport sub-modes
pub const PT_MODE: &str = "pt";

/// The prefix used by MATSim for public transport sub-modes (e.g. `pt_bus`)
pub const PT_SUBMODE_PREFIX: &str = "pt_";

/// The mode used for freight traffic, which is excluded from calibration
pub const FREIGHT_MODE: &str = "freight";

/// Build a map keyed by mode from string/value pairs
pub fn mode_map<'a, I>(iter: I) -> IndexMap<Mode, f64>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    iter.into_iter()
        .map(|(mode, value)| (Mode::new(mode), value))
        .collect()
}

/// Parameters of the Lausitz scenario study.
///
/// Target shares are based on MiD 2017, filtered on the Lausitz region.
pub mod lausitz {
    use super::{AscMap, Mode, ModeShareMap, mode_map};

    /// The modes being calibrated
    pub const MODES: [&str; 5] = ["walk", "car", "ride", "pt", "bike"];

    /// The reference mode, whose constant is not changed
    pub const FIXED_MODE: &str = "walk";

    /// Starting values for the alternative-specific constants
    pub const INITIAL_ASC: [(&str, f64); 4] = [
        ("bike", -0.141_210),
        ("pt", 0.078_147_778_034_643_8),
        ("car", 0.871_977_390_743_304),
        ("ride", -2.228_735_029_92),
    ];

    /// Observed mode shares
    pub const TARGET: [(&str, f64); 5] = [
        ("walk", 0.199_819),
        ("bike", 0.116_362),
        ("pt", 0.049_501),
        ("car", 0.496_881),
        ("ride", 0.137_437),
    ];

    /// The modes as a `Vec`
    pub fn modes() -> Vec<Mode> {
        MODES.into_iter().map(Mode::new).collect()
    }

    /// The initial constants as an [`AscMap`]
    pub fn initial_asc() -> AscMap {
        mode_map(INITIAL_ASC)
    }

    /// The target shares as a [`ModeShareMap`]
    pub fn target() -> ModeShareMap {
        mode_map(TARGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;

    #[test]
    fn test_lausitz_target() {
        let target = lausitz::target();
        assert_eq!(
            target.keys().map(Mode::as_str).collect_vec(),
            ["walk", "bike", "pt", "car", "ride"]
        );
        assert_approx_eq!(f64, target[&Mode::new("walk")], 0.199_819);
        assert_approx_eq!(f64, target[&Mode::new("bike")], 0.116_362);
        assert_approx_eq!(f64, target[&Mode::new("pt")], 0.049_501);
        assert_approx_eq!(f64, target[&Mode::new("car")], 0.496_881);
        assert_approx_eq!(f64, target[&Mode::new("ride")], 0.137_437);
        assert_approx_eq!(f64, target.values().sum::<f64>(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_lausitz_initial_asc() {
        let initial = lausitz::initial_asc();
        assert!(!initial.contains_key(lausitz::FIXED_MODE));
        assert_eq!(initial.len(), 4);
        assert!(initial.keys().all(|mode| lausitz::MODES.contains(&mode.as_str())));
    }
}
