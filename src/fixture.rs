//! Fixtures for tests
use crate::mode::{AscMap, Mode, ModeShareMap, mode_map};
use crate::region::Region;
use geo::{MultiPolygon, polygon};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A 10 x 10 square with its lower-left corner at the origin
#[fixture]
pub fn square_region() -> Region {
    Region::new(MultiPolygon::new(vec![polygon![
        (x: 0.0, y: 0.0),
        (x: 10.0, y: 0.0),
        (x: 10.0, y: 10.0),
        (x: 0.0, y: 10.0),
        (x: 0.0, y: 0.0),
    ]]))
}

#[fixture]
pub fn modes() -> Vec<Mode> {
    ["walk", "car", "pt"].into_iter().map(Mode::new).collect()
}

#[fixture]
pub fn target() -> ModeShareMap {
    mode_map([("walk", 0.3), ("car", 0.5), ("pt", 0.2)])
}

#[fixture]
pub fn initial_asc() -> AscMap {
    mode_map([("car", 1.5), ("pt", -1.0)])
}
