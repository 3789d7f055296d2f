//! Helpers shared by the integration tests which run whole studies.
use asc_calib::adjust::{SIM_FILE_NAME, SURVEY_FILE_NAME};
use std::fs;
use std::path::{Path, PathBuf};

/// A stand-in for the simulation, which writes fixed persons and trips files for each run
const FAKE_SIMULATION: &str = r#"
while [ $# -gt 0 ]; do
    case "$1" in
        --output) out="$2"; shift ;;
        --runId) id="$2"; shift ;;
    esac
    shift
done
mkdir -p "$out"
printf 'person;home_x;home_y\n1;5;5\n2;50;50\nfreight_1;;\n' > "$out/$id.output_persons.csv"
printf 'person;main_mode\n1;car\n1;walk\n1;pt_bus\n1;car\n2;car\nfreight_1;freight\n' > "$out/$id.output_trips.csv"
"#;

/// Write a study which runs [`FAKE_SIMULATION`] with `sh`, along with survey and simulated mode
/// shares for the adjustment step.
///
/// # Returns
///
/// The path to the study file
pub fn write_fake_study(dir: &Path) -> PathBuf {
    let script_path = dir.join("simulation.sh");
    fs::write(&script_path, FAKE_SIMULATION).unwrap();
    fs::write(
        dir.join("region.wkt"),
        "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))",
    )
    .unwrap();
    fs::write(
        dir.join(SURVEY_FILE_NAME),
        "mode,dist_group,share\nwalk,0 - 1000,0.3\ncar,0 - 1000,0.1\ncar,1000 - 5000,0.6\n",
    )
    .unwrap();
    fs::write(
        dir.join(SIM_FILE_NAME),
        "mode,dist_group,share\nwalk,0 - 1000,0.1\ncar,0 - 1000,0.1\ncar,1000 - 5000,0.8\n",
    )
    .unwrap();

    let study_path = dir.join("study.toml");
    fs::write(
        &study_path,
        format!(
            r#"
name = "fake"
jar = "scenario.jar"
config = "config.xml"
java_executable = "sh"
jvm_args = "{}"
modes = ["walk", "car", "pt"]
fixed_mode = "walk"
iterations = 5

[target]
walk = 0.3
car = 0.5
pt = 0.2

[region]
file = "region.wkt"
"#,
            script_path.display()
        ),
    )
    .unwrap();

    study_path
}
