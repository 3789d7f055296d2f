//! Common routines for handling input data.
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Whether the file at `file_path` is gzip-compressed, judged by its extension
pub fn is_gzip(file_path: &Path) -> bool {
    file_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Open a file for reading, transparently decompressing it if it ends in `.gz`
pub fn open_reader(file_path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(file_path).with_context(|| input_err_msg(file_path))?;
    let reader: Box<dyn Read> = if is_gzip(file_path) {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(reader)
}

/// Check that a value is a valid proportion (i.e. between 0 and 1 inclusive)
pub fn check_proportion(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use rstest::rstest;
    use serde::Deserialize;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        id: String,
        value: u32,
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id = \"hello\"\nvalue = 1").unwrap();
        }

        assert_eq!(
            read_toml::<Record>(&file_path).unwrap(),
            Record {
                id: "hello".to_string(),
                value: 1,
            }
        );

        // Missing file
        let missing = dir.path().join("missing.toml");
        assert_eq!(
            read_toml::<Record>(&missing).unwrap_err().to_string(),
            input_err_msg(&missing)
        );
    }

    #[rstest]
    #[case("trips.csv.gz", true)]
    #[case("trips.csv.GZ", true)]
    #[case("trips.csv", false)]
    #[case("gz", false)]
    fn test_is_gzip(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_gzip(&PathBuf::from(name)), expected);
    }

    #[test]
    fn test_open_reader_gzip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("data.csv.gz");
        {
            let file = File::create(&file_path).unwrap();
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(b"a;b\n1;2\n").unwrap();
            encoder.finish().unwrap();
        }

        let mut contents = String::new();
        open_reader(&file_path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "a;b\n1;2\n");
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.5, true)]
    #[case(1.0, true)]
    #[case(-0.1, false)]
    #[case(1.1, false)]
    #[case(f64::NAN, false)]
    fn test_check_proportion(#[case] value: f64, #[case] expected: bool) {
        assert_eq!(check_proportion(value), expected);
    }
}
