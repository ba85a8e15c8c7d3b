use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Settings for a single batch run.
///
/// Every field has a default reproducing the published analysis, so an empty TOML file (or no file
/// at all) is a valid configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Samples strictly shallower than this depth form the fit subset
    pub depth_threshold: f64,
    /// Rows preceding the header row in both input files
    pub header_rows_skipped: usize,
    pub input_path_sample_res: PathBuf,
    pub input_path_high_res: PathBuf,
    pub output_path_sample_res: PathBuf,
    pub output_path_high_res: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            depth_threshold: 81.0,
            header_rows_skipped: 1,
            input_path_sample_res: PathBuf::from("volumetric_contents_sampleRes_lab+CT.csv"),
            input_path_high_res: PathBuf::from("volumetric_contents_highRes_CT.csv"),
            output_path_sample_res: PathBuf::from("volumetric_contents_sampleRes_all.csv"),
            output_path_high_res: PathBuf::from("volumetric_contents_highRes_all.csv"),
        }
    }
}

impl Config {
    /// Read a configuration from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| Error::Config {
            path: path.to_owned(),
            source,
        })
    }
}
