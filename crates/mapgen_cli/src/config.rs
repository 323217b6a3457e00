//! Generation inputs: environment and overrides from files and flags.

use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use mapgen_core::{Dimensions, Env};
use mapgen_schema::Value;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Seed used when neither a file nor `--seed` gives one
pub const DEFAULT_SEED: u64 = 1;
/// Default map width
pub const DEFAULT_WIDTH: u32 = 64;
/// Default map height
pub const DEFAULT_HEIGHT: u32 = 40;

/// Flags shared by `compile` and `run`
#[derive(Debug, Clone, Default, Args)]
pub struct GenerationArgs {
    /// Environment JSON file (`{seed, dimensions, latitudeBounds, wrap}`)
    #[arg(long, value_name = "FILE")]
    pub env: Option<PathBuf>,
    /// Overrides JSON file keyed by stage id
    #[arg(long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,
    /// World seed, replacing the file value
    #[arg(long)]
    pub seed: Option<u64>,
    /// Map width, replacing the file value
    #[arg(long)]
    pub width: Option<u32>,
    /// Map height, replacing the file value
    #[arg(long)]
    pub height: Option<u32>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("failed to parse {}", path.display()))
}

impl GenerationArgs {
    /// Environment from the file, if any, with flags applied on top
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or the result
    /// is not a valid environment
    pub fn load_env(&self) -> Result<Env> {
        let mut env = match &self.env {
            Some(path) => read_json::<Env>(path)?,
            None => Env::new(DEFAULT_SEED, Dimensions::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)),
        };
        if let Some(seed) = self.seed {
            env.seed = seed;
        }
        if let Some(width) = self.width {
            env.dimensions.width = width;
        }
        if let Some(height) = self.height {
            env.dimensions.height = height;
        }
        env.validate().wrap_err("invalid generation environment")?;
        Ok(env)
    }

    /// Overrides from the file, or `Null` without one
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_overrides(&self) -> Result<Value> {
        match &self.overrides {
            Some(path) => Ok(Value::from(read_json::<serde_json::Value>(path)?)),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_files() {
        let args = GenerationArgs::default();
        let env = args.load_env().unwrap();
        assert_eq!(env.seed, DEFAULT_SEED);
        assert_eq!(env.dimensions, Dimensions::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));
        assert_eq!(args.load_overrides().unwrap(), Value::Null);
    }

    #[test]
    fn test_flags_override_env_file() {
        let env_file = file(r#"{"seed": 9, "dimensions": {"width": 10, "height": 8}, "wrap": {"wrapX": false, "wrapY": false}}"#);
        let args = GenerationArgs {
            env: Some(env_file.path().to_path_buf()),
            seed: Some(77),
            height: Some(12),
            ..GenerationArgs::default()
        };
        let env = args.load_env().unwrap();
        assert_eq!(env.seed, 77);
        assert_eq!(env.dimensions, Dimensions::new(10, 12));
        assert!(!env.wrap.wrap_x);
    }

    #[test]
    fn test_invalid_env_rejected() {
        let args = GenerationArgs {
            width: Some(0),
            ..GenerationArgs::default()
        };
        let err = args.load_env().unwrap_err();
        assert!(err.to_string().contains("invalid generation environment"));
    }

    #[test]
    fn test_overrides_file() {
        let overrides = file(r#"{"ecology": {"knobs": {"arid": true}}}"#);
        let args = GenerationArgs {
            overrides: Some(overrides.path().to_path_buf()),
            ..GenerationArgs::default()
        };
        let value = args.load_overrides().unwrap();
        assert_eq!(value.get_path(&["ecology", "knobs", "arid"]), Some(&Value::from(true)));
    }

    #[test]
    fn test_unreadable_and_malformed_files() {
        let args = GenerationArgs {
            overrides: Some(PathBuf::from("/definitely/not/here.json")),
            ..GenerationArgs::default()
        };
        assert!(args.load_overrides().unwrap_err().to_string().contains("failed to read"));

        let broken = file("{not json");
        let args = GenerationArgs {
            env: Some(broken.path().to_path_buf()),
            ..GenerationArgs::default()
        };
        assert!(args.load_env().unwrap_err().to_string().contains("failed to parse"));
    }
}
