// Configuration loading and parsing (raffle.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Name of the config file inside `config/` (and `defaults/`).
pub const CONFIG_FILE: &str = "raffle.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// raffle.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub draw: DrawSettings,
    #[serde(default)]
    pub cue: CueSettings,
}

/// Header names of the roster columns that feed each attendee field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub name: String,
    pub title: String,
    pub guests: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        ColumnMapping {
            name: "Name".into(),
            title: "Title".into(),
            guests: "Guests".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DrawSettings {
    /// Total length of a draw.
    pub duration_ms: u64,
    /// Time between two selections.
    pub interval_ms: u64,
}

impl Default for DrawSettings {
    fn default() -> Self {
        DrawSettings {
            duration_ms: 5_000,
            interval_ms: 100,
        }
    }
}

impl DrawSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Audio played once when a draw starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CueSettings {
    /// Audio file to play; no cue when absent.
    pub path: Option<String>,
    /// Program and arguments of a player that reads audio from stdin,
    /// e.g. `["aplay", "-q", "-"]`. Without one the cue is skipped.
    pub command: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/raffle.toml` relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config = parse_config(&path, &text)?;
    validate(&config)?;
    Ok(config)
}

fn parse_config(path: &Path, text: &str) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Seed `config/raffle.toml` from `defaults/raffle.toml` when it is absent.
///
/// Returns the path written, or `None` when a config file was already in
/// place. An existing file is never overwritten.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let target = base_dir.join("config").join(CONFIG_FILE);

    if target.exists() {
        return Ok(None);
    }
    let content = match std::fs::read(&source) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "no config/{CONFIG_FILE} or defaults/{CONFIG_FILE} in {}; \
                     run from the project root or pass --config-dir",
                    base_dir.display()
                ),
            });
        }
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("failed to read {}: {e}", source.display()),
            });
        }
    };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create config directory: {e}"),
        })?;
    }

    // create_new: a config written between the check above and here wins.
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("failed to create {}: {e}", target.display()),
            });
        }
    };
    std::io::Write::write_all(&mut dest, &content).map_err(|e| {
        ConfigError::DefaultsCopyError {
            message: format!("failed to write {}: {e}", target.display()),
        }
    })?;
    info!("Copied default config to {}", target.display());
    Ok(Some(target))
}

/// Loads config relative to `base_dir`, copying defaults first.
pub fn load_config_in(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_file(base_dir)?;
    load_config_from(base_dir)
}

/// Convenience wrapper: loads config relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_in(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let draw = &config.draw;
    if draw.duration_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "draw.duration_ms".into(),
            message: "must be greater than 0".into(),
        });
    }
    if draw.interval_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "draw.interval_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    let cols = &config.columns;
    let column_fields: &[(&str, &str)] = &[
        ("columns.name", cols.name.as_str()),
        ("columns.title", cols.title.as_str()),
        ("columns.guests", cols.guests.as_str()),
    ];
    for (field, value) in column_fields {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: "must not be empty".into(),
            });
        }
    }
    for (i, (field, value)) in column_fields.iter().enumerate() {
        if let Some((other, _)) = column_fields[..i].iter().find(|(_, v)| v == value) {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: format!("duplicates {other} ({value:?})"),
            });
        }
    }

    if let Some(command) = &config.cue.command {
        if command.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                field: "cue.command".into(),
                message: "must name a program".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// The `defaults/` directory shipped at the workspace root.
    fn shipped_defaults() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../defaults")
    }

    /// Fresh temp dir containing `config/raffle.toml` with the given text.
    fn config_dir_with(name: &str, text: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), text).unwrap();
        tmp
    }

    fn expect_validation_field(err: ConfigError, expected: &str) {
        match &err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn shipped_defaults_load_and_validate() {
        let text = fs::read_to_string(shipped_defaults().join(CONFIG_FILE))
            .expect("defaults/raffle.toml should exist");
        let config = parse_config(Path::new(CONFIG_FILE), &text).expect("should parse");
        validate(&config).expect("should validate");

        assert_eq!(config.columns, ColumnMapping::default());
        assert_eq!(config.draw.duration(), Duration::from_secs(5));
        assert_eq!(config.draw.interval(), Duration::from_millis(100));
        assert!(config.cue.path.is_none());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let tmp = config_dir_with("raffle_config_test_empty", "");
        let config = load_config_from(&tmp).expect("empty config should load");
        assert_eq!(config.columns.name, "Name");
        assert_eq!(config.draw, DrawSettings::default());
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let tmp = config_dir_with(
            "raffle_config_test_partial",
            r#"
[columns]
name = "Member"

[draw]
interval_ms = 250

[cue]
path = "assets/drumroll.wav"
command = ["aplay", "-q", "-"]
"#,
        );
        let config = load_config_from(&tmp).expect("should load");
        assert_eq!(config.columns.name, "Member");
        assert_eq!(config.columns.title, "Title");
        assert_eq!(config.draw.duration_ms, 5_000);
        assert_eq!(config.draw.interval_ms, 250);
        assert_eq!(config.cue.path.as_deref(), Some("assets/drumroll.wav"));
        assert_eq!(
            config.cue.command,
            Some(vec!["aplay".to_string(), "-q".to_string(), "-".to_string()])
        );
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_duration() {
        let tmp = config_dir_with("raffle_config_test_zero_duration", "[draw]\nduration_ms = 0\n");
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "draw.duration_ms");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_interval() {
        let tmp = config_dir_with("raffle_config_test_zero_interval", "[draw]\ninterval_ms = 0\n");
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "draw.interval_ms");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_blank_column_name() {
        let tmp = config_dir_with("raffle_config_test_blank_column", "[columns]\ntitle = \" \"\n");
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "columns.title");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_duplicate_column_names() {
        let tmp = config_dir_with(
            "raffle_config_test_dup_column",
            "[columns]\nguests = \"Name\"\n",
        );
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "columns.guests");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_cue_command() {
        let tmp = config_dir_with("raffle_config_test_empty_cue", "[cue]\ncommand = []\n");
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "cue.command");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = config_dir_with("raffle_config_test_invalid", "this is not valid [[[ toml");
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = std::env::temp_dir().join("raffle_config_test_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_file_copies_shipped_defaults() {
        let tmp = std::env::temp_dir().join("raffle_config_test_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::copy(
            shipped_defaults().join(CONFIG_FILE),
            defaults_dir.join(CONFIG_FILE),
        )
        .unwrap();

        let copied = ensure_config_file(&tmp).expect("should succeed");
        assert_eq!(copied, Some(tmp.join("config").join(CONFIG_FILE)));

        let config = load_config_in(&tmp).expect("copied defaults should load");
        assert_eq!(config.draw, DrawSettings::default());
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_file_keeps_existing_config() {
        let tmp = std::env::temp_dir().join("raffle_config_test_ensure_skips");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("defaults").join(CONFIG_FILE), "[draw]\nduration_ms = 1\n").unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), "# custom\n").unwrap();

        assert_eq!(ensure_config_file(&tmp).expect("should succeed"), None);
        let content = fs::read_to_string(tmp.join("config").join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_file_ignores_other_defaults() {
        let tmp = std::env::temp_dir().join("raffle_config_test_other_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults").join(CONFIG_FILE), "").unwrap();
        fs::write(tmp.join("defaults").join("notes.txt"), "not config\n").unwrap();

        ensure_config_file(&tmp).expect("should succeed");
        let copied: Vec<_> = fs::read_dir(tmp.join("config"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(copied, vec![std::ffi::OsString::from(CONFIG_FILE)]);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_file_without_defaults_uses_existing_config() {
        let tmp = std::env::temp_dir().join("raffle_config_test_no_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), "").unwrap();

        assert_eq!(ensure_config_file(&tmp).expect("should succeed"), None);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_file_errors_when_nothing_to_load() {
        let tmp = std::env::temp_dir().join("raffle_config_test_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        match ensure_config_file(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("defaults/raffle.toml"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
        assert!(!tmp.join("config").exists());
        let _ = fs::remove_dir_all(&tmp);
    }
}
