//! # Config Module
//!
//! Settings from `config.yaml` merged with command-line overrides.
//!
//! Only the `app_capture` mapping is read. A missing file, or a file whose
//! root is not a mapping, yields the defaults with a warning; YAML that does
//! not parse is an error. Every value is range-checked after merging and
//! rejected, never clamped.
//!
//! ```yaml
//! app_capture:
//!   output_dir: ./captures
//!   duplicate_threshold: 3
//!   duplicate_diff_mean: 3.0
//!   duplicate_size_ratio: 0.02   # null disables the ratio criterion
//!   duplicate_limit: 5
//!   min_pages: 2
//!   wait_after_turn: 0.6
//!   capture_command: "screencapture -x -t png {path}"
//!   turn_command: "osascript -e 'tell application \"System Events\" to key code 124'"
//! ```

use crate::core::guard::{GuardConfig, DEFAULT_DUPLICATE_LIMIT, DEFAULT_MIN_PAGES};
use crate::core::policy::{
    PolicyConfig, DEFAULT_HASH_THRESHOLD, DEFAULT_MEAN_DIFF_THRESHOLD,
    DEFAULT_SIZE_RATIO_THRESHOLD,
};
use crate::core::session::{CommandActuatorConfig, SessionConfig, DEFAULT_SESSION_CHECK_INTERVAL};
use crate::core::tail::TailConfig;
use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Root for per-book capture directories
pub const DEFAULT_OUTPUT_DIR: &str = "./captures";

pub const DEFAULT_WAIT_AFTER_TURN: f64 = 0.6;
pub const DEFAULT_INITIAL_WAIT: f64 = 0.4;

const SECTION: &str = "app_capture";

/// The `app_capture` section as written, before range checks
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub duplicate_threshold: Option<i64>,
    pub duplicate_diff_mean: Option<f64>,
    pub duplicate_size_kb: Option<f64>,
    /// Absent: default ratio. Explicit `null`: criterion disabled.
    #[serde(deserialize_with = "explicit_option")]
    pub duplicate_size_ratio: Option<Option<f64>>,
    pub duplicate_limit: Option<i64>,
    pub min_pages: Option<i64>,
    pub max_remove: Option<i64>,
    pub max_pages: Option<i64>,
    pub wait_after_turn: Option<f64>,
    pub initial_wait: Option<f64>,
    pub session_check_interval: Option<i64>,
    pub turn_command: Option<String>,
    pub capture_command: Option<String>,
    pub liveness_command: Option<String>,
    pub has_next_command: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Distinguishes a present `null` from a missing key
fn explicit_option<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

impl FileConfig {
    /// Load the `app_capture` section of `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let parse_error = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let root: Value = serde_yaml::from_str(contents).map_err(|e| parse_error(e.to_string()))?;
        let Value::Mapping(root) = root else {
            if !root.is_null() {
                warn!(path = %path.display(), "Config file is not a mapping, using defaults");
            }
            return Ok(Self::default());
        };

        match root.get(SECTION) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(section) => serde_yaml::from_value(section.clone())
                .map_err(|e| parse_error(format!("{}: {}", SECTION, e))),
        }
    }
}

/// Values given on the command line; each one wins over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub duplicate_threshold: Option<i64>,
    pub duplicate_diff_mean: Option<f64>,
    pub duplicate_size_kb: Option<f64>,
    pub duplicate_size_ratio: Option<f64>,
    pub duplicate_limit: Option<i64>,
    pub min_pages: Option<i64>,
    pub max_remove: Option<i64>,
    pub max_pages: Option<i64>,
    pub wait_after_turn: Option<f64>,
    pub initial_wait: Option<f64>,
    pub log_file: Option<PathBuf>,
}

/// Validated settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub policy: PolicyConfig,
    pub duplicate_limit: u32,
    pub min_pages: u32,
    pub max_remove: Option<usize>,
    pub max_pages: Option<u32>,
    pub wait_after_turn: Duration,
    pub initial_wait: Duration,
    pub session_check_interval: u32,
    /// Root under which each book gets its own directory
    pub output_dir: PathBuf,
    pub turn_command: Option<String>,
    pub capture_command: Option<String>,
    pub liveness_command: Option<String>,
    pub has_next_command: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Merge file values with overrides and range-check the result
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let duplicate_threshold = overrides
            .duplicate_threshold
            .or(file.duplicate_threshold)
            .unwrap_or(DEFAULT_HASH_THRESHOLD as i64);
        let duplicate_size_ratio = match overrides.duplicate_size_ratio {
            Some(ratio) => Some(ratio),
            None => file
                .duplicate_size_ratio
                .unwrap_or(Some(DEFAULT_SIZE_RATIO_THRESHOLD)),
        };
        let wait_after_turn = overrides
            .wait_after_turn
            .or(file.wait_after_turn)
            .unwrap_or(DEFAULT_WAIT_AFTER_TURN);
        let initial_wait = overrides
            .initial_wait
            .or(file.initial_wait)
            .unwrap_or(DEFAULT_INITIAL_WAIT);

        let settings = Self {
            policy: PolicyConfig {
                hash_threshold: to_u32("duplicate_threshold", duplicate_threshold, "between 0 and 64")?,
                mean_diff_threshold: overrides
                    .duplicate_diff_mean
                    .or(file.duplicate_diff_mean)
                    .unwrap_or(DEFAULT_MEAN_DIFF_THRESHOLD),
                size_delta_kb_threshold: overrides.duplicate_size_kb.or(file.duplicate_size_kb),
                size_ratio_threshold: duplicate_size_ratio,
            },
            duplicate_limit: positive_u32(
                "duplicate_limit",
                overrides.duplicate_limit.or(file.duplicate_limit),
                DEFAULT_DUPLICATE_LIMIT,
            )?,
            min_pages: positive_u32(
                "min_pages",
                overrides.min_pages.or(file.min_pages),
                DEFAULT_MIN_PAGES,
            )?,
            max_remove: overrides
                .max_remove
                .or(file.max_remove)
                .map(|n| positive("max_remove", n).map(|n| n as usize))
                .transpose()?,
            max_pages: overrides
                .max_pages
                .or(file.max_pages)
                .map(|n| positive("max_pages", n).and_then(|n| to_u32("max_pages", n, "greater than 0")))
                .transpose()?,
            wait_after_turn: seconds("wait_after_turn", wait_after_turn)?,
            initial_wait: seconds("initial_wait", initial_wait)?,
            session_check_interval: positive_u32(
                "session_check_interval",
                file.session_check_interval,
                DEFAULT_SESSION_CHECK_INTERVAL,
            )?,
            output_dir: file
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            turn_command: file.turn_command,
            capture_command: file.capture_command,
            liveness_command: file.liveness_command,
            has_next_command: file.has_next_command,
            log_file: overrides.log_file.or(file.log_file),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load `path` and merge `overrides`
    pub fn load(path: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        Self::resolve(FileConfig::load(path)?, overrides)
    }

    /// Re-check every range rule
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.guard_config().validate()?;
        if self.max_remove == Some(0) {
            return Err(ConfigError::out_of_range("max_remove", 0, "greater than 0"));
        }
        if self.max_pages == Some(0) {
            return Err(ConfigError::out_of_range("max_pages", 0, "greater than 0"));
        }
        if self.session_check_interval == 0 {
            return Err(ConfigError::out_of_range(
                "session_check_interval",
                0,
                "greater than 0",
            ));
        }
        Ok(())
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            policy: self.policy,
            duplicate_limit: self.duplicate_limit,
            min_pages: self.min_pages,
        }
    }

    pub fn tail_config(&self, dry_run: bool) -> TailConfig {
        TailConfig {
            policy: self.policy,
            min_pages: self.min_pages as usize,
            max_remove: self.max_remove,
            dry_run,
        }
    }

    pub fn session_config(&self, book: Option<String>) -> SessionConfig {
        SessionConfig {
            guard: self.guard_config(),
            max_pages: self.max_pages,
            session_check_interval: self.session_check_interval,
            initial_wait: self.initial_wait,
            book,
        }
    }

    pub fn actuator_config(&self) -> CommandActuatorConfig {
        CommandActuatorConfig {
            turn_command: self.turn_command.clone(),
            capture_command: self.capture_command.clone(),
            liveness_command: self.liveness_command.clone(),
            has_next_command: self.has_next_command.clone(),
            wait_after_turn: self.wait_after_turn,
        }
    }

    /// Capture directory for a book under `output_dir`
    pub fn book_dir(&self, book: &str) -> PathBuf {
        self.output_dir.join(sanitize_book_name(book))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            duplicate_limit: DEFAULT_DUPLICATE_LIMIT,
            min_pages: DEFAULT_MIN_PAGES,
            max_remove: None,
            max_pages: None,
            wait_after_turn: Duration::from_secs_f64(DEFAULT_WAIT_AFTER_TURN),
            initial_wait: Duration::from_secs_f64(DEFAULT_INITIAL_WAIT),
            session_check_interval: DEFAULT_SESSION_CHECK_INTERVAL,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            turn_command: None,
            capture_command: None,
            liveness_command: None,
            has_next_command: None,
            log_file: None,
        }
    }
}

/// Directory-safe form of a book title
pub fn sanitize_book_name(name: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    static RESERVED: OnceLock<Regex> = OnceLock::new();
    let separators = SEPARATORS.get_or_init(|| Regex::new(r"[\\/]+").expect("valid regex"));
    let reserved = RESERVED.get_or_init(|| Regex::new(r#"[:*?"<>|]"#).expect("valid regex"));

    let cleaned = separators.replace_all(name.trim(), "_");
    let cleaned = reserved.replace_all(&cleaned, "_");
    if cleaned.is_empty() {
        "book".to_string()
    } else {
        cleaned.into_owned()
    }
}

fn positive(field: &'static str, value: i64) -> Result<i64, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::out_of_range(field, value, "greater than 0"));
    }
    Ok(value)
}

fn to_u32(field: &'static str, value: i64, expected: &'static str) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::out_of_range(field, value, expected))
}

fn positive_u32(field: &'static str, value: Option<i64>, default: u32) -> Result<u32, ConfigError> {
    match value {
        Some(value) => to_u32(field, positive(field, value)?, "greater than 0"),
        None => Ok(default),
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigError::out_of_range(field, value, "a non-negative number of seconds"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(yaml: &str) -> Result<FileConfig, ConfigError> {
        FileConfig::parse(yaml, Path::new("config.yaml"))
    }

    fn resolve(yaml: &str) -> Result<Settings, ConfigError> {
        Settings::resolve(parse(yaml)?, Overrides::default())
    }

    fn field_of(error: ConfigError) -> &'static str {
        match error {
            ConfigError::OutOfRange { field, .. } => field,
            other => panic!("expected a range error, got {}", other),
        }
    }

    #[test]
    fn empty_file_gives_defaults() {
        let settings = resolve("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.policy.size_ratio_threshold, Some(0.02));
        assert_eq!(settings.policy.size_delta_kb_threshold, None);
    }

    #[test]
    fn non_mapping_root_gives_defaults() {
        assert_eq!(resolve("- just\n- a list\n").unwrap(), Settings::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/config.yaml"), Overrides::default());
        assert_eq!(settings.unwrap(), Settings::default());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            parse("app_capture: [unclosed"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            parse("app_capture:\n  min_pages: lots\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn reads_app_capture_section() {
        let settings = resolve(
            "other: 1\napp_capture:\n  duplicate_threshold: 5\n  duplicate_diff_mean: 1.5\n  \
             duplicate_size_kb: 4\n  duplicate_limit: 3\n  min_pages: 10\n  max_pages: 400\n  \
             wait_after_turn: 1.25\n  capture_command: cap {path}\n",
        )
        .unwrap();

        assert_eq!(settings.policy.hash_threshold, 5);
        assert_eq!(settings.policy.mean_diff_threshold, 1.5);
        assert_eq!(settings.policy.size_delta_kb_threshold, Some(4.0));
        assert_eq!(settings.duplicate_limit, 3);
        assert_eq!(settings.min_pages, 10);
        assert_eq!(settings.max_pages, Some(400));
        assert_eq!(settings.wait_after_turn, Duration::from_millis(1250));
        assert_eq!(settings.capture_command.as_deref(), Some("cap {path}"));
    }

    #[test]
    fn explicit_null_disables_size_ratio() {
        let settings = resolve("app_capture:\n  duplicate_size_ratio: null\n").unwrap();
        assert_eq!(settings.policy.size_ratio_threshold, None);

        let settings = resolve("app_capture:\n  duplicate_size_ratio: 0.5\n").unwrap();
        assert_eq!(settings.policy.size_ratio_threshold, Some(0.5));
    }

    #[test]
    fn overrides_win_over_file() {
        let file = parse("app_capture:\n  duplicate_threshold: 5\n  min_pages: 10\n").unwrap();
        let overrides = Overrides {
            duplicate_threshold: Some(1),
            max_remove: Some(2),
            ..Overrides::default()
        };

        let settings = Settings::resolve(file, overrides).unwrap();

        assert_eq!(settings.policy.hash_threshold, 1);
        assert_eq!(settings.min_pages, 10);
        assert_eq!(settings.max_remove, Some(2));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            ("duplicate_threshold: 65", "duplicate_threshold"),
            ("duplicate_threshold: -1", "duplicate_threshold"),
            ("duplicate_diff_mean: -0.5", "duplicate_diff_mean"),
            ("duplicate_size_kb: -1", "duplicate_size_kb"),
            ("duplicate_size_ratio: -0.1", "duplicate_size_ratio"),
            ("duplicate_limit: 0", "duplicate_limit"),
            ("min_pages: 0", "min_pages"),
            ("min_pages: -3", "min_pages"),
            ("max_remove: 0", "max_remove"),
            ("max_pages: 0", "max_pages"),
            ("wait_after_turn: -1", "wait_after_turn"),
            ("initial_wait: -0.1", "initial_wait"),
            ("session_check_interval: 0", "session_check_interval"),
        ];

        for (line, field) in cases {
            let yaml = format!("app_capture:\n  {}\n", line);
            let error = resolve(&yaml).expect_err(line);
            assert_eq!(field_of(error), field, "{}", line);
        }
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "app_capture:\n  min_pages: 7\n  log_file: /tmp/capture.log").unwrap();

        let settings = Settings::load(file.path(), Overrides::default()).unwrap();

        assert_eq!(settings.min_pages, 7);
        assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/capture.log")));
    }

    #[test]
    fn derived_configs_carry_settings() {
        let settings = Settings {
            max_remove: Some(3),
            ..Settings::default()
        };

        let tail = settings.tail_config(true);
        assert_eq!(tail.min_pages, 2);
        assert_eq!(tail.max_remove, Some(3));
        assert!(tail.dry_run);

        let session = settings.session_config(Some("Dune".to_string()));
        assert_eq!(session.guard.duplicate_limit, 5);
        assert_eq!(
            session.initial_wait,
            Duration::from_secs_f64(DEFAULT_INITIAL_WAIT)
        );
    }

    #[test]
    fn book_names_are_sanitized() {
        assert_eq!(sanitize_book_name("  Dune: Part 1/2 "), "Dune_ Part 1_2");
        assert_eq!(sanitize_book_name("a\\\\b"), "a_b");
        assert_eq!(sanitize_book_name("   "), "book");
    }
}
