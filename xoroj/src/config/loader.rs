//! Configuration loader
//!
//! Loading pipeline:
//! 1. Size check and BOM stripping
//! 2. Environment variable expansion (pre-parse, on raw text)
//! 3. YAML deserialization to [`ClientConfig`]
//! 4. Environment overrides (`XOROJ_API_URL`, `XOROJ_TOKEN`,
//!    `XOROJ_SKEW_MARGIN_MS`)
//! 5. Validation

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::schema::{ClientConfig, MAX_SKEW_MARGIN};
use crate::error::{ConfigError, Severity, ValidationIssue};

/// Largest configuration file accepted.
pub const MAX_CONFIG_SIZE: usize = 1024 * 1024;

/// Result of loading a configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: ClientConfig,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    max_config_size: usize,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            max_config_size: env_or("XOROJ_MAX_CONFIG_SIZE", MAX_CONFIG_SIZE),
        }
    }
}

impl ConfigLoader {
    /// Creates a loader with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path` when given, otherwise defaults; environment overrides
    /// and validation apply either way.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load) and [`load_defaults`](Self::load_defaults).
    pub fn load_optional(&self, path: Option<&Path>) -> Result<LoadResult, ConfigError> {
        path.map_or_else(|| self.load_defaults(), |p| self.load(p))
    }

    /// Builds a configuration from defaults plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is malformed or validation fails.
    pub fn load_defaults(&self) -> Result<LoadResult, ConfigError> {
        self.finish(ClientConfig::default(), "<defaults>", Vec::new())
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - A `${VAR:?message}` reference is unset
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.max_config_size),
            });
        }

        let raw_content = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let raw_content = raw_content.strip_prefix('\u{feff}').unwrap_or(&raw_content);

        let mut env_sub = EnvSubstitution::new();
        let substituted = env_sub.substitute(raw_content, path)?;

        // An empty file is an empty mapping: all defaults.
        let config: ClientConfig = if substituted.trim().is_empty() {
            ClientConfig::default()
        } else {
            serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        self.finish(config, &path.display().to_string(), env_sub.warnings)
    }

    #[allow(clippy::unused_self)]
    fn finish(
        &self,
        mut config: ClientConfig,
        origin: &str,
        mut warnings: Vec<LoadWarning>,
    ) -> Result<LoadResult, ConfigError> {
        apply_env_overrides(&mut config)?;

        let issues = validate(&config);
        let (errors, rest): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|i| i.severity == Severity::Error);
        if !errors.is_empty() {
            return Err(ConfigError::ValidationError {
                path: origin.to_string(),
                errors,
            });
        }
        warnings.extend(rest.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult { config, warnings })
    }
}

fn apply_env_overrides(config: &mut ClientConfig) -> Result<(), ConfigError> {
    if let Some(url) = non_empty_var("XOROJ_API_URL") {
        config.api.base_url = url;
    }
    if let Some(token) = non_empty_var("XOROJ_TOKEN") {
        config.api.token = Some(token);
    }
    if let Some(raw) = non_empty_var("XOROJ_SKEW_MARGIN_MS") {
        let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: "XOROJ_SKEW_MARGIN_MS".to_string(),
            value: raw.clone(),
            expected: "a whole number of milliseconds".to_string(),
        })?;
        config.controller.skew_margin = Duration::from_millis(millis);
    }
    // `${XOROJ_TOKEN}` expanding to nothing means "no token".
    if config.api.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
        config.api.token = None;
    }
    Ok(())
}

/// Checks a configuration and returns every issue found.
#[must_use]
pub fn validate(config: &ClientConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut push = |path: &str, message: String, severity: Severity| {
        issues.push(ValidationIssue {
            path: path.to_string(),
            message,
            severity,
        });
    };

    let base_url = config.api.base_url.trim();
    let is_https = base_url.starts_with("https://");
    if !is_https && !base_url.starts_with("http://") {
        push(
            "api.base_url",
            format!("'{base_url}' must start with http:// or https://"),
            Severity::Error,
        );
    } else if !is_https && config.api.token.is_some() {
        push(
            "api.token",
            "bearer token will be sent over plain http".to_string(),
            Severity::Warning,
        );
    }

    if config.api.timeout.is_zero() {
        push(
            "api.timeout",
            "timeout must be greater than zero".to_string(),
            Severity::Error,
        );
    }

    let skew = config.controller.skew_margin;
    if skew.is_zero() || skew > MAX_SKEW_MARGIN {
        push(
            "controller.skew_margin",
            format!(
                "skew margin {} must be above zero and at most {}",
                humantime::format_duration(skew),
                humantime::format_duration(MAX_SKEW_MARGIN)
            ),
            Severity::Error,
        );
    }

    issues
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text BEFORE parsing so substituted values keep their
/// YAML type inference.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Substitutes environment variables in raw YAML text.
    ///
    /// Supports:
    /// - `${VAR}` - expand to value (empty string if unset with warning)
    /// - `${VAR:-default}` - expand to default if unset
    /// - `${VAR:?message}` - fail if unset
    /// - `$$` - literal `$`
    fn substitute(&mut self, raw_yaml: &str, source_path: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw_yaml.len());
        let mut chars = raw_yaml.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let spec = parse_var_spec(&mut chars, source_path)?;
                    match std::env::var(&spec.name) {
                        Ok(value) => result.push_str(&value),
                        Err(_) => match spec.fallback {
                            Fallback::Default(default) => result.push_str(&default),
                            Fallback::Required(message) => {
                                return Err(ConfigError::EnvVarNotSet {
                                    var: spec.name,
                                    location: message,
                                });
                            }
                            Fallback::Empty => self.warnings.push(LoadWarning {
                                message: format!(
                                    "Environment variable '{}' is not set, using empty string",
                                    spec.name
                                ),
                                location: Some(source_path.display().to_string()),
                            }),
                        },
                    }
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }
}

struct VarSpec {
    name: String,
    fallback: Fallback,
}

enum Fallback {
    Empty,
    Default(String),
    Required(String),
}

/// Parses the inside of `${...}`; the opening brace is already consumed.
fn parse_var_spec(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    source_path: &Path,
) -> Result<VarSpec, ConfigError> {
    let mut name = String::new();

    while let Some(c) = chars.next() {
        match c {
            '}' => {
                return Ok(VarSpec {
                    name,
                    fallback: Fallback::Empty,
                });
            }
            ':' => match chars.peek() {
                Some('-') => {
                    chars.next();
                    let default = read_until_close(chars, source_path)?;
                    return Ok(VarSpec {
                        name,
                        fallback: Fallback::Default(default),
                    });
                }
                Some('?') => {
                    chars.next();
                    let message = read_until_close(chars, source_path)?;
                    return Ok(VarSpec {
                        name,
                        fallback: Fallback::Required(message),
                    });
                }
                _ => name.push(':'),
            },
            _ => name.push(c),
        }
    }

    Err(unclosed(source_path, &format!("${{{name}")))
}

/// Reads until the matching `}`, allowing nested braces.
fn read_until_close(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    source_path: &Path,
) -> Result<String, ConfigError> {
    let mut value = String::new();
    let mut depth = 1;

    for c in chars.by_ref() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(value);
                }
            }
            _ => {}
        }
        value.push(c);
    }

    Err(unclosed(source_path, &value))
}

fn unclosed(source_path: &Path, fragment: &str) -> ConfigError {
    ConfigError::ParseError {
        path: PathBuf::from(source_path),
        line: None,
        message: format!("Unclosed environment variable reference: {fragment}"),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_substitution_simple() {
        // PATH is always set
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("path: ${PATH}", Path::new("test.yaml"))
            .unwrap();
        assert!(!result.contains("${PATH}"));
        assert!(result.len() > "path: ".len());
    }

    #[test]
    fn test_env_substitution_default() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute(
                "timeout: ${XOROJ_TEST_NONEXISTENT_VAR_XYZ123:-5s}",
                Path::new("test.yaml"),
            )
            .unwrap();
        assert_eq!(result, "timeout: 5s");
        assert!(sub.warnings.is_empty());
    }

    #[test]
    fn test_env_substitution_required_missing() {
        let mut sub = EnvSubstitution::new();
        let result = sub.substitute(
            "token: ${XOROJ_TEST_REQUIRED_XYZ123:?login first}",
            Path::new("test.yaml"),
        );
        match result {
            Err(ConfigError::EnvVarNotSet { var, location }) => {
                assert_eq!(var, "XOROJ_TEST_REQUIRED_XYZ123");
                assert_eq!(location, "login first");
            }
            other => panic!("expected EnvVarNotSet, got {other:?}"),
        }
    }

    #[test]
    fn test_env_substitution_escaped_dollar() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("note: $$100 and $x", Path::new("test.yaml"))
            .unwrap();
        assert_eq!(result, "note: $100 and $x");
    }

    #[test]
    fn test_env_substitution_missing_warning() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("token: ${XOROJ_TEST_WARN_XYZ123}", Path::new("test.yaml"))
            .unwrap();
        assert_eq!(result, "token: ");
        assert_eq!(sub.warnings.len(), 1);
        assert!(sub.warnings[0].message.contains("XOROJ_TEST_WARN_XYZ123"));
    }

    #[test]
    fn test_env_substitution_nested_default_braces() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("v: ${XOROJ_TEST_NESTED_XYZ:-{a}}", Path::new("test.yaml"))
            .unwrap();
        assert_eq!(result, "v: {a}");
    }

    #[test]
    fn test_env_substitution_unclosed() {
        let mut sub = EnvSubstitution::new();
        let err = sub
            .substitute("v: ${XOROJ_OPEN", Path::new("test.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_validate_collects_every_error() {
        let mut config = ClientConfig::default();
        config.api.base_url = "ftp://oj".to_string();
        config.api.timeout = Duration::ZERO;
        config.controller.skew_margin = Duration::from_secs(2);

        let issues = validate(&config);
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            ["api.base_url", "api.timeout", "controller.skew_margin"]
        );
        assert!(issues.iter().all(|i| i.severity == Severity::Error));
    }

    #[test]
    fn test_validate_warns_on_plain_http_token() {
        let mut config = ClientConfig::default();
        config.api.token = Some("secret".to_string());
        let issues = validate(&config);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].path, "api.token");
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(validate(&ClientConfig::default()).is_empty());
    }

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("XOROJ_TEST_ENV_OR_XYZ123", 7usize), 7);
    }
}
