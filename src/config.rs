//! Application-level configuration loading: scoring policy, join codes and connection limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_LIVE_CONFIG_PATH";

const DEFAULT_CORRECT_POINTS: u32 = 100;
const DEFAULT_LEADERBOARD_SIZE: usize = 10;
const DEFAULT_JOIN_CODE_LENGTH: usize = 6;
const DEFAULT_JOIN_CODE_ALPHABET: &str = "0123456789";
const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;
const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration handed to the engine at construction.
pub struct AppConfig {
    scoring: ScoringPolicy,
    leaderboard_size: usize,
    join_code: JoinCodePolicy,
    outbound_queue_capacity: usize,
    transition_timeout: Option<Duration>,
}

/// Points awarded for a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    /// Points for picking the correct option.
    pub correct_points: u32,
    /// Points for any other option.
    pub incorrect_points: u32,
}

impl ScoringPolicy {
    /// Points earned by an answer with the given correctness.
    pub fn points_for(&self, is_correct: bool) -> u32 {
        if is_correct {
            self.correct_points
        } else {
            self.incorrect_points
        }
    }
}

/// Shape of the human-shareable join codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCodePolicy {
    length: usize,
    alphabet: Vec<char>,
}

impl JoinCodePolicy {
    /// Build a policy, rejecting empty lengths or alphabets.
    pub fn new(length: usize, alphabet: &str) -> Option<Self> {
        let alphabet = alphabet.chars().collect::<Vec<_>>();
        (length > 0 && !alphabet.is_empty()).then_some(Self { length, alphabet })
    }

    /// Draw a fresh random code.
    ///
    /// With a decimal alphabet the first character is never `0` so codes read as plain numbers.
    pub fn generate(&self) -> String {
        let mut rng = rand::rng();
        let leading = if self.alphabet.len() > 1 && self.alphabet[0] == '0' {
            &self.alphabet[1..]
        } else {
            &self.alphabet[..]
        };

        (0..self.length)
            .map(|position| {
                let pool = if position == 0 { leading } else { &self.alphabet[..] };
                pool[rng.random_range(0..pool.len())]
            })
            .collect()
    }

    /// Whether `code` could have been produced by [`Self::generate`].
    pub fn is_valid(&self, code: &str) -> bool {
        code.chars().count() == self.length && code.chars().all(|c| self.alphabet.contains(&c))
    }
}

impl Default for JoinCodePolicy {
    fn default() -> Self {
        Self {
            length: DEFAULT_JOIN_CODE_LENGTH,
            alphabet: DEFAULT_JOIN_CODE_ALPHABET.chars().collect(),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        correct_points = app_config.scoring.correct_points,
                        join_code_length = app_config.join_code.length,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document; absent keys keep their defaults.
    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Scoring applied by the answer pipeline.
    pub fn scoring(&self) -> ScoringPolicy {
        self.scoring
    }

    /// Number of entries kept in a leaderboard.
    pub fn leaderboard_size(&self) -> usize {
        self.leaderboard_size
    }

    /// Join code generation and validation rules.
    pub fn join_code(&self) -> &JoinCodePolicy {
        &self.join_code
    }

    /// Outbound frames buffered per connection before new ones are dropped.
    pub fn outbound_queue_capacity(&self) -> usize {
        self.outbound_queue_capacity
    }

    /// Upper bound on each store read performed inside a session transition.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout
    }

    /// Replace the transition timeout; `None` disables it.
    pub fn with_transition_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transition_timeout = timeout;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    scoring: RawScoring,
    leaderboard_size: Option<usize>,
    join_code: RawJoinCode,
    outbound_queue_capacity: Option<usize>,
    transition_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScoring {
    correct_points: Option<u32>,
    incorrect_points: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawJoinCode {
    length: Option<usize>,
    alphabet: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let join_code = JoinCodePolicy::new(
            value.join_code.length.unwrap_or(DEFAULT_JOIN_CODE_LENGTH),
            value
                .join_code
                .alphabet
                .as_deref()
                .unwrap_or(DEFAULT_JOIN_CODE_ALPHABET),
        )
        .unwrap_or_else(|| {
            warn!("join code policy must have a non-empty length and alphabet; using defaults");
            JoinCodePolicy::default()
        });

        Self {
            scoring: ScoringPolicy {
                correct_points: value
                    .scoring
                    .correct_points
                    .unwrap_or(DEFAULT_CORRECT_POINTS),
                incorrect_points: value.scoring.incorrect_points.unwrap_or(0),
            },
            leaderboard_size: value
                .leaderboard_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_LEADERBOARD_SIZE),
            join_code,
            outbound_queue_capacity: value
                .outbound_queue_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(DEFAULT_OUTBOUND_QUEUE_CAPACITY),
            transition_timeout: match value.transition_timeout_ms {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => Some(Duration::from_millis(DEFAULT_TRANSITION_TIMEOUT_MS)),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
