use thiserror::Error;

pub const DEFAULT_CIRCLE: &str = "main-cafe";
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;
/// Enough for a join's history, member list and notice plus some slack.
pub const MIN_OUTBOX_CAPACITY: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Runtime settings, read from the process environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Messages kept per circle; older ones are evicted.
    pub history_capacity: usize,
    /// Queued events per connection before it is dropped from its circle.
    pub outbox_capacity: usize,
    /// Circle joined when a client does not name one.
    pub default_circle: String,
    pub cors_permissive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            default_circle: DEFAULT_CIRCLE.to_owned(),
            cors_permissive: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: port,
                expected: "a port number",
            })?;
        }
        if let Some(capacity) = lookup("HISTORY_CAPACITY") {
            config.history_capacity = match capacity.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "HISTORY_CAPACITY",
                        value: capacity,
                        expected: "a positive integer",
                    });
                }
            };
        }
        if let Some(capacity) = lookup("OUTBOX_CAPACITY") {
            config.outbox_capacity = match capacity.trim().parse::<usize>() {
                Ok(n) if n >= MIN_OUTBOX_CAPACITY => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "OUTBOX_CAPACITY",
                        value: capacity,
                        expected: "an integer of at least 8",
                    });
                }
            };
        }
        if let Some(circle) = lookup("DEFAULT_CIRCLE") {
            let circle = circle.trim();
            if circle.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "DEFAULT_CIRCLE",
                    value: circle.to_owned(),
                    expected: "a non-empty circle id",
                });
            }
            config.default_circle = circle.to_owned();
        }
        if let Some(cors) = lookup("CORS_PERMISSIVE") {
            config.cors_permissive = match cors.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "CORS_PERMISSIVE",
                        value: cors,
                        expected: "a boolean",
                    });
                }
            };
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
