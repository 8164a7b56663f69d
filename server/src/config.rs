//! Server configuration loaded from environment variables.

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RELAY_QUEUE_CAPACITY: usize = 256;

/// Tuning knobs for the relay server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Bounded per-client outbound queue. A full queue drops frames for that
    /// client only.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, queue_capacity: DEFAULT_RELAY_QUEUE_CAPACITY }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            queue_capacity: env_parse("RELAY_QUEUE_CAPACITY", DEFAULT_RELAY_QUEUE_CAPACITY).max(1),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
