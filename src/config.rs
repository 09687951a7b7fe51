use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Http,
    Demo,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceKind,
    pub base_url: String,
    pub request_timeout: Duration,
    pub fetch_threads: usize,
    pub games_refresh: Duration,
    pub shooting_stale: Duration,
    pub line_debounce: Duration,
    pub auto_analyze: bool,
    pub shooting_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::Http,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            fetch_threads: 4,
            games_refresh: Duration::from_secs(60),
            shooting_stale: Duration::from_secs(300),
            line_debounce: Duration::from_millis(400),
            auto_analyze: false,
            shooting_fallback: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let source = parse_source(&env::var("PREDICTION_SOURCE").unwrap_or_default());
        let base_url = opt_env("NBA_API_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let request_timeout = Duration::from_secs(env_parse("NBA_API_TIMEOUT_SECS", 10u64).clamp(1, 120));
        let fetch_threads = env_parse("FETCH_THREADS", defaults.fetch_threads).clamp(1, 32);
        let games_refresh = Duration::from_secs(env_parse("GAMES_POLL_SECS", 60u64).max(10));
        let shooting_stale = Duration::from_secs(env_parse("SHOOTING_STALE_SECS", 300u64).max(30));
        let line_debounce =
            Duration::from_millis(env_parse("LINE_DEBOUNCE_MS", 400u64).clamp(50, 5_000));

        Self {
            source,
            base_url,
            request_timeout,
            fetch_threads,
            games_refresh,
            shooting_stale,
            line_debounce,
            auto_analyze: env_bool("AUTO_ANALYZE", defaults.auto_analyze),
            shooting_fallback: env_bool("SHOOTING_FALLBACK", defaults.shooting_fallback),
        }
    }
}

/// `.env.local` wins over `.env`; neither is required.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).ok().map(|v| parse_flag(&v)).unwrap_or(default)
}

fn parse_flag(raw: &str) -> bool {
    let t = raw.trim().to_ascii_lowercase();
    !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
}

fn parse_source(raw: &str) -> SourceKind {
    match raw.trim().to_ascii_lowercase().as_str() {
        "demo" | "fake" | "offline" => SourceKind::Demo,
        _ => SourceKind::Http,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn source_defaults_to_http() {
        assert_eq!(parse_source("Demo"), SourceKind::Demo);
        assert_eq!(parse_source("offline"), SourceKind::Demo);
        assert_eq!(parse_source(""), SourceKind::Http);
        assert_eq!(parse_source("prod"), SourceKind::Http);
    }

    #[test]
    fn defaults_match_the_service_cadence() {
        let config = Config::default();
        assert_eq!(config.games_refresh, Duration::from_secs(60));
        assert_eq!(config.shooting_stale, Duration::from_secs(300));
        assert!(!config.auto_analyze);
    }
}
