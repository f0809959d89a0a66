use std::env;
use std::fmt::Display;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use toml::{Table, Value};

const ENV_PREFIX: &str = "ITINERA_";
const DEFAULT_CONFIG_FILES: [&str; 2] = ["itinera.toml", "config/itinera.toml"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

/// Limits for one planning conversation.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub max_tool_rounds: u32,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub daily_request_limit: u32,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<SecretString>,
    pub static_tokens: Vec<StaticToken>,
}

/// A fixed bearer token accepted in `static` auth mode.
#[derive(Clone, Debug)]
pub struct StaticToken {
    pub token: SecretString,
    pub user_id: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(alias = "openai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Supabase,
    Static,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Values set from code. They win over the file and the environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub auth_mode: Option<AuthMode>,
    pub auth_static_tokens: Option<Vec<String>>,
    pub max_tool_rounds: Option<u32>,
    pub daily_request_limit: Option<u32>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("config file `{path}` is invalid: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("config file references `${{{var}}}` but it is not set")]
    MissingEnvInterpolation { var: String },
    #[error("config file has a `${{` without a closing brace")]
    UnterminatedInterpolation,
    #[error("{key}=`{value}` is not a number")]
    InvalidEnvOverride { key: String, value: String },
    #[error("environment overrides are invalid: {0}")]
    InvalidEnv(#[source] toml::de::Error),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://itinera.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 60,
                max_tokens: 4096,
            },
            chat: ChatConfig {
                max_tool_rounds: 8,
                model_timeout_secs: 60,
                tool_timeout_secs: 15,
                daily_request_limit: 50,
            },
            auth: AuthConfig {
                mode: AuthMode::Supabase,
                supabase_url: None,
                supabase_anon_key: None,
                static_tokens: Vec::new(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl StaticToken {
    /// Parses `token=user_id`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.split_once('=').map(|(token, user_id)| (token.trim(), user_id.trim())) {
            Some((token, user_id)) if !token.is_empty() && !user_id.is_empty() => Ok(Self {
                token: SecretString::from(token.to_string()),
                user_id: user_id.to_string(),
            }),
            _ => Err(ConfigError::Validation(
                "auth.static_tokens entries must look like `token=user_id`".to_string(),
            )),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file, then `ITINERA_*` variables, then `overrides`.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let LoadOptions { config_path, require_file, overrides } = options;
        let mut config = Self::default();

        match find_config_file(config_path.as_deref()) {
            Some(path) => config.merge(read_file_patch(&path)?)?,
            None if require_file => {
                let expected =
                    config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.merge(env_patch()?)?;
        config.merge(overrides.into())?;
        config.validate()?;

        Ok(config)
    }

    fn merge(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        let ConfigPatch { database, llm, chat, auth, server, logging } = patch;

        if let Some(patch) = database {
            set(&mut self.database.url, patch.url);
            set(&mut self.database.max_connections, patch.max_connections);
            set(&mut self.database.timeout_secs, patch.timeout_secs);
        }
        if let Some(patch) = llm {
            set(&mut self.llm.provider, patch.provider);
            set(&mut self.llm.api_key, patch.api_key.map(|key| Some(SecretString::from(key))));
            set(&mut self.llm.base_url, patch.base_url.map(Some));
            set(&mut self.llm.model, patch.model);
            set(&mut self.llm.timeout_secs, patch.timeout_secs);
            set(&mut self.llm.max_tokens, patch.max_tokens);
        }
        if let Some(patch) = chat {
            set(&mut self.chat.max_tool_rounds, patch.max_tool_rounds);
            set(&mut self.chat.model_timeout_secs, patch.model_timeout_secs);
            set(&mut self.chat.tool_timeout_secs, patch.tool_timeout_secs);
            set(&mut self.chat.daily_request_limit, patch.daily_request_limit);
        }
        if let Some(patch) = auth {
            set(&mut self.auth.mode, patch.mode);
            set(&mut self.auth.supabase_url, patch.supabase_url.map(Some));
            set(
                &mut self.auth.supabase_anon_key,
                patch.supabase_anon_key.map(|key| Some(SecretString::from(key))),
            );
            if let Some(entries) = patch.static_tokens {
                self.auth.static_tokens = entries
                    .iter()
                    .filter(|entry| !entry.trim().is_empty())
                    .map(|entry| StaticToken::parse(entry))
                    .collect::<Result<_, _>>()?;
            }
        }
        if let Some(patch) = server {
            set(&mut self.server.bind_address, patch.bind_address);
            set(&mut self.server.port, patch.port);
            set(&mut self.server.graceful_shutdown_secs, patch.graceful_shutdown_secs);
        }
        if let Some(patch) = logging {
            set(&mut self.logging.level, patch.level);
            set(&mut self.logging.format, patch.format);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self { database, llm, chat, auth, server, logging } = self;

        let url = database.url.trim();
        require(
            url.starts_with("sqlite:") || url == ":memory:",
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::memory:` or `:memory:`)",
        )?;
        require(database.max_connections > 0, "database.max_connections must be greater than zero")?;
        within("database.timeout_secs", database.timeout_secs, 1..=300)?;

        within("llm.timeout_secs", llm.timeout_secs, 1..=300)?;
        require(!llm.model.trim().is_empty(), "llm.model must not be empty")?;
        require(llm.max_tokens > 0, "llm.max_tokens must be greater than zero")?;
        match llm.provider {
            LlmProvider::OpenAi => require(
                !blank_secret(llm.api_key.as_ref()),
                "llm.api_key is required for the openai provider",
            )?,
            LlmProvider::Ollama => require(
                !llm.base_url.as_deref().map_or(true, |url| url.trim().is_empty()),
                "llm.base_url is required for the ollama provider",
            )?,
        }

        within("chat.max_tool_rounds", chat.max_tool_rounds, 1..=32)?;
        within("chat.model_timeout_secs", chat.model_timeout_secs, 1..=300)?;
        within("chat.tool_timeout_secs", chat.tool_timeout_secs, 1..=120)?;

        match auth.mode {
            AuthMode::Supabase => {
                let url = auth.supabase_url.as_deref().map(str::trim).unwrap_or_default();
                require(!url.is_empty(), "auth.supabase_url is required for supabase auth mode")?;
                require(
                    url.starts_with("http://") || url.starts_with("https://"),
                    "auth.supabase_url must start with http:// or https://",
                )?;
                require(
                    !blank_secret(auth.supabase_anon_key.as_ref()),
                    "auth.supabase_anon_key is required for supabase auth mode",
                )?;
            }
            AuthMode::Static => require(
                !auth.static_tokens.is_empty(),
                "auth.static_tokens needs at least one `token=user_id` entry in static mode",
            )?,
        }

        require(server.port > 0, "server.port must be greater than zero")?;
        require(
            server.graceful_shutdown_secs > 0,
            "server.graceful_shutdown_secs must be greater than zero",
        )?;

        let level = logging.level.trim().to_ascii_lowercase();
        require(
            LOG_LEVELS.contains(&level.as_str()),
            "logging.level must be one of trace|debug|info|warn|error",
        )
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn require(holds: bool, message: &str) -> Result<(), ConfigError> {
    if holds {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

fn within<T: PartialOrd + Display>(
    name: &str,
    value: T,
    range: RangeInclusive<T>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Validation(format!(
        "{name} must be in range {}..={}",
        range.start(),
        range.end()
    )))
}

fn blank_secret(secret: Option<&SecretString>) -> bool {
    secret.map_or(true, |secret| secret.expose_secret().trim().is_empty())
}

fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.is_file().then(|| path.to_path_buf()),
        None => DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.is_file()),
    }
}

fn read_file_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&interpolate(&raw)?)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${VAR}` with the value of `VAR`.
fn interpolate(raw: &str) -> Result<String, ConfigError> {
    let mut rendered = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &tail[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        rendered.push_str(&value);
        rest = &tail[end + 1..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

#[derive(Clone, Copy)]
enum EnvKind {
    Text,
    Keyword,
    Number,
    List,
}

/// Variable suffix, section, key. When two entries set the same key the later one wins.
const ENV_KEYS: &[(&str, &str, &str, EnvKind)] = &[
    ("DATABASE_URL", "database", "url", EnvKind::Text),
    ("DATABASE_MAX_CONNECTIONS", "database", "max_connections", EnvKind::Number),
    ("DATABASE_TIMEOUT_SECS", "database", "timeout_secs", EnvKind::Number),
    ("LLM_PROVIDER", "llm", "provider", EnvKind::Keyword),
    ("LLM_API_KEY", "llm", "api_key", EnvKind::Text),
    ("LLM_BASE_URL", "llm", "base_url", EnvKind::Text),
    ("LLM_MODEL", "llm", "model", EnvKind::Text),
    ("LLM_TIMEOUT_SECS", "llm", "timeout_secs", EnvKind::Number),
    ("LLM_MAX_TOKENS", "llm", "max_tokens", EnvKind::Number),
    ("CHAT_MAX_TOOL_ROUNDS", "chat", "max_tool_rounds", EnvKind::Number),
    ("CHAT_MODEL_TIMEOUT_SECS", "chat", "model_timeout_secs", EnvKind::Number),
    ("CHAT_TOOL_TIMEOUT_SECS", "chat", "tool_timeout_secs", EnvKind::Number),
    ("CHAT_DAILY_REQUEST_LIMIT", "chat", "daily_request_limit", EnvKind::Number),
    ("AUTH_MODE", "auth", "mode", EnvKind::Keyword),
    ("AUTH_SUPABASE_URL", "auth", "supabase_url", EnvKind::Text),
    ("AUTH_SUPABASE_ANON_KEY", "auth", "supabase_anon_key", EnvKind::Text),
    ("AUTH_STATIC_TOKENS", "auth", "static_tokens", EnvKind::List),
    ("SERVER_BIND_ADDRESS", "server", "bind_address", EnvKind::Text),
    ("SERVER_PORT", "server", "port", EnvKind::Number),
    ("SERVER_GRACEFUL_SHUTDOWN_SECS", "server", "graceful_shutdown_secs", EnvKind::Number),
    ("LOG_LEVEL", "logging", "level", EnvKind::Keyword),
    ("LOG_FORMAT", "logging", "format", EnvKind::Keyword),
    ("LOGGING_LEVEL", "logging", "level", EnvKind::Keyword),
    ("LOGGING_FORMAT", "logging", "format", EnvKind::Keyword),
];

impl EnvKind {
    fn to_toml(self, var: &str, raw: String) -> Result<Value, ConfigError> {
        let value = match self {
            Self::Text => Value::String(raw),
            Self::Keyword => Value::String(raw.trim().to_ascii_lowercase()),
            Self::Number => {
                let parsed = raw.trim().parse::<i64>();
                match parsed {
                    Ok(number) => Value::Integer(number),
                    Err(_) => {
                        return Err(ConfigError::InvalidEnvOverride {
                            key: var.to_string(),
                            value: raw,
                        })
                    }
                }
            }
            Self::List => Value::Array(
                raw.split(',').map(|entry| Value::String(entry.trim().to_string())).collect(),
            ),
        };
        Ok(value)
    }
}

/// Collects the set `ITINERA_*` variables into the same shape as the config file.
fn env_patch() -> Result<ConfigPatch, ConfigError> {
    let mut root = Table::new();

    for &(suffix, section, key, kind) in ENV_KEYS {
        let var = format!("{ENV_PREFIX}{suffix}");
        let Some(raw) = env::var(&var).ok().filter(|value| !value.trim().is_empty()) else {
            continue;
        };
        let value = kind.to_toml(&var, raw)?;
        if let Value::Table(table) =
            root.entry(section.to_string()).or_insert(Value::Table(Table::new()))
        {
            table.insert(key.to_string(), value);
        }
    }

    Value::Table(root).try_into().map_err(ConfigError::InvalidEnv)
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    chat: Option<ChatPatch>,
    auth: Option<AuthPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    max_tool_rounds: Option<u32>,
    model_timeout_secs: Option<u64>,
    tool_timeout_secs: Option<u64>,
    daily_request_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    mode: Option<AuthMode>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    static_tokens: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl From<ConfigOverrides> for ConfigPatch {
    fn from(overrides: ConfigOverrides) -> Self {
        Self {
            database: Some(DatabasePatch { url: overrides.database_url, ..DatabasePatch::default() }),
            llm: Some(LlmPatch {
                provider: overrides.llm_provider,
                api_key: overrides.llm_api_key,
                model: overrides.llm_model,
                ..LlmPatch::default()
            }),
            chat: Some(ChatPatch {
                max_tool_rounds: overrides.max_tool_rounds,
                daily_request_limit: overrides.daily_request_limit,
                ..ChatPatch::default()
            }),
            auth: Some(AuthPatch {
                mode: overrides.auth_mode,
                static_tokens: overrides.auth_static_tokens,
                ..AuthPatch::default()
            }),
            server: Some(ServerPatch { port: overrides.server_port, ..ServerPatch::default() }),
            logging: Some(LoggingPatch { level: overrides.log_level, ..LoggingPatch::default() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        interpolate, AppConfig, AuthMode, ConfigError, ConfigOverrides, LlmProvider, LoadOptions,
        LogFormat,
    };

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets variables for one test and removes them on drop.
    struct ScopedEnv {
        _lock: MutexGuard<'static, ()>,
        vars: Vec<&'static str>,
    }

    impl ScopedEnv {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            for (var, value) in vars {
                env::set_var(var, value);
            }
            Self { _lock: lock, vars: vars.iter().map(|(var, _)| *var).collect() }
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            for var in &self.vars {
                env::remove_var(var);
            }
        }
    }

    fn static_auth() -> ConfigOverrides {
        ConfigOverrides {
            auth_mode: Some(AuthMode::Static),
            auth_static_tokens: Some(vec!["dev-token=user-1".to_string()]),
            ..ConfigOverrides::default()
        }
    }

    fn load_with(overrides: ConfigOverrides) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() })
    }

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("itinera.toml");
        fs::write(&path, contents).expect("write config file");
        path
    }

    fn validation_message(result: Result<AppConfig, ConfigError>) -> String {
        match result {
            Err(ConfigError::Validation(message)) => message,
            Err(other) => panic!("expected a validation error, got {other}"),
            Ok(_) => panic!("expected a validation error, config loaded"),
        }
    }

    #[test]
    fn file_values_interpolate_environment_variables() {
        let _env = ScopedEnv::set(&[("TEST_SUPABASE_ANON_KEY", "anon-from-env")]);
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r#"
[auth]
mode = "supabase"
supabase_url = "https://project.supabase.co"
supabase_anon_key = "${TEST_SUPABASE_ANON_KEY}"
"#,
        );

        let config = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            .expect("config loads");

        assert_eq!(config.auth.mode, AuthMode::Supabase);
        assert_eq!(
            config.auth.supabase_anon_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("anon-from-env".to_string())
        );
    }

    #[test]
    fn layers_apply_file_then_env_then_overrides() {
        let _env = ScopedEnv::set(&[
            ("ITINERA_DATABASE_URL", "sqlite://from-env.db"),
            ("ITINERA_CHAT_MAX_TOOL_ROUNDS", "4"),
        ]);
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r#"
[database]
url = "sqlite://from-file.db"

[chat]
max_tool_rounds = 6
daily_request_limit = 20

[auth]
mode = "static"
static_tokens = ["file-token=user-file"]

[logging]
level = "warn"
"#,
        );

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                database_url: Some("sqlite://from-override.db".to_string()),
                log_level: Some("debug".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config loads");

        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.chat.max_tool_rounds, 4);
        assert_eq!(config.chat.daily_request_limit, 20);
        assert_eq!(config.auth.static_tokens.len(), 1);
        assert_eq!(config.auth.static_tokens[0].user_id, "user-file");
    }

    #[test]
    fn log_aliases_are_read_and_keywords_normalized() {
        let _env = ScopedEnv::set(&[("ITINERA_LOG_LEVEL", "WARN"), ("ITINERA_LOG_FORMAT", "Json")]);

        let config = load_with(static_auth()).expect("config loads");

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn full_logging_names_win_over_aliases() {
        let _env =
            ScopedEnv::set(&[("ITINERA_LOG_LEVEL", "warn"), ("ITINERA_LOGGING_LEVEL", "trace")]);

        let config = load_with(static_auth()).expect("config loads");

        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn non_numeric_env_value_names_the_variable() {
        let _env = ScopedEnv::set(&[("ITINERA_SERVER_PORT", "eighty")]);

        match load_with(static_auth()) {
            Err(ConfigError::InvalidEnvOverride { key, value }) => {
                assert_eq!(key, "ITINERA_SERVER_PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn env_static_tokens_are_comma_separated() {
        let _env = ScopedEnv::set(&[
            ("ITINERA_AUTH_MODE", "static"),
            ("ITINERA_AUTH_STATIC_TOKENS", "a=user-a, b=user-b,"),
        ]);

        let config = load_with(ConfigOverrides::default()).expect("config loads");

        let users: Vec<&str> =
            config.auth.static_tokens.iter().map(|token| token.user_id.as_str()).collect();
        assert_eq!(users, ["user-a", "user-b"]);
    }

    #[test]
    fn openai_from_env_keeps_its_key_out_of_debug_output() {
        let _env = ScopedEnv::set(&[
            ("ITINERA_LLM_PROVIDER", "openai"),
            ("ITINERA_LLM_API_KEY", "sk-secret-value"),
        ]);

        let config = load_with(ConfigOverrides {
            auth_static_tokens: Some(vec!["tok-secret-value=user-1".to_string()]),
            ..static_auth()
        })
        .expect("config loads");
        let debug = format!("{config:?}");

        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert!(!debug.contains("sk-secret-value"));
        assert!(!debug.contains("tok-secret-value"));
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn supabase_mode_requires_its_url() {
        let _env = ScopedEnv::set(&[]);
        let message = validation_message(AppConfig::load(LoadOptions::default()));
        assert!(message.contains("auth.supabase_url"), "{message}");
    }

    #[test]
    fn openai_provider_requires_api_key() {
        let _env = ScopedEnv::set(&[]);
        let message = validation_message(load_with(ConfigOverrides {
            llm_provider: Some(LlmProvider::OpenAi),
            ..static_auth()
        }));
        assert!(message.contains("llm.api_key"), "{message}");
    }

    #[test]
    fn tool_round_cap_is_bounded() {
        let _env = ScopedEnv::set(&[]);
        for rounds in [0, 33] {
            let message = validation_message(load_with(ConfigOverrides {
                max_tool_rounds: Some(rounds),
                ..static_auth()
            }));
            assert_eq!(message, "chat.max_tool_rounds must be in range 1..=32");
        }
    }

    #[test]
    fn malformed_static_token_is_rejected() {
        let _env = ScopedEnv::set(&[]);
        let message = validation_message(load_with(ConfigOverrides {
            auth_static_tokens: Some(vec!["missing-separator".to_string()]),
            ..static_auth()
        }));
        assert!(message.contains("token=user_id"), "{message}");
    }

    #[test]
    fn required_file_must_exist() {
        let _env = ScopedEnv::set(&[]);
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("absent.toml");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            overrides: static_auth(),
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(path)) if path == missing));
    }

    #[test]
    fn interpolation_reports_unset_and_unterminated_references() {
        let _env = ScopedEnv::set(&[("ITINERA_TEST_HOST", "example.org")]);

        assert_eq!(
            interpolate("url = \"https://${ITINERA_TEST_HOST}/v1\"").expect("interpolated"),
            "url = \"https://example.org/v1\""
        );
        assert!(matches!(
            interpolate("key = \"${ITINERA_TEST_UNSET_VAR}\""),
            Err(ConfigError::MissingEnvInterpolation { var }) if var == "ITINERA_TEST_UNSET_VAR"
        ));
        assert!(matches!(
            interpolate("key = \"${ITINERA_TEST_HOST\""),
            Err(ConfigError::UnterminatedInterpolation)
        ));
    }
}
