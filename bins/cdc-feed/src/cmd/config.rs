use clap::Args;
use serde::Deserialize;

use cdc_changefeed::{ConsumerOptions, validate_table};
use cdc_envelope::{EnvelopeCodec, TypeRegistry};

use super::error::AppError;

pub const DEFAULT_DATABASE_URL: &str = "postgres://root@localhost:26257/crdb_test?sslmode=disable";
pub const DEFAULT_ACCOUNT_ID: &str = "979e1cb9-5b2c-415d-9bed-58df67352e82";

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,
    pub account_id: Option<String>,
    pub table: Option<String>,
    pub load_count: Option<u64>,
    pub progress_every: Option<u64>,
    pub decode_payloads: Option<bool>,
    /// Путь к FileDescriptorSet с дополнительными типами payload.
    pub descriptor_set: Option<String>,
}

pub fn load_config(path: &str) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| AppError::Config(format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct FeedArgs {
    /// Режим работы: load | changefeed | get | clean
    #[arg(long)]
    pub mode: Option<String>,

    /// Путь к cdc-feed.toml
    #[arg(long, default_value = "cdc-feed.toml", env = "CDC_FEED_CONFIG")]
    pub config: String,

    /// Строка подключения к CockroachDB
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Аккаунт, от имени которого пишутся и читаются события
    #[arg(long, env = "CDC_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Таблица для change feed
    #[arg(long)]
    pub table: Option<String>,

    /// Сколько событий записать в режиме load
    #[arg(long)]
    pub load_count: Option<u64>,

    /// Строка прогресса каждые N записей (0 = выключить)
    #[arg(long)]
    pub progress_every: Option<u64>,

    /// Не раскодировать envelope в change feed
    #[arg(long)]
    pub raw_payloads: bool,

    /// FileDescriptorSet (protoc --descriptor_set_out) с типами payload
    #[arg(long)]
    pub descriptor_set: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: defaults < config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub database_url: String,
    pub account_id: String,
    pub table: String,
    pub load_count: u64,
    pub progress_every: u64,
    pub decode_payloads: bool,
    pub descriptor_set: Option<String>,
}

impl Effective {
    pub fn new(args: &FeedArgs) -> Result<Self, AppError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    fn merge(args: &FeedArgs, cfg: Config) -> Result<Self, AppError> {
        let eff = Self {
            database_url: args
                .database_url
                .clone()
                .or(cfg.database_url)
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            account_id: args
                .account_id
                .clone()
                .or(cfg.account_id)
                .unwrap_or_else(|| DEFAULT_ACCOUNT_ID.into()),
            table: args.table.clone().or(cfg.table).unwrap_or_else(|| "events".into()),
            load_count: args.load_count.or(cfg.load_count).unwrap_or(100),
            progress_every: args.progress_every.or(cfg.progress_every).unwrap_or(10),
            decode_payloads: !args.raw_payloads && cfg.decode_payloads.unwrap_or(true),
            descriptor_set: args.descriptor_set.clone().or(cfg.descriptor_set),
        };

        if eff.account_id.trim().is_empty() {
            return Err(AppError::Config("account_id must not be empty".into()));
        }
        validate_table(&eff.table)?;
        Ok(eff)
    }

    pub fn consumer_options(&self) -> ConsumerOptions {
        ConsumerOptions {
            table: self.table.clone(),
            progress_every: self.progress_every,
            decode_payloads: self.decode_payloads,
        }
    }

    /// Built-in payload types plus everything in `descriptor_set`.
    pub fn codec(&self) -> Result<EnvelopeCodec, AppError> {
        let mut registry = TypeRegistry::with_builtin_types();
        if let Some(path) = &self.descriptor_set {
            let bytes = std::fs::read(path)
                .map_err(|e| AppError::Config(format!("cannot read descriptor set {path}: {e}")))?;
            let added = registry.register_descriptor_set(&bytes)?;
            tracing::info!(path = %path, added, "registered descriptor set");
        }
        Ok(EnvelopeCodec::new(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> FeedArgs {
        FeedArgs {
            mode: None,
            config: "does-not-exist.toml".into(),
            database_url: None,
            account_id: None,
            table: None,
            load_count: None,
            progress_every: None,
            raw_payloads: false,
            descriptor_set: None,
        }
    }

    #[test]
    fn defaults_without_config_file() {
        let eff = Effective::new(&args()).unwrap();
        assert_eq!(eff.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(eff.account_id, DEFAULT_ACCOUNT_ID);
        assert_eq!(eff.table, "events");
        assert_eq!(eff.load_count, 100);
        assert_eq!(eff.progress_every, 10);
        assert!(eff.decode_payloads);
        assert!(eff.descriptor_set.is_none());
    }

    #[test]
    fn flags_override_file_override_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            database_url = "postgres://file"
            account_id = "from-file"
            load_count = 5
            decode_payloads = true
            "#,
        )
        .unwrap();

        let mut a = args();
        a.account_id = Some("from-flag".into());
        a.raw_payloads = true;

        let eff = Effective::merge(&a, cfg).unwrap();
        assert_eq!(eff.database_url, "postgres://file");
        assert_eq!(eff.account_id, "from-flag");
        assert_eq!(eff.load_count, 5);
        assert_eq!(eff.progress_every, 10);
        assert!(!eff.decode_payloads);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut a = args();
        a.table = Some("events; DROP TABLE events".into());
        assert!(Effective::merge(&a, Config::default()).is_err());

        let mut a = args();
        a.account_id = Some("  ".into());
        assert!(matches!(Effective::merge(&a, Config::default()), Err(AppError::Config(_))));
    }

    #[test]
    fn unknown_toml_type_is_reported() {
        assert!(toml::from_str::<Config>("load_count = \"many\"").is_err());
    }

    #[test]
    fn codec_has_builtin_types_and_reports_missing_descriptor_file() {
        let eff = Effective::merge(&args(), Config::default()).unwrap();
        assert!(eff.codec().unwrap().registry().len() >= 3);

        let mut a = args();
        a.descriptor_set = Some("does-not-exist.pb".into());
        let eff = Effective::merge(&a, Config::default()).unwrap();
        assert!(matches!(eff.codec(), Err(AppError::Config(_))));
    }
}
