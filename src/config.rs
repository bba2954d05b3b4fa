use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

use crate::tarot::MAJOR_ARCANA;

/// 設定ファイルのデフォルトパス（TAIROT_CONFIGで上書き可能）
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingEnv(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            cors: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TarotConfig {
    pub card_count: usize,
    pub min_request_interval_secs: u64,
}

impl Default for TarotConfig {
    fn default() -> Self {
        Self {
            card_count: 3,
            min_request_interval_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GptConfig {
    pub model: String,
    pub max_tokens: i64,
    pub temperature: f64,
    /// 秒
    pub timeout: u64,
    pub endpoint: String,
}

impl Default for GptConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            max_tokens: 150,
            temperature: 0.8,
            timeout: 30,
            endpoint: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeynarConfig {
    pub endpoint: String,
}

impl Default for NeynarConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.neynar.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tarot: TarotConfig,
    pub gpt: GptConfig,
    pub neynar: NeynarConfig,
}

impl AppConfig {
    /// config.ymlを読み込み、環境変数で上書きする（ファイルがなければデフォルト値）
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("TAIROT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_path(&path)?
        } else {
            tracing::info!("[Config] {} not found, using defaults", path);
            Self::default()
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: AppConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// 環境変数による上書き（現状はPORTのみ）
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = non_empty(lookup("PORT")) {
            self.server.port = port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.tarot.card_count;
        if count == 0 || count > MAJOR_ARCANA.len() {
            return Err(ConfigError::Invalid {
                key: "tarot.card_count",
                reason: format!("must be between 1 and {}, got {}", MAJOR_ARCANA.len(), count),
            });
        }
        if self.gpt.max_tokens <= 0 {
            return Err(ConfigError::Invalid {
                key: "gpt.max_tokens",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// 環境変数から読み込む秘匿情報とBotの識別子
#[derive(Clone)]
pub struct Secrets {
    pub openai_api_key: String,
    pub neynar_api_key: Option<String>,
    pub signer_uuid: Option<String>,
    pub bot_fid: String,
    pub webhook_secret: Option<String>,
}

// APIキーをログに出さない
impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("bot_fid", &self.bot_fid)
            .field("neynar_configured", &self.neynar_api_key.is_some())
            .field("signer_configured", &self.signer_uuid.is_some())
            .field("webhook_secret_configured", &self.webhook_secret.is_some())
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key =
            non_empty(lookup("OPENAI_API_KEY")).ok_or(ConfigError::MissingEnv("OPENAI_API_KEY"))?;
        let bot_fid = non_empty(lookup("BOT_FID")).ok_or(ConfigError::MissingEnv("BOT_FID"))?;

        Ok(Self {
            openai_api_key,
            neynar_api_key: non_empty(lookup("NEYNAR_API_KEY")),
            signer_uuid: non_empty(lookup("SIGNER_UUID")),
            bot_fid,
            webhook_secret: non_empty(lookup("WEBHOOK_SECRET")),
        })
    }

    /// 返信投稿に必要な認証情報が揃っている場合のみ返す
    pub fn neynar_credentials(&self) -> Option<(&str, &str)> {
        match (&self.neynar_api_key, &self.signer_uuid) {
            (Some(key), Some(signer)) => Some((key.as_str(), signer.as_str())),
            _ => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = AppConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.server.port, 3001);
        assert!(!config.server.cors);
        assert_eq!(config.tarot.card_count, 3);
        assert_eq!(config.tarot.min_request_interval_secs, 20);
        assert_eq!(config.gpt.model, "gpt-4");
        assert_eq!(config.gpt.max_tokens, 150);
        assert_eq!(config.neynar.endpoint, "https://api.neynar.com");
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "server:\n  cors: true\ngpt:\n  model: gpt-4o-mini\n  temperature: 0.5\n";
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert!(config.server.cors);
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.gpt.model, "gpt-4o-mini");
        assert_eq!(config.gpt.temperature, 0.5);
        assert_eq!(config.gpt.max_tokens, 150);
    }

    #[test]
    fn card_count_out_of_range_is_rejected() {
        let err = AppConfig::from_yaml_str("tarot:\n  card_count: 23\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "tarot.card_count", .. }));

        let err = AppConfig::from_yaml_str("tarot:\n  card_count: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "tarot.card_count", .. }));
    }

    #[test]
    fn port_env_overrides_file() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(lookup_from(&[("PORT", "8080")]))
            .unwrap();
        assert_eq!(config.server.port, 8080);

        let err = config
            .apply_env_overrides(lookup_from(&[("PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn secrets_require_openai_key_and_fid() {
        let err = Secrets::from_lookup(lookup_from(&[("BOT_FID", "123")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("OPENAI_API_KEY")));

        let err = Secrets::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk"), ("BOT_FID", "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("BOT_FID")));
    }

    #[test]
    fn neynar_credentials_need_both_values() {
        let secrets = Secrets::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk"),
            ("BOT_FID", "123"),
            ("NEYNAR_API_KEY", "nk"),
        ]))
        .unwrap();
        assert!(secrets.neynar_credentials().is_none());
        assert!(secrets.webhook_secret.is_none());

        let secrets = Secrets::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk"),
            ("BOT_FID", "123"),
            ("NEYNAR_API_KEY", "nk"),
            ("SIGNER_UUID", "signer"),
            ("WEBHOOK_SECRET", "hush"),
        ]))
        .unwrap();
        assert_eq!(secrets.neynar_credentials(), Some(("nk", "signer")));
        assert_eq!(secrets.webhook_secret.as_deref(), Some("hush"));
    }
}
