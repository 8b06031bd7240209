use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// 配置文件结构
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_jlpt_dir")]
    pub jlpt_dir: PathBuf,
    #[serde(default = "default_dictionary_file")]
    pub dictionary_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 在第几次失败后先尝试简化句子，0 表示不简化
    #[serde(default = "default_simplify_on_attempt")]
    pub simplify_on_attempt: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_jlpt_dir() -> PathBuf {
    PathBuf::from("data/jlpt")
}

fn default_dictionary_file() -> PathBuf {
    PathBuf::from("data/ipadic/system.dic.zst")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_simplify_on_attempt() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            jlpt_dir: default_jlpt_dir(),
            dictionary_file: default_dictionary_file(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            simplify_on_attempt: default_simplify_on_attempt(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl GenerationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    pub fn load() -> Result<Config> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config_content = std::fs::read_to_string(path)
            .map_err(|_| anyhow::anyhow!("配置文件 {} 不存在或无法读取", path.display()))?;
        Self::parse(&config_content)
    }

    pub fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("配置文件解析失败: {}", e))?;
        Ok(config)
    }

    /// 读取失败时退回默认配置，难度数据缺失不应阻止程序启动
    pub fn load_or_default(path: impl AsRef<Path>) -> Config {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}，使用默认配置", e);
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
[data]
jlpt_dir = "/srv/jlpt"

[generation]
max_attempts = 5
"#,
        )
        .unwrap();

        assert_eq!(config.data.jlpt_dir, PathBuf::from("/srv/jlpt"));
        assert_eq!(config.data.dictionary_file, default_dictionary_file());
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.generation.simplify_on_attempt, 2);
        assert_eq!(config.generation.retry_delay(), Duration::from_millis(1000));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.generation.max_attempts, 3);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(Config::parse("[generation\nmax_attempts = ").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/graded-reader/config.toml");
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.data.jlpt_dir, PathBuf::from("data/jlpt"));
    }
}
