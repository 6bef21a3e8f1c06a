//! 容器配置源
//!
//! 基于 `config` crate 从 TOML/JSON 文件与环境变量加载 [`ContainerConfig`]，
//! 后添加的配置源覆盖先添加的配置源。

use config::{Config, Environment, File, FileFormat};
use infrastructure_common::{ConfigError, ConfigResult, ContainerConfig};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "LORN_IOC";

/// 环境变量中嵌套键的分隔符，例如 `LORN_IOC_PROXY__FREEZE_PROXY`
pub const ENV_NESTED_SEPARATOR: &str = "__";

/// 配置源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// TOML 文件
    Toml { path: PathBuf, required: bool },
    /// JSON 文件
    Json { path: PathBuf, required: bool },
    /// 环境变量
    ///
    /// `variables` 为 `None` 时读取进程环境
    Environment {
        prefix: String,
        variables: Option<HashMap<String, String>>,
    },
}

impl ConfigSource {
    /// 配置源的简短描述
    pub fn describe(&self) -> String {
        match self {
            Self::Toml { path, .. } => format!("toml:{}", path.display()),
            Self::Json { path, .. } => format!("json:{}", path.display()),
            Self::Environment { prefix, .. } => format!("env:{}_*", prefix),
        }
    }
}

/// 容器配置加载器
#[derive(Debug, Clone, Default)]
pub struct ContainerConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ContainerConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加必需的 TOML 文件，文件不存在时立即报错
    pub fn add_toml_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        let path = existing_file(path.as_ref())?;
        Ok(self.push(ConfigSource::Toml { path, required: true }))
    }

    /// 添加可选的 TOML 文件
    pub fn add_optional_toml_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.push(ConfigSource::Toml {
            path: path.as_ref().to_path_buf(),
            required: false,
        })
    }

    /// 添加必需的 JSON 文件，文件不存在时立即报错
    pub fn add_json_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        let path = existing_file(path.as_ref())?;
        Ok(self.push(ConfigSource::Json { path, required: true }))
    }

    /// 添加可选的 JSON 文件
    pub fn add_optional_json_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.push(ConfigSource::Json {
            path: path.as_ref().to_path_buf(),
            required: false,
        })
    }

    /// 添加进程环境变量
    pub fn add_environment(self, prefix: impl Into<String>) -> Self {
        self.push(ConfigSource::Environment {
            prefix: prefix.into(),
            variables: None,
        })
    }

    /// 添加一组显式给定的环境变量
    pub fn add_environment_variables(self, prefix: impl Into<String>, variables: HashMap<String, String>) -> Self {
        self.push(ConfigSource::Environment {
            prefix: prefix.into(),
            variables: Some(variables),
        })
    }

    fn push(mut self, source: ConfigSource) -> Self {
        debug!("添加配置源: {}", source.describe());
        self.sources.push(source);
        self
    }

    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 合并全部配置源并反序列化为容器配置
    pub fn load(&self) -> ConfigResult<ContainerConfig> {
        let mut builder = Config::builder();
        for source in &self.sources {
            builder = match source {
                ConfigSource::Toml { path, required } => {
                    builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(*required))
                }
                ConfigSource::Json { path, required } => {
                    builder.add_source(File::from(path.as_path()).format(FileFormat::Json).required(*required))
                }
                ConfigSource::Environment { prefix, variables } => {
                    let environment = Environment::with_prefix(prefix)
                        .prefix_separator("_")
                        .separator(ENV_NESTED_SEPARATOR)
                        .try_parsing(true)
                        .list_separator(",")
                        .with_list_parse_key("proxy.interceptor_names");
                    let environment = match variables {
                        Some(variables) => environment.source(Some(variables.clone().into_iter().collect())),
                        None => environment,
                    };
                    builder.add_source(environment)
                }
            };
        }

        let settings = builder
            .build()
            .map_err(|e| ConfigError::ParseError { source: Box::new(e) })?;
        let config: ContainerConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError { source: Box::new(e) })?;
        validate(&config)?;

        info!("容器配置加载完成, 配置源数量: {}", self.sources.len());
        Ok(config)
    }
}

/// 校验容器配置
pub fn validate(config: &ContainerConfig) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in &config.proxy.interceptor_names {
        if name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "proxy.interceptor_names 不能包含空名称".to_string(),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!("公共拦截器重复声明: {}", name),
            });
        }
    }
    Ok(())
}

fn existing_file(path: &Path) -> ConfigResult<PathBuf> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_loader_yields_defaults() {
        let config = ContainerConfigLoader::new().load().unwrap();
        assert_eq!(config, ContainerConfig::default());
    }

    #[test]
    fn test_later_sources_override_earlier() {
        let toml = temp_file(
            ".toml",
            r#"
allow_circular_references = false
pre_instantiate_singletons = false

[proxy]
interceptor_names = ["auditInterceptor"]
"#,
        );
        let json = temp_file(".json", r#"{ "pre_instantiate_singletons": true }"#);

        let config = ContainerConfigLoader::new()
            .add_toml_file(toml.path())
            .unwrap()
            .add_json_file(json.path())
            .unwrap()
            .load()
            .unwrap();

        assert!(!config.allow_circular_references);
        assert!(config.pre_instantiate_singletons);
        assert_eq!(config.proxy.interceptor_names, vec!["auditInterceptor".to_string()]);
        assert!(config.proxy.freeze_proxy);
    }

    #[test]
    fn test_environment_variables_with_nested_keys() {
        let variables = HashMap::from([
            ("LORN_IOC_ALLOW_BEAN_DEFINITION_OVERRIDING".to_string(), "false".to_string()),
            ("LORN_IOC_PROXY__FREEZE_PROXY".to_string(), "false".to_string()),
            (
                "LORN_IOC_PROXY__INTERCEPTOR_NAMES".to_string(),
                "timing,audit".to_string(),
            ),
            ("OTHER_ALLOW_CIRCULAR_REFERENCES".to_string(), "false".to_string()),
        ]);

        let config = ContainerConfigLoader::new()
            .add_environment_variables(DEFAULT_ENV_PREFIX, variables)
            .load()
            .unwrap();

        assert!(!config.allow_bean_definition_overriding);
        assert!(config.allow_circular_references);
        assert!(!config.proxy.freeze_proxy);
        assert_eq!(
            config.proxy.interceptor_names,
            vec!["timing".to_string(), "audit".to_string()]
        );
    }

    #[test]
    fn test_missing_files() {
        let err = ContainerConfigLoader::new()
            .add_toml_file("/definitely/not/here.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));

        let config = ContainerConfigLoader::new()
            .add_optional_json_file("/definitely/not/here.json")
            .load()
            .unwrap();
        assert_eq!(config, ContainerConfig::default());
    }

    #[test]
    fn test_malformed_and_invalid_config() {
        let broken = temp_file(".toml", "allow_circular_references = [");
        let err = ContainerConfigLoader::new()
            .add_toml_file(broken.path())
            .unwrap()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let duplicated = temp_file(".json", r#"{ "proxy": { "interceptor_names": ["a", "a"] } }"#);
        let err = ContainerConfigLoader::new()
            .add_json_file(duplicated.path())
            .unwrap()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
