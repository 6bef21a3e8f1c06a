//! 容器配置定义

use serde::{Deserialize, Serialize};

/// 容器配置
///
/// 可由应用上下文构建器从 TOML/JSON 文件与环境变量加载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否允许通过早期引用解决单例之间的循环引用
    pub allow_circular_references: bool,
    /// 早期引用与最终对象不一致时是否仍允许注入原始对象
    pub allow_raw_injection_despite_wrapping: bool,
    /// 是否允许同名 Bean 定义覆盖
    pub allow_bean_definition_overriding: bool,
    /// 按类型查找时是否允许为判断类型而提前实例化 FactoryBean
    pub allow_eager_class_loading: bool,
    /// 刷新时是否预实例化非延迟单例
    pub pre_instantiate_singletons: bool,
    /// 自动代理配置
    pub proxy: ProxyConfig,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_raw_injection_despite_wrapping: false,
            allow_bean_definition_overriding: true,
            allow_eager_class_loading: true,
            pre_instantiate_singletons: true,
            proxy: ProxyConfig::default(),
        }
    }
}

/// 自动代理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// 公共拦截器是否排在 Bean 专属通知器之前
    pub apply_common_interceptors_first: bool,
    /// 公共拦截器的 Bean 名称
    pub interceptor_names: Vec<String>,
    /// 代理创建后是否冻结通知器列表
    pub freeze_proxy: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            apply_common_interceptors_first: true,
            interceptor_names: Vec::new(),
            freeze_proxy: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ContainerConfig = serde_json::from_value(serde_json::json!({
            "allow_circular_references": false,
            "proxy": { "interceptor_names": ["auditInterceptor"] }
        }))
        .unwrap();

        assert!(!config.allow_circular_references);
        assert!(!config.allow_raw_injection_despite_wrapping);
        assert!(config.proxy.apply_common_interceptors_first);
        assert_eq!(config.proxy.interceptor_names, vec!["auditInterceptor".to_string()]);
    }
}
