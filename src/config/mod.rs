use dashmap::DashMap;
use std::env;
use std::sync::Arc;

use crate::error::BuildError;

pub const BASE_NAMESPACE_KEY: &str = "TRELLIS_BASE_NAMESPACE";
pub const BASE_PATH_KEY: &str = "TRELLIS_BASE_PATH";
pub const UNAUTHENTICATED_VIEW_KEY: &str = "TRELLIS_UNAUTHENTICATED_VIEW";

pub const DEFAULT_UNAUTHENTICATED_VIEW: &str = "not-authenticated.jsp";

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Seeds the service from the process environment.
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    fn require(&self, key: &str) -> Result<String, BuildError> {
        self.get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| BuildError::MissingConfig {
                key: key.to_string(),
            })
    }
}

/// Settings the hosting environment supplies before the first request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkConfig {
    base_namespace: String,
    base_path: String,
    unauthenticated_view: String,
}

impl FrameworkConfig {
    pub fn new(
        base_namespace: impl Into<String>,
        base_path: impl Into<String>,
    ) -> Result<Self, BuildError> {
        let service = ConfigService::default();
        service.set(BASE_NAMESPACE_KEY, &base_namespace.into());
        service.set(BASE_PATH_KEY, &base_path.into());
        Self::from_service(&service)
    }

    pub fn from_service(config: &ConfigService) -> Result<Self, BuildError> {
        Ok(Self {
            base_namespace: config.require(BASE_NAMESPACE_KEY)?,
            base_path: config.require(BASE_PATH_KEY)?,
            unauthenticated_view: config
                .get(UNAUTHENTICATED_VIEW_KEY)
                .filter(|view| !view.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_UNAUTHENTICATED_VIEW.to_string()),
        })
    }

    pub fn from_env() -> Result<Self, BuildError> {
        Self::from_service(&ConfigService::new())
    }

    pub fn with_unauthenticated_view(mut self, view: impl Into<String>) -> Self {
        self.unauthenticated_view = view.into();
        self
    }

    pub fn base_namespace(&self) -> &str {
        &self.base_namespace
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn unauthenticated_view(&self) -> &str {
        &self.unauthenticated_view
    }

    /// Strips the deployment base path (and any query string) from a request
    /// URI. Returns `None` when the URI lies outside the deployment.
    pub fn normalize(&self, uri: &str) -> Option<String> {
        let path = uri.split(['?', '#']).next().unwrap_or_default();
        let base = self.base_path.trim_matches('/');

        if base.is_empty() {
            return Some(if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            });
        }

        let prefix = format!("/{base}");
        if path == prefix || path == format!("{prefix}/") {
            return Some("/".to_string());
        }
        path.strip_prefix(&format!("{prefix}/"))
            .map(|rest| format!("/{rest}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values_are_fatal() {
        let err = FrameworkConfig::new("", "/shop").unwrap_err();
        assert!(matches!(err, BuildError::MissingConfig { ref key } if key == BASE_NAMESPACE_KEY));

        let err = FrameworkConfig::new("app::controllers", "   ").unwrap_err();
        assert!(matches!(err, BuildError::MissingConfig { ref key } if key == BASE_PATH_KEY));
    }

    #[test]
    fn test_from_service_defaults_view() {
        let service = ConfigService::default();
        service.set(BASE_NAMESPACE_KEY, "app::controllers");
        service.set(BASE_PATH_KEY, "shop");
        let config = FrameworkConfig::from_service(&service).unwrap();
        assert_eq!(config.unauthenticated_view(), DEFAULT_UNAUTHENTICATED_VIEW);

        service.set(UNAUTHENTICATED_VIEW_KEY, "login.html");
        let config = FrameworkConfig::from_service(&service).unwrap();
        assert_eq!(config.unauthenticated_view(), "login.html");
    }

    #[test]
    fn test_normalize_relative_to_base_path() {
        let config = FrameworkConfig::new("app", "/shop").unwrap();
        assert_eq!(config.normalize("/shop/signup").as_deref(), Some("/signup"));
        assert_eq!(
            config.normalize("/shop/users/list?page=2").as_deref(),
            Some("/users/list")
        );
        assert_eq!(config.normalize("/shop").as_deref(), Some("/"));
        assert_eq!(config.normalize("/other/signup"), None);
        assert_eq!(config.normalize("/shopping/signup"), None);
    }

    #[test]
    fn test_normalize_root_deployment() {
        let config = FrameworkConfig::new("app", "/").unwrap();
        assert_eq!(config.normalize("/signup").as_deref(), Some("/signup"));
    }
}
