use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Looks up the installed version of an application package
pub trait AppVersionResolver: Send + Sync {
    /// Version code of `package_name`, or `None` when it is not installed or
    /// cannot be determined
    fn version_code(&self, package_name: &str) -> Option<String>;
}

/// Resolver backed by a fixed table, updatable to model installs, upgrades
/// and uninstalls
#[derive(Debug, Clone, Default)]
pub struct StaticVersionResolver {
    versions: Arc<RwLock<HashMap<String, String>>>,
}

impl StaticVersionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(package_name: impl Into<String>, version_code: impl Into<String>) -> Self {
        let resolver = Self::new();
        resolver.set_version(package_name, version_code);
        resolver
    }

    pub fn set_version(&self, package_name: impl Into<String>, version_code: impl Into<String>) {
        if let Ok(mut versions) = self.versions.write() {
            versions.insert(package_name.into(), version_code.into());
        }
    }

    pub fn remove(&self, package_name: &str) {
        if let Ok(mut versions) = self.versions.write() {
            versions.remove(package_name);
        }
    }
}

impl AppVersionResolver for StaticVersionResolver {
    fn version_code(&self, package_name: &str) -> Option<String> {
        self.versions
            .read()
            .ok()?
            .get(package_name)
            .filter(|v| !v.is_empty())
            .cloned()
    }
}
