use std::fmt;

/// Written in place of an absent minimum version
pub const NULL_VERSION: &str = "null";

/// Written in place of a target app version that could not be resolved
pub const UNKNOWN_VERSION: &str = "UNKNOWN_VERSION";

/// Identity of one protocol negotiation
///
/// Serializes as
/// `protocol[min,max]:target_package[target_version]`, e.g.
/// `msal.broker[1.0,2.5]:com.example.broker[42]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub protocol_name: String,
    pub minimum_version: Option<String>,
    pub maximum_version: String,
    pub target_app_package_name: String,
    pub target_app_version: Option<String>,
}

impl CacheKey {
    pub fn new(
        protocol_name: impl Into<String>,
        minimum_version: Option<&str>,
        maximum_version: impl Into<String>,
        target_app_package_name: impl Into<String>,
        target_app_version: Option<&str>,
    ) -> Self {
        Self {
            protocol_name: protocol_name.into(),
            minimum_version: minimum_version.map(str::to_string),
            maximum_version: maximum_version.into(),
            target_app_package_name: target_app_package_name.into(),
            target_app_version: target_app_version.map(str::to_string),
        }
    }

    pub fn to_storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{},{}]:{}[{}]",
            self.protocol_name,
            self.minimum_version.as_deref().unwrap_or(NULL_VERSION),
            self.maximum_version,
            self.target_app_package_name,
            self.target_app_version.as_deref().unwrap_or(UNKNOWN_VERSION),
        )
    }
}

/// Every storage key starting with this belongs to `protocol_name`
pub(crate) fn scope_prefix(protocol_name: &str) -> String {
    format!("{}[", protocol_name)
}

/// Every storage key ending with this belongs to the given target app build
pub(crate) fn scope_suffix(target_app_package_name: &str, target_app_version: Option<&str>) -> String {
    format!(
        "]:{}[{}]",
        target_app_package_name,
        target_app_version.unwrap_or(UNKNOWN_VERSION)
    )
}
