use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::AllowList;
use crate::ControllerPolicy;
use crate::Error;
use crate::Result;
use crate::WILDCARD;

/// Operator allow-lists. Every list defaults to the wildcard sentinel (`""`).
///
/// `event_types` and `involved_object_namespaces` partition the subscriptions
/// (one watch per combination); the other two are checked per event.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_wildcard")]
    pub event_types: Vec<String>,

    #[serde(default = "default_wildcard")]
    pub involved_object_api_groups: Vec<String>,

    #[serde(default = "default_wildcard")]
    pub involved_object_namespaces: Vec<String>,

    #[serde(default = "default_wildcard")]
    pub reporting_controllers: Vec<String>,

    /// What happens to events from controllers outside `reporting_controllers`
    #[serde(default)]
    pub controller_policy: ControllerPolicy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            event_types: default_wildcard(),
            involved_object_api_groups: default_wildcard(),
            involved_object_namespaces: default_wildcard(),
            reporting_controllers: default_wildcard(),
            controller_policy: ControllerPolicy::default(),
        }
    }
}

impl FilterConfig {
    pub fn event_types(&self) -> AllowList {
        AllowList::from_values(&self.event_types)
    }

    pub fn api_groups(&self) -> AllowList {
        AllowList::from_values(&self.involved_object_api_groups)
    }

    pub fn namespaces(&self) -> AllowList {
        AllowList::from_values(&self.involved_object_namespaces)
    }

    pub fn controllers(&self) -> AllowList {
        AllowList::from_values(&self.reporting_controllers)
    }

    /// Namespaces and event types end up inside field selectors, so they
    /// cannot carry selector syntax.
    pub fn validate(&self) -> Result<()> {
        for (name, values) in [
            ("event_types", &self.event_types),
            ("involved_object_namespaces", &self.involved_object_namespaces),
        ] {
            if let Some(bad) = values.iter().find(|v| v.contains([',', '=', '!'])) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "filter.{name} value {bad:?} must not contain ',', '=' or '!'"
                ))));
            }
        }
        Ok(())
    }
}

fn default_wildcard() -> Vec<String> {
    vec![WILDCARD.to_string()]
}
