//! # Targets and target loading.
//!
//! A [`Target`] is one input an experiment measures; input-less experiments
//! measure a single empty target. The [`TargetLoader`] resolves the list from the
//! explicit inputs, a backend query or an experiment's static defaults.
//!
//! ## Input policies
//! ```text
//! policy            inputs given   no inputs
//! None              rejected       [""]
//! Optional          as given       [""]
//! StrictlyRequired  as given       "no input provided"
//! OrQueryBackend    as given       backend list (or "no input provided")
//! OrStaticDefault   as given       static defaults (or "no default static input")
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;

/// How an experiment treats input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputPolicy {
    /// The experiment takes no input.
    #[default]
    None,
    /// Input is optional; without it one empty target is measured.
    Optional,
    /// At least one input is required.
    StrictlyRequired,
    /// Inputs come from the host or, failing that, from the backend.
    OrQueryBackend,
    /// Inputs come from the host or, failing that, from a static list.
    OrStaticDefault,
}

impl InputPolicy {
    /// Returns true when the experiment cannot run without non-empty input.
    #[inline]
    pub fn requires_input(&self) -> bool {
        matches!(
            self,
            InputPolicy::StrictlyRequired
                | InputPolicy::OrQueryBackend
                | InputPolicy::OrStaticDefault
        )
    }
}

/// One input measured by an experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub input: String,
}

impl Target {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// The sentinel measured by input-less experiments.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Parameters handed to [`ExperimentBuilder::new_target_loader`](crate::probe::ExperimentBuilder::new_target_loader).
#[derive(Debug, Clone, Default)]
pub struct TargetLoaderConfig {
    /// Experiment name.
    pub experiment: String,
    /// Explicit inputs from the settings.
    pub inputs: Vec<String>,
    /// The experiment's input policy.
    pub policy: InputPolicy,
}

/// # Resolves the targets of a run.
#[async_trait]
pub trait TargetLoader: Send + Sync {
    async fn load(&self, ctx: &CancellationToken) -> Result<Vec<Target>, ProbeError>;
}

/// Loader that never contacts a backend.
///
/// Applies the input policy to the explicit inputs and an optional static
/// default list. Suitable for experiments whose targets are known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticTargetLoader {
    config: TargetLoaderConfig,
    defaults: Vec<String>,
}

impl StaticTargetLoader {
    pub fn new(config: TargetLoaderConfig) -> Self {
        Self {
            config,
            defaults: Vec::new(),
        }
    }

    /// Sets the inputs used by `OrStaticDefault` when none are given.
    pub fn with_defaults(mut self, defaults: Vec<String>) -> Self {
        self.defaults = defaults;
        self
    }
}

#[async_trait]
impl TargetLoader for StaticTargetLoader {
    async fn load(&self, _ctx: &CancellationToken) -> Result<Vec<Target>, ProbeError> {
        let inputs = &self.config.inputs;
        match self.config.policy {
            InputPolicy::None if !inputs.is_empty() => Err(ProbeError::InputNotAccepted),
            InputPolicy::None => Ok(vec![Target::empty()]),
            _ if !inputs.is_empty() => Ok(inputs.iter().map(Target::new).collect()),
            InputPolicy::Optional => Ok(vec![Target::empty()]),
            InputPolicy::OrStaticDefault if !self.defaults.is_empty() => {
                Ok(self.defaults.iter().map(Target::new).collect())
            }
            InputPolicy::OrStaticDefault => Err(ProbeError::NoStaticInput),
            InputPolicy::StrictlyRequired | InputPolicy::OrQueryBackend => {
                Err(ProbeError::NoInput)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn load(policy: InputPolicy, inputs: &[&str]) -> Result<Vec<Target>, ProbeError> {
        let config = TargetLoaderConfig {
            experiment: "Example".into(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            policy,
        };
        StaticTargetLoader::new(config)
            .load(&CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_policies_without_input() {
        assert_eq!(load(InputPolicy::None, &[]).await.unwrap(), [Target::empty()]);
        assert_eq!(
            load(InputPolicy::Optional, &[]).await.unwrap(),
            [Target::empty()]
        );
        assert!(matches!(
            load(InputPolicy::StrictlyRequired, &[]).await,
            Err(ProbeError::NoInput)
        ));
        assert!(matches!(
            load(InputPolicy::OrQueryBackend, &[]).await,
            Err(ProbeError::NoInput)
        ));
        assert!(matches!(
            load(InputPolicy::OrStaticDefault, &[]).await,
            Err(ProbeError::NoStaticInput)
        ));
    }

    #[tokio::test]
    async fn test_policies_with_input() {
        assert!(matches!(
            load(InputPolicy::None, &["a"]).await,
            Err(ProbeError::InputNotAccepted)
        ));
        assert_eq!(
            load(InputPolicy::StrictlyRequired, &["a", "b"]).await.unwrap(),
            [Target::new("a"), Target::new("b")]
        );
    }

    #[tokio::test]
    async fn test_static_defaults() {
        let loader = StaticTargetLoader::new(TargetLoaderConfig {
            policy: InputPolicy::OrStaticDefault,
            ..Default::default()
        })
        .with_defaults(vec!["https://dns.google/dns-query".into()]);
        let targets = loader.load(&CancellationToken::new()).await.unwrap();
        assert_eq!(targets, [Target::new("https://dns.google/dns-query")]);
    }
}
