//! Engine configuration: timeouts, budgets and the named locator book.
//!
//! Every field has a default, so a YAML file only needs the values it
//! overrides:
//!
//! ```yaml
//! popup_grace_ms: 4000
//! interpolation_steps: 20
//! locators:
//!   drag_source: "text=Drag Me >> nth=0"
//!   drop_target: "css=#droppable"
//!   drop_status: 'role=heading[name="Dropped!"]'
//! ```

use crate::locator::Locator;
use crate::result::{TenazError, TenazResult};
use crate::wait::LoadFallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Timeouts and budgets for the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Post-condition check after a mechanically successful strategy
    pub verification_timeout_ms: u64,
    /// Direct post-condition check once every strategy is exhausted
    pub final_verification_timeout_ms: u64,
    /// Polling interval for verification
    pub poll_interval_ms: u64,
    /// Native drag attempt
    pub native_drag_timeout_ms: u64,
    /// Discrete pointer sequence attempt
    pub pointer_sequence_timeout_ms: u64,
    /// Coordinate interpolation attempt
    pub interpolation_timeout_ms: u64,
    /// Interpolated pointer moves between source and target centers
    pub interpolation_steps: u32,
    /// Pause after hovering the drag source
    pub hover_settle_ms: u64,
    /// How long a click may take to open a new document
    pub popup_grace_ms: u64,
    /// Network-idle wait on a new document
    pub popup_network_idle_ms: u64,
    /// Basic load wait once network-idle was not reached
    pub popup_load_ms: u64,
    /// URL assertion on a new document
    pub url_timeout_ms: u64,
    /// URL change assertion on same-document navigation
    pub same_document_timeout_ms: u64,
    /// Open-and-verify attempt as a whole
    pub open_and_verify_timeout_ms: u64,
    /// Each form-fill attempt
    pub form_fill_timeout_ms: u64,
    /// Intent deadline when the intent sets none
    pub intent_deadline_ms: u64,
    /// Per-test-case deadline of a scenario
    pub scenario_deadline_ms: u64,
    /// Strategies are skipped when less time than this remains
    pub min_viable_ms: u64,
    /// Named locators, e.g. `drop_target: "css=#droppable"`
    pub locators: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verification_timeout_ms: 5_000,
            final_verification_timeout_ms: 1_000,
            poll_interval_ms: 100,
            native_drag_timeout_ms: 10_000,
            pointer_sequence_timeout_ms: 5_000,
            interpolation_timeout_ms: 5_000,
            interpolation_steps: 10,
            hover_settle_ms: 100,
            popup_grace_ms: 2_500,
            popup_network_idle_ms: 20_000,
            popup_load_ms: 10_000,
            url_timeout_ms: 5_000,
            same_document_timeout_ms: 5_000,
            open_and_verify_timeout_ms: 45_000,
            form_fill_timeout_ms: 5_000,
            intent_deadline_ms: 60_000,
            scenario_deadline_ms: 120_000,
            min_viable_ms: 50,
            locators: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Parse from YAML; missing fields keep their defaults
    pub fn from_yaml(yaml: &str) -> TenazResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| TenazError::ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> TenazResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> TenazResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| TenazError::ConfigError {
            message: e.to_string(),
        })
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> TenazResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(TenazError::ConfigError {
                message: "poll_interval_ms must be positive".into(),
            });
        }
        if self.interpolation_steps == 0 {
            return Err(TenazError::ConfigError {
                message: "interpolation_steps must be positive".into(),
            });
        }
        let worst = self.popup_worst_case();
        let budget = self.open_and_verify_timeout_ms.min(self.intent_deadline_ms);
        if worst > Duration::from_millis(budget) {
            return Err(TenazError::ConfigError {
                message: format!(
                    "open-and-verify needs up to {}ms (grace, navigation, url check and load chain) but only {budget}ms is budgeted",
                    worst.as_millis()
                ),
            });
        }
        for (name, raw) in &self.locators {
            Locator::parse(raw).map_err(|e| TenazError::ConfigError {
                message: format!("locator {name}: {e}"),
            })?;
        }
        Ok(())
    }

    /// Look up and parse a named locator
    pub fn locator(&self, name: &str) -> TenazResult<Locator> {
        let raw = self.locators.get(name).ok_or_else(|| TenazError::ConfigError {
            message: format!("no locator named {name:?}"),
        })?;
        Locator::parse(raw)
    }

    /// Load-state fallback chain for new documents
    #[must_use]
    pub fn popup_load_fallback(&self) -> LoadFallback {
        LoadFallback::network_idle_then_load(self.popup_network_idle_ms, self.popup_load_ms)
    }

    /// Longest an open-and-verify attempt can take when every wait runs out.
    ///
    /// The same-document path is the longer one: grace, navigation watch,
    /// URL check, then the load chain after going back.
    #[must_use]
    pub fn popup_worst_case(&self) -> Duration {
        Duration::from_millis(
            self.popup_grace_ms
                .saturating_add(self.same_document_timeout_ms)
                .saturating_add(self.url_timeout_ms),
        ) + self.popup_load_fallback().budget()
    }

    /// Verification timeout
    #[must_use]
    pub const fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    /// Final verification timeout
    #[must_use]
    pub const fn final_verification_timeout(&self) -> Duration {
        Duration::from_millis(self.final_verification_timeout_ms)
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Default intent deadline
    #[must_use]
    pub const fn intent_deadline(&self) -> Duration {
        Duration::from_millis(self.intent_deadline_ms)
    }

    /// Scenario deadline
    #[must_use]
    pub const fn scenario_deadline(&self) -> Duration {
        Duration::from_millis(self.scenario_deadline_ms)
    }

    /// Minimum viable time per strategy
    #[must_use]
    pub const fn min_viable(&self) -> Duration {
        Duration::from_millis(self.min_viable_ms)
    }
}

/// Builder for `EngineConfig`
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set verification timeout
    #[must_use]
    pub const fn verification_timeout_ms(mut self, ms: u64) -> Self {
        self.config.verification_timeout_ms = ms;
        self
    }

    /// Set final verification timeout
    #[must_use]
    pub const fn final_verification_timeout_ms(mut self, ms: u64) -> Self {
        self.config.final_verification_timeout_ms = ms;
        self
    }

    /// Set poll interval
    #[must_use]
    pub const fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set per-strategy drag timeouts (native, pointer sequence, interpolation)
    #[must_use]
    pub const fn drag_timeouts_ms(mut self, native: u64, pointer: u64, interpolation: u64) -> Self {
        self.config.native_drag_timeout_ms = native;
        self.config.pointer_sequence_timeout_ms = pointer;
        self.config.interpolation_timeout_ms = interpolation;
        self
    }

    /// Set interpolation steps
    #[must_use]
    pub const fn interpolation_steps(mut self, steps: u32) -> Self {
        self.config.interpolation_steps = steps;
        self
    }

    /// Set hover settle pause
    #[must_use]
    pub const fn hover_settle_ms(mut self, ms: u64) -> Self {
        self.config.hover_settle_ms = ms;
        self
    }

    /// Set popup grace period
    #[must_use]
    pub const fn popup_grace_ms(mut self, ms: u64) -> Self {
        self.config.popup_grace_ms = ms;
        self
    }

    /// Set popup load fallback budgets (network idle, then load)
    #[must_use]
    pub const fn popup_load_ms(mut self, network_idle: u64, load: u64) -> Self {
        self.config.popup_network_idle_ms = network_idle;
        self.config.popup_load_ms = load;
        self
    }

    /// Set URL assertion timeouts (new document, same document)
    #[must_use]
    pub const fn url_timeouts_ms(mut self, new_document: u64, same_document: u64) -> Self {
        self.config.url_timeout_ms = new_document;
        self.config.same_document_timeout_ms = same_document;
        self
    }

    /// Set form-fill attempt timeout
    #[must_use]
    pub const fn form_fill_timeout_ms(mut self, ms: u64) -> Self {
        self.config.form_fill_timeout_ms = ms;
        self
    }

    /// Set default intent deadline
    #[must_use]
    pub const fn intent_deadline_ms(mut self, ms: u64) -> Self {
        self.config.intent_deadline_ms = ms;
        self
    }

    /// Set scenario deadline
    #[must_use]
    pub const fn scenario_deadline_ms(mut self, ms: u64) -> Self {
        self.config.scenario_deadline_ms = ms;
        self
    }

    /// Set minimum viable time
    #[must_use]
    pub const fn min_viable_ms(mut self, ms: u64) -> Self {
        self.config.min_viable_ms = ms;
        self
    }

    /// Add a named locator
    #[must_use]
    pub fn locator(mut self, name: impl Into<String>, locator: impl Into<String>) -> Self {
        self.config.locators.insert(name.into(), locator.into());
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
