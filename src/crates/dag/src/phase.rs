//! Phase value object: one templated prompt step of a skill.

use serde::{Deserialize, Serialize};

use crate::error::{DagError, Result};

/// A coarse cost/quality label the executor maps to a concrete model id.
///
/// Deserializing a phase with an unrecognized `routing_profile` string
/// fails at the config-loading boundary rather than silently defaulting;
/// [`Default::default`] (used when a phase omits the field entirely)
/// resolves to [`RoutingProfile::Balanced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingProfile {
    Cheap,
    Balanced,
    Premium,
}

impl Default for RoutingProfile {
    fn default() -> Self {
        RoutingProfile::Balanced
    }
}

impl std::str::FromStr for RoutingProfile {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "cheap" => Ok(RoutingProfile::Cheap),
            "premium" => Ok(RoutingProfile::Premium),
            "balanced" => Ok(RoutingProfile::Balanced),
            _ => Err(()),
        }
    }
}

/// One step of a skill: a templated prompt plus routing and numeric
/// parameters.
///
/// Phases are immutable value objects; construct with [`Phase::new`] and
/// chain the `with_*` builders, then call [`Phase::validate`] (also
/// performed implicitly whenever a [`crate::Skill`] is validated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub prompt_template: String,
    #[serde(default)]
    pub routing_profile: RoutingProfile,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> usize {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

impl Phase {
    pub fn new(id: impl Into<String>, name: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            name: name.into().trim().to_string(),
            prompt_template: prompt_template.into(),
            routing_profile: RoutingProfile::Balanced,
            depends_on: Vec::new(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_routing_profile(mut self, profile: RoutingProfile) -> Self {
        self.routing_profile = profile;
        self
    }

    pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Checks that required string fields are non-empty after trimming
    /// and that numeric fields are in range. Does not check cross-phase
    /// references; that is [`crate::Skill::validate`]'s job.
    ///
    /// Does not itself rewrite `id`/`name`/`prompt_template` to their
    /// trimmed form: callers that build a [`Phase`] from untrusted input
    /// (the skill file loader) trim eagerly at construction instead, so
    /// that every `Phase` already on hand by the time `validate` runs is
    /// in its canonical, trimmed shape.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DagError::Validation("phase id must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(DagError::Validation(format!(
                "phase '{}' name must not be empty",
                self.id
            )));
        }
        if self.prompt_template.trim().is_empty() {
            return Err(DagError::Validation(format!(
                "phase '{}' prompt_template must not be empty",
                self.id
            )));
        }
        if self.max_tokens == 0 {
            return Err(DagError::Validation(format!(
                "phase '{}' max_tokens must be greater than zero",
                self.id
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DagError::Validation(format!(
                "phase '{}' temperature {} out of range [0.0, 2.0]",
                self.id, self.temperature
            )));
        }
        Ok(())
    }
}
