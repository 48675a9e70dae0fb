//! Skill aggregate: a named, versioned workflow defined as a DAG of phases.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{DagError, Result};
use crate::phase::Phase;

/// Model ids the executor resolves a [`crate::phase::RoutingProfile`] to.
///
/// The mapping itself is the contract; concrete identifiers are
/// configuration, never hardcoded, so a skill (or its caller) can target a
/// different provider deployment without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub cheap_model: String,
    pub balanced_model: String,
    pub premium_model: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cheap_model: "cheap-model".to_string(),
            balanced_model: "balanced-model".to_string(),
            premium_model: "premium-model".to_string(),
        }
    }
}

impl RoutingConfig {
    fn validate(&self) -> Result<()> {
        if self.cheap_model.trim().is_empty()
            || self.balanced_model.trim().is_empty()
            || self.premium_model.trim().is_empty()
        {
            return Err(DagError::Validation(
                "routing config model ids must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// A named, versioned workflow defined as a DAG of phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Skill {
    pub fn new(id: impl Into<String>, name: impl Into<String>, phases: Vec<Phase>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            name: name.into().trim().to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            phases,
            routing: RoutingConfig::default(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }

    /// Validates the skill's own fields, every phase independently, that
    /// every `dependsOn` reference resolves within `phases`, and that the
    /// dependency relation is acyclic. Does not build a [`crate::Dag`]; use
    /// [`crate::Dag::build`] for that (it re-validates internally).
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(DagError::Validation(
                "skill id and name must not be empty".into(),
            ));
        }
        if self.phases.is_empty() {
            return Err(DagError::NoPhases(self.id.clone()));
        }
        self.routing.validate()?;

        let known_ids: HashSet<&str> = self.phases.iter().map(|p| p.id.as_str()).collect();
        for phase in &self.phases {
            phase.validate()?;
            for dep in &phase.depends_on {
                if !known_ids.contains(dep.as_str()) {
                    return Err(DagError::DependencyNotFound {
                        phase: phase.id.clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }
        detect_cycle(&self.phases)?;
        Ok(())
    }
}

/// Three-color DFS cycle detection (white/grey/black). Grey-on-visit
/// signals a cycle; a self-edge is detected the same way since the node
/// is marked grey before its own edges are walked.
fn detect_cycle(phases: &[Phase]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }

    let index: HashMap<&str, usize> = phases
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.as_str(), i))
        .collect();
    let mut colors = vec![Color::White; phases.len()];

    fn visit(
        node: usize,
        phases: &[Phase],
        index: &HashMap<&str, usize>,
        colors: &mut [Color],
    ) -> Result<()> {
        colors[node] = Color::Grey;
        for dep in &phases[node].depends_on {
            let dep_idx = index[dep.as_str()];
            match colors[dep_idx] {
                Color::Grey => return Err(DagError::Cycle(phases[node].id.clone())),
                Color::White => visit(dep_idx, phases, index, colors)?,
                Color::Black => {}
            }
        }
        colors[node] = Color::Black;
        Ok(())
    }

    for i in 0..phases.len() {
        if colors[i] == Color::White {
            visit(i, phases, &index, &mut colors)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    fn phase(id: &str, deps: &[&str]) -> Phase {
        Phase::new(id, id, "{{._input}}")
            .with_depends_on(deps.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_skill_validate_ok_linear_chain() {
        let skill = Skill::new(
            "s1",
            "Skill 1",
            vec![phase("a", &[]), phase("b", &["a"]), phase("c", &["b"])],
        );
        assert!(skill.validate().is_ok());
    }

    #[test]
    fn test_skill_validate_rejects_unknown_dependency() {
        let skill = Skill::new("s1", "Skill 1", vec![phase("a", &["ghost"])]);
        assert!(matches!(
            skill.validate(),
            Err(DagError::DependencyNotFound { .. })
        ));
    }

    #[test]
    fn test_skill_validate_rejects_empty_phases() {
        let skill = Skill::new("s1", "Skill 1", vec![]);
        assert!(matches!(skill.validate(), Err(DagError::NoPhases(_))));
    }

    #[test]
    fn test_skill_validate_rejects_cycle() {
        let skill = Skill::new("s1", "Skill 1", vec![phase("a", &["b"]), phase("b", &["a"])]);
        assert!(matches!(skill.validate(), Err(DagError::Cycle(_))));
    }

    #[test]
    fn test_skill_validate_rejects_self_loop() {
        let skill = Skill::new("s1", "Skill 1", vec![phase("a", &["a"])]);
        assert!(matches!(skill.validate(), Err(DagError::Cycle(_))));
    }
}
