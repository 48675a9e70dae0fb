//! Loading a [`Skill`] from a JSON or YAML file on disk.
//!
//! This is the one place in the crate that touches the filesystem; the
//! rest of the crate operates purely on in-memory value objects. Format
//! is picked from the file extension (`.yaml`/`.yml` for YAML, anything
//! else falls back to JSON), not sniffed from content.

use std::path::Path;

use thiserror::Error;

use crate::error::DagError;
use crate::skill::Skill;

/// Errors raised while reading or parsing a skill file. Kept distinct
/// from [`DagError`] since it carries I/O and format-parsing failures a
/// pure in-memory validation error never needs to.
#[derive(Debug, Error)]
pub enum SkillLoadError {
    #[error("failed to read skill file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse skill file {path} as JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse skill file {path} as YAML: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("skill file {path} failed validation: {source}")]
    Validation {
        path: String,
        #[source]
        source: DagError,
    },
}

/// Loads and validates a [`Skill`] from `path`. The format is chosen by
/// extension: `.yaml`/`.yml` parse as YAML, everything else as JSON.
/// String fields coming from the file (skill `id`/`name`, each phase's
/// `id`/`name`) are trimmed before validation runs, matching the
/// trimmed-on-construction behavior of [`Skill::new`]/[`crate::Phase::new`].
pub fn load_skill_file(path: impl AsRef<Path>) -> Result<Skill, SkillLoadError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let content = std::fs::read_to_string(path).map_err(|source| SkillLoadError::Io {
        path: path_str.clone(),
        source,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    let mut skill: Skill = if is_yaml {
        serde_yaml::from_str(&content).map_err(|source| SkillLoadError::Yaml {
            path: path_str.clone(),
            source,
        })?
    } else {
        serde_json::from_str(&content).map_err(|source| SkillLoadError::Json {
            path: path_str.clone(),
            source,
        })?
    };

    normalize(&mut skill);

    skill
        .validate()
        .map_err(|source| SkillLoadError::Validation {
            path: path_str.clone(),
            source,
        })?;

    tracing::debug!(skill_id = %skill.id, phases = skill.phases.len(), path = %path_str, "loaded skill file");
    Ok(skill)
}

fn normalize(skill: &mut Skill) {
    skill.id = skill.id.trim().to_string();
    skill.name = skill.name.trim().to_string();
    for phase in &mut skill.phases {
        phase.id = phase.id.trim().to_string();
        phase.name = phase.name.trim().to_string();
    }
}
