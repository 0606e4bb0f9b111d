//! Persona registry: teenager archetype name -> remote fine-tuned model id.
//!
//! The registry is built once at startup, either from the built-in table or
//! from a TOML file (`PERSONAS_FILE`), and is read-only afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

const BUILTIN_PERSONAS: [(&str, &str); 4] = [
    ("Angry Adam", "ef9183fe-75a5-4686-b7ff-14fced618013-ft"),
    ("Quiet Quintin", "ebbfe6bd-0c47-42e6-8afe-949a8bfe9e34-ft"),
    ("Judgmental Judy", "d5452d1d-d8bd-42d6-a28c-321f79f96572-ft"),
    ("Happy Hannah", "5340c40f-9e3b-4d16-8d4c-9a1d4495e905-ft"),
];

#[derive(Debug, Deserialize)]
struct PersonaFile {
    personas: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    entries: BTreeMap<String, String>,
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PersonaRegistry {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_PERSONAS
                .iter()
                .map(|(name, id)| (name.to_string(), id.to_string()))
                .collect(),
        }
    }

    /// Parse a registry from a TOML document of the form:
    ///
    /// ```toml
    /// [personas]
    /// "Angry Adam" = "ef9183fe-...-ft"
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        let file: PersonaFile = toml::from_str(raw)
            .map_err(|e| AppError::Config(format!("invalid persona file: {e}")))?;

        if file.personas.is_empty() {
            return Err(AppError::Config("persona file defines no personas".into()));
        }
        for (name, model_id) in &file.personas {
            if name.trim().is_empty() {
                return Err(AppError::Config("persona name cannot be empty".into()));
            }
            if model_id.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "persona '{name}' has an empty model id"
                )));
            }
        }

        Ok(Self {
            entries: file.personas,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Resolve a persona name to the model id the provider expects.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Message returned when a classification has no bound model.
pub fn unknown_persona_message(name: &str) -> String {
    format!("No model found for classification: {name}")
}
