//! Persona catalog: named system-prompt presets selectable by the user

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A persona steers the assistant through its system-prompt text
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Persona {
    /// Stable identifier used for selection
    pub value: String,

    /// Display label for pickers
    pub label: String,

    /// System-prompt text installed when this persona is selected
    pub content: String,
}

/// Read-only catalog of personas, loaded once at startup.
///
/// The first entry is the session default.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonaCatalog {
    prompts: Vec<Persona>,
}

/// Default catalog compiled into the binary
const EMBEDDED_CATALOG: &str = include_str!("../personas/catalog.json");

impl PersonaCatalog {
    /// Parse a catalog from its JSON document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or lists no
    /// personas.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        if catalog.prompts.is_empty() {
            return Err(Error::Config("persona catalog lists no personas".into()));
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!(
            path = %path.display(),
            count = catalog.prompts.len(),
            "loaded persona catalog"
        );
        Ok(catalog)
    }

    /// Catalog compiled into the binary, used when no file is configured
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded document fails to parse.
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Look up a persona by its identifier
    #[must_use]
    pub fn find(&self, value: &str) -> Option<&Persona> {
        self.prompts.iter().find(|p| p.value == value)
    }

    /// The session default persona (first catalog entry)
    #[must_use]
    pub fn default_persona(&self) -> &Persona {
        // non-empty is enforced by every constructor
        &self.prompts[0]
    }

    #[must_use]
    pub fn personas(&self) -> &[Persona] {
        &self.prompts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersonaCatalog {
        PersonaCatalog::from_json(
            r#"{"prompts": [
                {"value": "interviewer", "label": "Interviewer", "content": "You are an interviewer."},
                {"value": "tutor", "label": "Tutor", "content": "You are a tutor."}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn find_returns_matching_entry() {
        let catalog = sample();
        assert_eq!(catalog.find("tutor").unwrap().label, "Tutor");
        assert!(catalog.find("nope").is_none());
    }

    #[test]
    fn default_is_first_entry() {
        let catalog = sample();
        assert_eq!(catalog.default_persona().value, "interviewer");
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let err = PersonaCatalog::from_json(r#"{"prompts": []}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn embedded_catalog_parses() {
        let catalog = PersonaCatalog::embedded().unwrap();
        assert!(!catalog.personas().is_empty());
        assert!(!catalog.default_persona().content.is_empty());
    }

    #[test]
    fn loads_catalog_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"prompts": [{"value": "pirate", "label": "Pirate", "content": "Arr."}]}"#,
        )
        .unwrap();

        let catalog = PersonaCatalog::load(&path).unwrap();
        assert_eq!(catalog.default_persona().value, "pirate");
    }

    #[test]
    fn load_reports_the_failing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        let err = PersonaCatalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
