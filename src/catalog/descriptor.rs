use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{RecipeEngineError, Result};

/// Separator between flavor tags inside a molecule's profile string
const TAG_SEPARATOR: char = '@';

/// Raw descriptor file body
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    molecules: Vec<Molecule>,
}

#[derive(Debug, Deserialize)]
struct Molecule {
    #[serde(default)]
    flavor_profile: Option<String>,
}

/// Flavor data for one ingredient
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientDescriptor {
    /// Lowercased ingredient name
    pub name: String,

    /// Descriptor file name inside the catalog directory
    pub source_file: String,

    /// Occurrences of each flavor tag across the ingredient's molecules
    pub tag_counts: BTreeMap<String, u32>,
}

impl IngredientDescriptor {
    /// Parse a descriptor body; `source_file` is only used for naming and errors
    pub fn parse(source_file: &str, body: &str) -> Result<Self> {
        let file: DescriptorFile =
            serde_json::from_str(body).map_err(|e| RecipeEngineError::MalformedDescriptor {
                file: source_file.to_string(),
                reason: e.to_string(),
            })?;

        let mut tag_counts = BTreeMap::new();
        for profile in file.molecules.iter().filter_map(|m| m.flavor_profile.as_deref()) {
            for tag in profile.split(TAG_SEPARATOR).filter(|t| !t.is_empty()) {
                *tag_counts.entry(tag.to_string()).or_insert(0) += 1;
            }
        }

        Ok(Self {
            name: ingredient_name_from_file(source_file),
            source_file: source_file.to_string(),
            tag_counts,
        })
    }

    /// Read and parse a descriptor file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path).map_err(|e| RecipeEngineError::io(path, e))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RecipeEngineError::MalformedDescriptor {
                file: path.display().to_string(),
                reason: "file name is not valid UTF-8".to_string(),
            })?;
        Self::parse(file_name, &body)
    }

    /// Distinct flavor tags of this ingredient
    pub fn flavor_tags(&self) -> BTreeSet<&str> {
        self.tag_counts.keys().map(String::as_str).collect()
    }
}

/// `"12 Black Pepper.json"` → `"black pepper"`
///
/// The numeric prefix is everything up to the first space; a stem with no
/// space is used whole.
pub fn ingredient_name_from_file(file_name: &str) -> String {
    let without_prefix = file_name
        .split_once(' ')
        .map(|(_, rest)| rest)
        .unwrap_or(file_name);
    let stem = without_prefix
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(without_prefix);
    stem.to_lowercase()
}
