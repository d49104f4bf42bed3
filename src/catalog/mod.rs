pub mod descriptor;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{RecipeEngineError, Result};

pub use descriptor::{ingredient_name_from_file, IngredientDescriptor};

/// Sorted, deduplicated flavor tags; position = matrix column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlavorVocabulary {
    tags: Vec<String>,
    index: HashMap<String, usize>,
}

impl FlavorVocabulary {
    /// Build from any tag collection; empty strings are dropped
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sorted: BTreeSet<String> = tags
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.is_empty())
            .collect();
        let tags: Vec<String> = sorted.into_iter().collect();
        let index = tags
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self { tags, index }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Column index of a tag
    pub fn column(&self, tag: &str) -> Option<usize> {
        self.index.get(tag).copied()
    }

    pub fn tag(&self, column: usize) -> Option<&str> {
        self.tags.get(column).map(String::as_str)
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Ingredient descriptors keyed by lowercased name, plus the global vocabulary
#[derive(Debug, Clone, Default)]
pub struct FlavorCatalog {
    ingredients: HashMap<String, IngredientDescriptor>,
    vocabulary: FlavorVocabulary,
}

impl FlavorCatalog {
    /// Load every `*.json` descriptor in `dir`
    ///
    /// Any unreadable or malformed file aborts the whole load.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| RecipeEngineError::io(dir, e))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| RecipeEngineError::io(dir, e))?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let descriptors = paths
            .iter()
            .map(|p| IngredientDescriptor::load(p))
            .collect::<Result<Vec<_>>>()?;

        let catalog = Self::from_descriptors(descriptors);
        tracing::info!(
            "Loaded flavor catalog from {}: {} ingredients, {} flavor tags",
            dir.display(),
            catalog.len(),
            catalog.vocabulary.len()
        );
        Ok(catalog)
    }

    /// Assemble from parsed descriptors; later duplicates replace earlier ones
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = IngredientDescriptor>) -> Self {
        let mut ingredients = HashMap::new();
        for descriptor in descriptors {
            if let Some(previous) = ingredients.insert(descriptor.name.clone(), descriptor) {
                tracing::warn!(
                    "Ingredient '{}' described twice, replacing {}",
                    previous.name,
                    previous.source_file
                );
            }
        }

        let vocabulary = FlavorVocabulary::new(
            ingredients
                .values()
                .flat_map(|d| d.tag_counts.keys().cloned()),
        );

        Self {
            ingredients,
            vocabulary,
        }
    }

    pub fn get(&self, ingredient: &str) -> Option<&IngredientDescriptor> {
        self.ingredients.get(ingredient)
    }

    /// Descriptor file name for an ingredient
    pub fn source_file(&self, ingredient: &str) -> Option<&str> {
        self.get(ingredient).map(|d| d.source_file.as_str())
    }

    pub fn vocabulary(&self) -> &FlavorVocabulary {
        &self.vocabulary
    }

    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_vocabulary_sorted_and_deduplicated() {
        let vocab = FlavorVocabulary::new(["sweet", "", "bitter", "sweet", "apple"]);
        assert_eq!(vocab.tags(), &["apple", "bitter", "sweet"]);
        assert_eq!(vocab.column("bitter"), Some(1));
        assert_eq!(vocab.column(""), None);
        assert_eq!(vocab.tag(2), Some("sweet"));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "0 Pork.json",
            r#"{"molecules": [{"flavor_profile": "meaty@savory"}, {"flavor_profile": "meaty"}]}"#,
        );
        write(
            dir.path(),
            "1 BBQ Sauce.json",
            r#"{"molecules": [{"flavor_profile": "smoky@sweet"}]}"#,
        );
        write(dir.path(), "notes.txt", "ignored");

        let catalog = FlavorCatalog::load_dir(dir.path()).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.source_file("bbq sauce"), Some("1 BBQ Sauce.json"));
        assert_eq!(catalog.get("pork").unwrap().tag_counts.get("meaty"), Some(&2));
        assert_eq!(
            catalog.vocabulary().tags(),
            &["meaty", "savory", "smoky", "sweet"]
        );
    }

    #[test]
    fn test_vocabulary_is_union_of_ingredient_tags() {
        let descriptors = vec![
            IngredientDescriptor::parse("0 A.json", r#"{"molecules": [{"flavor_profile": "x@y"}]}"#)
                .unwrap(),
            IngredientDescriptor::parse("1 B.json", r#"{"molecules": [{"flavor_profile": "y@z@"}]}"#)
                .unwrap(),
        ];
        let catalog = FlavorCatalog::from_descriptors(descriptors);

        let expected: BTreeSet<&str> = ["x", "y", "z"].into_iter().collect();
        let union: BTreeSet<&str> = ["a", "b"]
            .iter()
            .flat_map(|n| catalog.get(n).unwrap().flavor_tags())
            .collect();
        assert_eq!(union, expected);
        assert_eq!(catalog.vocabulary().tags(), &["x", "y", "z"]);
    }

    #[test]
    fn test_malformed_file_fails_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0 Good.json", r#"{"molecules": []}"#);
        write(dir.path(), "1 Bad.json", r#"{"not_molecules": []}"#);

        let err = FlavorCatalog::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, RecipeEngineError::MalformedDescriptor { .. }));
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let err = FlavorCatalog::load_dir("/nonexistent/flavors").unwrap_err();
        assert!(matches!(err, RecipeEngineError::Io { .. }));
    }
}
