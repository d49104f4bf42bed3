//! Recipe corpus parsing.
//!
//! Turns the raw recipe JSON into index-aligned dish records and a
//! name → row index built once at load time.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::core::dish::{deserialize_nullable_string, deserialize_recipe_id};
use crate::core::DishRecord;
use crate::error::{RecipeEngineError, Result};

/// Recipe as stored in the corpus file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRecipe {
    name: String,
    #[serde(deserialize_with = "deserialize_recipe_id")]
    recipe_id: i64,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    recipe_ingredient_parts: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    author_name: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    description: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    recipe_instructions: String,
}

impl From<RawRecipe> for DishRecord {
    fn from(raw: RawRecipe) -> Self {
        let ingredients = extract_ingredients(&raw.recipe_ingredient_parts);
        let mut dish = DishRecord::new(raw.recipe_id, raw.name, ingredients);
        dish.author = raw.author_name;
        dish.description = raw.description;
        dish.instructions = raw.recipe_instructions;
        dish
    }
}

fn quoted_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""(.*?)""#).expect("valid quoted-substring pattern"))
}

/// Ingredient names are the quoted substrings of the case-folded parts field
///
/// `c("Pork", "BBQ Sauce")` → `["pork", "bbq sauce"]`
pub fn extract_ingredients(parts: &str) -> Vec<String> {
    let folded = parts.to_lowercase();
    quoted_pattern()
        .captures_iter(&folded)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Normalize user-supplied dish names for lookup
pub fn canonical_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// All dishes in corpus order
#[derive(Debug, Clone, Default)]
pub struct DishCorpus {
    dishes: Vec<DishRecord>,
    index: HashMap<String, usize>,
}

impl DishCorpus {
    /// Load the corpus file
    pub fn load(path: impl AsRef<Path>, allow_duplicate_names: bool) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|e| RecipeEngineError::io(path, e))?;
        let corpus = Self::parse(&body, allow_duplicate_names)?;
        tracing::info!("Loaded {} dishes from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    /// Parse a JSON array of recipes
    pub fn parse(json: &str, allow_duplicate_names: bool) -> Result<Self> {
        let raw: Vec<RawRecipe> = serde_json::from_str(json)
            .map_err(|e| RecipeEngineError::Corpus(format!("invalid recipe corpus: {}", e)))?;
        Self::from_records(raw.into_iter().map(DishRecord::from), allow_duplicate_names)
    }

    /// Build from records, validating name uniqueness
    ///
    /// With `allow_duplicate_names` the first record of a name is kept and
    /// later ones are dropped.
    pub fn from_records(
        records: impl IntoIterator<Item = DishRecord>,
        allow_duplicate_names: bool,
    ) -> Result<Self> {
        let mut dishes = Vec::new();
        let mut index = HashMap::new();
        let mut dropped = 0usize;

        for dish in records {
            if index.contains_key(&dish.name) {
                if !allow_duplicate_names {
                    return Err(RecipeEngineError::DuplicateDish(dish.name));
                }
                dropped += 1;
                continue;
            }
            index.insert(dish.name.clone(), dishes.len());
            dishes.push(dish);
        }

        if dropped > 0 {
            tracing::warn!("Dropped {} recipe(s) with duplicate names", dropped);
        }

        Ok(Self { dishes, index })
    }

    /// Row of a dish by (case-insensitive) name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&canonical_name(name)).copied()
    }

    pub fn get(&self, row: usize) -> Option<&DishRecord> {
        self.dishes.get(row)
    }

    pub fn dishes(&self) -> &[DishRecord] {
        &self.dishes
    }

    pub fn names(&self) -> Vec<&str> {
        self.dishes.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.dishes.iter().map(|d| d.id).collect()
    }

    pub fn ingredient_lists(&self) -> Vec<&[String]> {
        self.dishes.iter().map(|d| d.ingredients.as_slice()).collect()
    }

    /// Dishes whose name contains `fragment` (case-insensitive)
    pub fn search(&self, fragment: &str) -> Vec<&DishRecord> {
        let fragment = canonical_name(fragment);
        if fragment.is_empty() {
            return Vec::new();
        }
        self.dishes
            .iter()
            .filter(|d| d.name.contains(&fragment))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dishes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dishes.is_empty()
    }
}
