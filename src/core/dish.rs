use serde::{Deserialize, Serialize};

use crate::corpus::canonical_name;

/// Deserialize a recipe id from an integer, an integral float or a numeric string
pub(crate) fn deserialize_recipe_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdValue {
        Int(i64),
        Float(f64),
        String(String),
    }

    match IdValue::deserialize(deserializer)? {
        IdValue::Int(i) => Ok(i),
        IdValue::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        IdValue::Float(f) => Err(Error::custom(format!("Non-integral recipe id: {}", f))),
        IdValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
            .ok_or_else(|| Error::custom(format!("Invalid recipe id string: {}", s))),
    }
}

/// Treat `null` like a missing string field
pub(crate) fn deserialize_nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One recipe of the corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishRecord {
    /// RecipeId from the corpus
    pub id: i64,

    /// Canonical lowercase name, unique within the corpus
    pub name: String,

    /// Name as written in the corpus
    #[serde(default)]
    pub display_name: String,

    /// Ingredient names parsed from the recipe text
    #[serde(default)]
    pub ingredients: Vec<String>,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub instructions: String,
}

impl DishRecord {
    /// Create a record with required fields
    ///
    /// `name` becomes the lookup key via [`canonical_name`], so it always
    /// agrees with how queries are normalized.
    pub fn new(id: i64, name: impl Into<String>, ingredients: Vec<String>) -> Self {
        let display_name = name.into().trim().to_string();
        Self {
            id,
            name: canonical_name(&display_name),
            display_name,
            ingredients,
            author: String::new(),
            description: String::new(),
            instructions: String::new(),
        }
    }

    /// Get display name (for logging/UI)
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// A corpus dish with its review summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishListing {
    #[serde(flatten)]
    pub dish: DishRecord,

    /// Mean rating; `None` when the dish has no reviews
    #[serde(default)]
    pub rating: Option<f64>,

    #[serde(default)]
    pub review_count: u32,
}
