use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::catalog::{FlavorCatalog, FlavorVocabulary};
use crate::corpus::DishCorpus;
use crate::features::DenseMatrix;

/// How many unmatched ingredient names are kept for diagnostics
const TOP_UNMATCHED: usize = 20;

/// Corpus-quality counters collected while building the matrix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixStats {
    pub dishes: usize,
    pub flavors: usize,
    /// Ingredient mentions found in the catalog
    pub matched_ingredients: usize,
    /// Ingredient mentions skipped because the catalog has no descriptor
    pub unmatched_ingredients: usize,
    /// Dishes whose row is all zeros
    pub empty_dishes: usize,
    /// Most frequent unmatched ingredient names with their counts
    pub top_unmatched: Vec<(String, usize)>,
    pub build_ms: f64,
}

impl MatrixStats {
    /// Share of ingredient mentions found in the catalog (0.0 - 1.0)
    pub fn match_rate(&self) -> f64 {
        let total = self.matched_ingredients + self.unmatched_ingredients;
        if total == 0 {
            0.0
        } else {
            self.matched_ingredients as f64 / total as f64
        }
    }
}

/// Summed flavor-tag counts for one ingredient list
struct DishRow {
    values: Vec<f64>,
    matched: usize,
    unmatched: Vec<String>,
}

/// Dense dish × flavor count matrix
#[derive(Debug, Clone)]
pub struct FlavorMatrix {
    matrix: DenseMatrix,
    stats: MatrixStats,
}

impl FlavorMatrix {
    /// Build one row per dish, in corpus order
    pub fn build(catalog: &FlavorCatalog, corpus: &DishCorpus) -> Self {
        let start = Instant::now();
        let vocabulary = catalog.vocabulary();
        let width = vocabulary.len();

        let rows: Vec<DishRow> = corpus
            .dishes()
            .par_iter()
            .map(|dish| dish_row(catalog, vocabulary, &dish.ingredients))
            .collect();

        let mut matrix = DenseMatrix::zeros(rows.len(), width);
        let mut stats = MatrixStats {
            dishes: rows.len(),
            flavors: width,
            ..MatrixStats::default()
        };
        let mut unmatched_counts: HashMap<String, usize> = HashMap::new();

        for (i, row) in rows.into_iter().enumerate() {
            if row.values.iter().all(|v| *v == 0.0) {
                stats.empty_dishes += 1;
            }
            matrix.row_mut(i).copy_from_slice(&row.values);
            stats.matched_ingredients += row.matched;
            stats.unmatched_ingredients += row.unmatched.len();
            for name in row.unmatched {
                *unmatched_counts.entry(name).or_insert(0) += 1;
            }
        }

        let mut top_unmatched: Vec<(String, usize)> = unmatched_counts.into_iter().collect();
        top_unmatched.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_unmatched.truncate(TOP_UNMATCHED);
        stats.top_unmatched = top_unmatched;
        stats.build_ms = start.elapsed().as_secs_f64() * 1000.0;

        tracing::info!(
            "Built {}x{} flavor matrix in {:.1}ms ({:.1}% ingredients matched, {} empty dishes)",
            stats.dishes,
            stats.flavors,
            stats.build_ms,
            stats.match_rate() * 100.0,
            stats.empty_dishes
        );

        Self { matrix, stats }
    }

    /// Reassemble a previously built matrix
    pub fn from_parts(matrix: DenseMatrix, stats: MatrixStats) -> Self {
        Self { matrix, stats }
    }

    /// Flavor-count vector for an arbitrary ingredient list
    pub fn vector_for(catalog: &FlavorCatalog, ingredients: &[String]) -> Vec<f64> {
        dish_row(catalog, catalog.vocabulary(), ingredients).values
    }

    pub fn matrix(&self) -> &DenseMatrix {
        &self.matrix
    }

    pub fn row(&self, dish: usize) -> &[f64] {
        self.matrix.row(dish)
    }

    pub fn stats(&self) -> &MatrixStats {
        &self.stats
    }

    /// Non-zero `(tag, count)` pairs of a dish, highest count first
    pub fn flavor_profile(&self, dish: usize, vocabulary: &FlavorVocabulary) -> Vec<(String, f64)> {
        let mut profile: Vec<(String, f64)> = self
            .row(dish)
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .filter_map(|(col, v)| vocabulary.tag(col).map(|t| (t.to_string(), *v)))
            .collect();
        // stable sort keeps vocabulary order among equal counts
        profile.sort_by(|a, b| b.1.total_cmp(&a.1));
        profile
    }
}

fn dish_row(catalog: &FlavorCatalog, vocabulary: &FlavorVocabulary, ingredients: &[String]) -> DishRow {
    let mut values = vec![0.0; vocabulary.len()];
    let mut matched = 0;
    let mut unmatched = Vec::new();

    for ingredient in ingredients {
        match catalog.get(&ingredient.to_lowercase()) {
            Some(descriptor) => {
                matched += 1;
                for (tag, count) in &descriptor.tag_counts {
                    if let Some(col) = vocabulary.column(tag) {
                        values[col] += f64::from(*count);
                    }
                }
            }
            None => unmatched.push(ingredient.clone()),
        }
    }

    DishRow {
        values,
        matched,
        unmatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IngredientDescriptor;
    use crate::core::DishRecord;

    fn descriptor(file: &str, profiles: &[&str]) -> IngredientDescriptor {
        let molecules: Vec<String> = profiles
            .iter()
            .map(|p| format!(r#"{{"flavor_profile": "{}"}}"#, p))
            .collect();
        let body = format!(r#"{{"molecules": [{}]}}"#, molecules.join(","));
        IngredientDescriptor::parse(file, &body).unwrap()
    }

    fn fixture() -> (FlavorCatalog, DishCorpus) {
        let catalog = FlavorCatalog::from_descriptors(vec![
            descriptor("0 Pork.json", &["meaty@savory", "meaty"]),
            descriptor("1 BBQ Sauce.json", &["smoky@sweet", "sweet"]),
        ]);
        let corpus = DishCorpus::from_records(
            vec![
                DishRecord::new(1, "Pulled Pork", vec!["pork".into(), "bbq sauce".into()]),
                DishRecord::new(2, "Mystery", vec!["unobtainium".into(), "bbq sauce".into()]),
                DishRecord::new(3, "Air", vec![]),
            ],
            false,
        )
        .unwrap();
        (catalog, corpus)
    }

    #[test]
    fn test_rows_sum_tag_counts() {
        let (catalog, corpus) = fixture();
        let matrix = FlavorMatrix::build(&catalog, &corpus);
        // vocabulary: meaty, savory, smoky, sweet
        assert_eq!(matrix.matrix().shape(), (3, 4));
        assert_eq!(matrix.row(0), &[2.0, 1.0, 1.0, 2.0]);
        assert_eq!(matrix.row(1), &[0.0, 0.0, 1.0, 2.0]);
        assert_eq!(matrix.row(2), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_stats_count_unmatched() {
        let (catalog, corpus) = fixture();
        let stats = FlavorMatrix::build(&catalog, &corpus).stats().clone();

        assert_eq!(stats.matched_ingredients, 3);
        assert_eq!(stats.unmatched_ingredients, 1);
        assert_eq!(stats.empty_dishes, 1);
        assert_eq!(stats.top_unmatched, vec![("unobtainium".to_string(), 1)]);
        assert!((stats.match_rate() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_flavor_profile_sorted_by_count() {
        let (catalog, corpus) = fixture();
        let matrix = FlavorMatrix::build(&catalog, &corpus);
        let profile = matrix.flavor_profile(0, catalog.vocabulary());

        let tags: Vec<&str> = profile.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tags, vec!["meaty", "sweet", "savory", "smoky"]);
        assert!(matrix.flavor_profile(2, catalog.vocabulary()).is_empty());
    }

    #[test]
    fn test_vector_for_matches_row() {
        let (catalog, corpus) = fixture();
        let matrix = FlavorMatrix::build(&catalog, &corpus);
        let vector = FlavorMatrix::vector_for(&catalog, &corpus.get(0).unwrap().ingredients);
        assert_eq!(vector.as_slice(), matrix.row(0));
    }
}
