//! Bundled sample dataset served whenever live data is unavailable.

use std::sync::OnceLock;

use crate::types::{Category, Recipe};

static SAMPLE_JSON: &str = include_str!("sample_recipes.json");

static RECIPES: OnceLock<Vec<Recipe>> = OnceLock::new();

pub fn sample_recipes() -> &'static [Recipe] {
    RECIPES.get_or_init(|| {
        serde_json::from_str(SAMPLE_JSON).expect("bundled sample recipes are valid JSON")
    })
}

pub fn sample_categories() -> Vec<Category> {
    [
        ("italian", "Italian"),
        ("seafood", "Seafood"),
        ("thai", "Thai"),
        ("desserts", "Desserts"),
        ("healthy", "Healthy"),
    ]
    .into_iter()
    .map(|(slug, name)| Category {
        id: slug.to_string(),
        name: name.to_string(),
        slug: slug.to_string(),
    })
    .collect()
}

pub fn find_by_slug(slug: &str) -> Option<Recipe> {
    sample_recipes().iter().find(|r| r.slug == slug).cloned()
}
