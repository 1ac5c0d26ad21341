use crate::types::Recipe;

/// Case-insensitive substring match over title, description, tags,
/// ingredient items and instruction text. `needle` must already be lowercase.
pub fn matches(recipe: &Recipe, needle: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(needle);
    hit(&recipe.title)
        || hit(&recipe.description)
        || recipe.tags.iter().any(|t| hit(t))
        || recipe.ingredients.iter().any(|i| hit(&i.item))
        || recipe.instructions.iter().any(|i| hit(&i.description))
}

/// Filter `recipes` by `term`. A blank term keeps everything.
pub fn filter(recipes: &[Recipe], term: &str) -> Vec<Recipe> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return recipes.to_vec();
    }
    recipes
        .iter()
        .filter(|r| matches(r, &needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample::sample_recipes;

    fn slugs(found: &[Recipe]) -> Vec<&str> {
        found.iter().map(|r| r.slug.as_str()).collect()
    }

    #[test]
    fn matches_each_field_case_insensitively() {
        let all = sample_recipes();
        // title
        assert_eq!(slugs(&filter(all, "CARBONARA")), ["classic-spaghetti-carbonara"]);
        // description
        assert_eq!(slugs(&filter(all, "molten")), ["chocolate-lava-cake"]);
        // tag
        assert_eq!(slugs(&filter(all, "Meal Prep")), ["mediterranean-quinoa-salad"]);
        // ingredient item
        assert_eq!(slugs(&filter(all, "tamarind")), ["shrimp-pad-thai"]);
        // instruction text
        assert_eq!(slugs(&filter(all, "bain-marie")), ["chocolate-lava-cake"]);
    }

    #[test]
    fn blank_term_returns_everything() {
        let all = sample_recipes();
        assert_eq!(filter(all, ""), all.to_vec());
        assert_eq!(filter(all, "   \t"), all.to_vec());
    }

    #[test]
    fn no_match_is_empty() {
        assert!(filter(sample_recipes(), "durian").is_empty());
    }
}
