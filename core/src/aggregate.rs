use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::models::{Ingredient, ItemKey, PlannedMeal, RecipeIngredientLine, sanitize_quantity};

/// Aggregated `(ingredient, unit) → quantity` for one user and week.
///
/// A `None` quantity means every contributing line had no usable amount; the
/// ingredient still belongs on the list.
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    pub quantities: BTreeMap<ItemKey, Option<f64>>,
    pub ingredients: HashMap<i64, Ingredient>,
    pub skipped_lines: usize,
}

impl DesiredState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    #[must_use]
    pub fn contains(&self, key: &ItemKey) -> bool {
        self.quantities.contains_key(key)
    }

    #[must_use]
    pub fn quantity(&self, key: &ItemKey) -> Option<f64> {
        self.quantities.get(key).copied().flatten()
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    quantities: BTreeMap<ItemKey, Option<f64>>,
    ingredients: HashMap<i64, Ingredient>,
    skipped_lines: usize,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one line into the running totals. Lines whose ingredient did not
    /// resolve are counted and skipped.
    pub fn add(&mut self, line: &RecipeIngredientLine) {
        let Some(ingredient) = &line.ingredient else {
            self.skipped_lines += 1;
            return;
        };
        self.ingredients
            .entry(line.ingredient_id)
            .or_insert_with(|| ingredient.clone());

        let key = ItemKey::new(line.ingredient_id, line.unit_code.as_deref());
        let total = self.quantities.entry(key).or_insert(None);
        if let Some(q) = sanitize_quantity(line.quantity) {
            *total = Some(total.unwrap_or(0.0) + q);
        }
    }

    #[must_use]
    pub fn finish(self) -> DesiredState {
        DesiredState {
            quantities: self.quantities,
            ingredients: self.ingredients,
            skipped_lines: self.skipped_lines,
        }
    }
}

/// Build the desired state for a week from its planned meals.
///
/// Every meal contributes its recipe's lines once, so a recipe planned twice
/// counts twice. Meals without a recipe are ignored.
#[must_use]
pub fn aggregate(meals: &[PlannedMeal], lines: &[RecipeIngredientLine]) -> DesiredState {
    let mut by_recipe: HashMap<i64, Vec<&RecipeIngredientLine>> = HashMap::new();
    for line in lines {
        by_recipe.entry(line.recipe_id).or_default().push(line);
    }

    let mut aggregator = Aggregator::new();
    for meal in meals {
        let Some(recipe_id) = meal.location.recipe_id() else {
            continue;
        };
        if let Some(recipe_lines) = by_recipe.get(&recipe_id) {
            for line in recipe_lines {
                aggregator.add(line);
            }
        }
    }

    let desired = aggregator.finish();
    if desired.skipped_lines > 0 {
        warn!(
            skipped = desired.skipped_lines,
            "ignored recipe lines with unresolvable ingredients"
        );
    }
    desired
}
