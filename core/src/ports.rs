//! Data-access seams used by the sync engine.
//!
//! [`Database`](crate::db::Database) implements all three against SQLite; tests
//! implement them in memory. Calls are synchronous; callers embedding the engine
//! in an async runtime should run a sync pass on a blocking thread.

use std::collections::HashMap;

use anyhow::Result;

use crate::error::StoreError;
use crate::models::{
    Ingredient, NewAutoItem, PlannedMeal, QuantityUpdate, RecipeIngredientLine, ShoppingList,
    ShoppingListItem, WeekWindow,
};

pub trait MealPlanReader {
    /// Meals planned at home with a recipe, for `user_id` within `window`.
    fn planned_home_meals(&self, user_id: &str, window: &WeekWindow) -> Result<Vec<PlannedMeal>>;
}

pub trait RecipeCatalog {
    /// Ingredient lines for the given recipes, joined with catalog rows where they resolve.
    fn ingredient_lines(&self, recipe_ids: &[i64]) -> Result<Vec<RecipeIngredientLine>>;

    fn ingredients(&self, ids: &[i64]) -> Result<HashMap<i64, Ingredient>>;
}

pub trait ListStore {
    fn find_list(&self, user_id: &str, window: &WeekWindow) -> Result<Option<ShoppingList>>;

    /// Insert a new list. Must report a `(user, start, end)` uniqueness violation
    /// as [`StoreError::ListExists`].
    fn create_list(
        &self,
        user_id: &str,
        window: &WeekWindow,
    ) -> std::result::Result<ShoppingList, StoreError>;

    fn list_items(&self, list_id: i64) -> Result<Vec<ShoppingListItem>>;

    fn insert_auto_items(&self, list_id: i64, items: &[NewAutoItem]) -> Result<()>;

    /// Set quantities on items that are still unchecked. Items checked since
    /// the diff was taken must be left as they are.
    fn update_quantities(&self, updates: &[QuantityUpdate]) -> Result<()>;

    /// Delete items that are still unchecked.
    fn delete_items(&self, ids: &[i64]) -> Result<()>;
}
