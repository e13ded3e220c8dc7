use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{DesiredState, aggregate};
use crate::error::StoreError;
use crate::models::{ShoppingList, WeekWindow};
use crate::ports::{ListStore, MealPlanReader, RecipeCatalog};
use crate::reconcile::{self, ReconcilePlan};

/// Resolve the list for `(user, week)`, creating it on first access.
///
/// Losing a creation race to a concurrent caller is not an error: the winning
/// row is re-read and returned.
pub fn get_or_create_list(
    store: &dyn ListStore,
    user_id: &str,
    window: &WeekWindow,
) -> Result<ShoppingList> {
    if let Some(list) = store.find_list(user_id, window)? {
        return Ok(list);
    }

    match store.create_list(user_id, window) {
        Ok(list) => {
            info!(list_id = list.id, week = %window, "created shopping list");
            Ok(list)
        }
        Err(err @ StoreError::ListExists { .. }) => {
            warn!(week = %window, "shopping list created concurrently, re-reading");
            match store.find_list(user_id, window)? {
                Some(list) => Ok(list),
                None => Err(err.into()),
            }
        }
        Err(StoreError::Other(err)) => Err(err.context("Failed to create shopping list")),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub list: ShoppingList,
    pub desired: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped_lines: usize,
}

impl SyncReport {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }
}

/// A plan computed without writing, for previews.
#[derive(Debug, Clone, Serialize)]
pub struct SyncPreview {
    pub week: WeekWindow,
    pub list_id: Option<i64>,
    pub plan: ReconcilePlan,
    pub skipped_lines: usize,
}

/// One reconciliation pass over the three data-access ports.
pub struct GrocerySync<'a> {
    plans: &'a dyn MealPlanReader,
    recipes: &'a dyn RecipeCatalog,
    lists: &'a dyn ListStore,
}

impl<'a> GrocerySync<'a> {
    #[must_use]
    pub fn new(
        plans: &'a dyn MealPlanReader,
        recipes: &'a dyn RecipeCatalog,
        lists: &'a dyn ListStore,
    ) -> Self {
        Self {
            plans,
            recipes,
            lists,
        }
    }

    pub fn desired_state(&self, user_id: &str, window: &WeekWindow) -> Result<DesiredState> {
        let meals = self
            .plans
            .planned_home_meals(user_id, window)
            .context("Failed to read planned meals")?;

        let mut recipe_ids: Vec<i64> = meals.iter().filter_map(|m| m.location.recipe_id()).collect();
        recipe_ids.sort_unstable();
        recipe_ids.dedup();

        let lines = if recipe_ids.is_empty() {
            Vec::new()
        } else {
            self.recipes
                .ingredient_lines(&recipe_ids)
                .context("Failed to read recipe ingredients")?
        };
        debug!(
            meals = meals.len(),
            recipes = recipe_ids.len(),
            lines = lines.len(),
            "read plan inputs"
        );

        Ok(aggregate(&meals, &lines))
    }

    /// Bring the week's list in line with the meal plan.
    ///
    /// All reads finish before the diff is computed, and the diff is complete
    /// before the first write.
    pub fn run(&self, user_id: &str, window: &WeekWindow) -> Result<SyncReport> {
        info!(week = %window, "syncing grocery list");
        let list = get_or_create_list(self.lists, user_id, window)?;
        let desired = self.desired_state(user_id, window)?;
        let items = self
            .lists
            .list_items(list.id)
            .context("Failed to read list items")?;

        let plan = reconcile::plan(&desired, &items);
        debug!(
            existing = items.len(),
            desired = desired.len(),
            writes = plan.write_count(),
            "computed reconcile plan"
        );
        reconcile::apply(self.lists, list.id, &plan)?;

        let report = SyncReport {
            list,
            desired: desired.len(),
            inserted: plan.inserts.len(),
            updated: plan.updates.len(),
            deleted: plan.deletes.len(),
            skipped_lines: desired.skipped_lines,
        };
        info!(
            list_id = report.list.id,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "grocery list synced"
        );
        Ok(report)
    }

    /// Compute the plan `run` would apply, without creating or writing anything.
    pub fn preview(&self, user_id: &str, window: &WeekWindow) -> Result<SyncPreview> {
        let list = self.lists.find_list(user_id, window)?;
        let desired = self.desired_state(user_id, window)?;
        let items = match &list {
            Some(list) => self.lists.list_items(list.id)?,
            None => Vec::new(),
        };
        Ok(SyncPreview {
            week: *window,
            list_id: list.map(|l| l.id),
            plan: reconcile::plan(&desired, &items),
            skipped_lines: desired.skipped_lines,
        })
    }
}
