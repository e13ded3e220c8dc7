//! In-memory port implementations for engine tests.

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::NaiveDate;

use crate::error::StoreError;
use crate::models::{
    Ingredient, ItemKind, MealLocation, MealSlot, NewAutoItem, PlannedMeal, QuantityUpdate,
    RecipeIngredientLine, ShoppingList, ShoppingListItem, WeekWindow,
};
use crate::ports::{ListStore, MealPlanReader, RecipeCatalog};

pub(crate) const USER: &str = "user-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct State {
    ingredients: HashMap<i64, Ingredient>,
    lines: Vec<(i64, i64, Option<f64>, Option<String>)>,
    meals: Vec<PlannedMeal>,
    lists: Vec<ShoppingList>,
    items: Vec<ShoppingListItem>,
    next_id: i64,
    rows_written: usize,
    ops: Vec<Op>,
    fail_deletes: bool,
    lose_create_race: bool,
    phantom_conflict: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn new_list(&mut self, user_id: &str, window: &WeekWindow) -> ShoppingList {
        let list = ShoppingList {
            id: self.next_id(),
            user_id: user_id.to_string(),
            title: format!("Grocery List • {}", window.start_iso()),
            start_date: window.start,
            end_date: window.end,
            created_at: String::new(),
        };
        self.lists.push(list.clone());
        list
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: RefCell<State>,
}

pub(crate) fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

pub(crate) fn week() -> WeekWindow {
    WeekWindow::containing(monday())
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_ingredient(&self, id: i64, name: &str) {
        self.state.borrow_mut().ingredients.insert(
            id,
            Ingredient {
                id,
                name: name.to_string(),
                emoji: None,
            },
        );
    }

    pub(crate) fn add_line(&self, recipe_id: i64, ingredient_id: i64, qty: Option<f64>, unit: Option<&str>) {
        self.state
            .borrow_mut()
            .lines
            .push((recipe_id, ingredient_id, qty, unit.map(String::from)));
    }

    pub(crate) fn set_line_quantity(&self, recipe_id: i64, ingredient_id: i64, qty: Option<f64>) {
        for line in &mut self.state.borrow_mut().lines {
            if line.0 == recipe_id && line.1 == ingredient_id {
                line.2 = qty;
            }
        }
    }

    pub(crate) fn plan_meal(&self, date: NaiveDate, meal: MealSlot, location: MealLocation) {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.meals.push(PlannedMeal {
            id,
            user_id: USER.to_string(),
            plan_date: date,
            meal,
            location,
        });
    }

    pub(crate) fn plan_recipe(&self, date: NaiveDate, meal: MealSlot, recipe_id: i64) {
        self.plan_meal(
            date,
            meal,
            MealLocation::Home {
                recipe_id: Some(recipe_id),
            },
        );
    }

    pub(crate) fn clear_meals(&self) {
        self.state.borrow_mut().meals.clear();
    }

    /// Insert an item directly, bypassing the reconciler.
    pub(crate) fn seed_item(
        &self,
        list_id: i64,
        kind: ItemKind,
        quantity: Option<f64>,
        unit: Option<&str>,
        checked: bool,
    ) -> i64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.items.push(ShoppingListItem {
            id,
            list_id,
            kind,
            quantity,
            unit_code: unit.map(String::from),
            checked,
            created_at: String::new(),
        });
        id
    }

    /// Check an item the way a user would, outside any sync pass.
    pub(crate) fn check_item(&self, item_id: i64) {
        if let Some(item) = self
            .state
            .borrow_mut()
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
        {
            item.checked = true;
        }
    }

    pub(crate) fn seed_list(&self, window: &WeekWindow) -> ShoppingList {
        self.state.borrow_mut().new_list(USER, window)
    }

    pub(crate) fn items(&self, list_id: i64) -> Vec<ShoppingListItem> {
        self.list_items(list_id).unwrap()
    }

    pub(crate) fn list_count(&self) -> usize {
        self.state.borrow().lists.len()
    }

    pub(crate) fn rows_written(&self) -> usize {
        self.state.borrow().rows_written
    }

    pub(crate) fn reset_counters(&self) {
        let mut state = self.state.borrow_mut();
        state.rows_written = 0;
        state.ops.clear();
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.state.borrow().ops.clone()
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.state.borrow_mut().fail_deletes = fail;
    }

    /// The next `create_list` behaves as if another writer inserted the row first.
    pub(crate) fn lose_next_create_race(&self) {
        self.state.borrow_mut().lose_create_race = true;
    }

    /// `create_list` reports a conflict but no row ever becomes visible.
    pub(crate) fn phantom_conflict(&self) {
        self.state.borrow_mut().phantom_conflict = true;
    }
}

impl MealPlanReader for MemoryStore {
    fn planned_home_meals(&self, user_id: &str, window: &WeekWindow) -> Result<Vec<PlannedMeal>> {
        Ok(self
            .state
            .borrow()
            .meals
            .iter()
            .filter(|m| m.user_id == user_id && window.contains(m.plan_date))
            .filter(|m| m.location.recipe_id().is_some())
            .cloned()
            .collect())
    }
}

impl RecipeCatalog for MemoryStore {
    fn ingredient_lines(&self, recipe_ids: &[i64]) -> Result<Vec<RecipeIngredientLine>> {
        let state = self.state.borrow();
        Ok(state
            .lines
            .iter()
            .filter(|(recipe_id, ..)| recipe_ids.contains(recipe_id))
            .map(|(recipe_id, ingredient_id, quantity, unit)| RecipeIngredientLine {
                recipe_id: *recipe_id,
                ingredient_id: *ingredient_id,
                quantity: *quantity,
                unit_code: unit.clone(),
                ingredient: state.ingredients.get(ingredient_id).cloned(),
            })
            .collect())
    }

    fn ingredients(&self, ids: &[i64]) -> Result<HashMap<i64, Ingredient>> {
        Ok(self
            .state
            .borrow()
            .ingredients
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .map(|(id, ing)| (*id, ing.clone()))
            .collect())
    }
}

impl ListStore for MemoryStore {
    fn find_list(&self, user_id: &str, window: &WeekWindow) -> Result<Option<ShoppingList>> {
        Ok(self
            .state
            .borrow()
            .lists
            .iter()
            .find(|l| l.user_id == user_id && l.start_date == window.start && l.end_date == window.end)
            .cloned())
    }

    fn create_list(
        &self,
        user_id: &str,
        window: &WeekWindow,
    ) -> std::result::Result<ShoppingList, StoreError> {
        let mut state = self.state.borrow_mut();
        let conflict = StoreError::ListExists {
            user_id: user_id.to_string(),
            start: window.start,
        };
        if state.phantom_conflict {
            return Err(conflict);
        }
        if state.lose_create_race {
            state.lose_create_race = false;
            state.new_list(user_id, window);
            return Err(conflict);
        }
        let exists = state
            .lists
            .iter()
            .any(|l| l.user_id == user_id && l.start_date == window.start && l.end_date == window.end);
        if exists {
            return Err(conflict);
        }
        Ok(state.new_list(user_id, window))
    }

    fn list_items(&self, list_id: i64) -> Result<Vec<ShoppingListItem>> {
        Ok(self
            .state
            .borrow()
            .items
            .iter()
            .filter(|i| i.list_id == list_id)
            .cloned()
            .collect())
    }

    fn insert_auto_items(&self, list_id: i64, items: &[NewAutoItem]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Insert);
        for item in items {
            let id = state.next_id();
            state.items.push(ShoppingListItem {
                id,
                list_id,
                kind: ItemKind::Auto {
                    ingredient_id: item.ingredient_id,
                },
                quantity: item.quantity,
                unit_code: item.unit_code.clone(),
                checked: false,
                created_at: String::new(),
            });
            state.rows_written += 1;
        }
        Ok(())
    }

    fn update_quantities(&self, updates: &[QuantityUpdate]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Update);
        for update in updates {
            if let Some(item) = state
                .items
                .iter_mut()
                .find(|i| i.id == update.item_id && !i.checked)
            {
                item.quantity = update.quantity;
            }
            state.rows_written += 1;
        }
        Ok(())
    }

    fn delete_items(&self, ids: &[i64]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_deletes {
            bail!("store unavailable");
        }
        state.ops.push(Op::Delete);
        state.items.retain(|i| i.checked || !ids.contains(&i.id));
        state.rows_written += ids.len();
        Ok(())
    }
}
