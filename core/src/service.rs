use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::db::Database;
use crate::models::{
    Ingredient, MealLocation, MealSlot, NewManualItem, NewRecipeLine, PlannedMeal, Recipe,
    RecipeDetail, ShoppingList, ShoppingListItem, WeekWindow,
};
use crate::ports::{ListStore, RecipeCatalog};
use crate::present::{self, ListView, SortMode};
use crate::sync::{GrocerySync, SyncPreview, SyncReport, get_or_create_list};

/// Local-user facade over the store and the sync engine.
pub struct BasketService {
    db: Database,
    user_id: String,
}

impl BasketService {
    pub fn new(db_path: &Path) -> Result<Self> {
        Self::from_database(Database::open(db_path)?)
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory()?)
    }

    pub fn from_database(db: Database) -> Result<Self> {
        let user_id = db.get_or_create_user_id()?;
        Ok(Self { db, user_id })
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // --- Catalog ---

    pub fn add_ingredient(&self, name: &str, emoji: Option<&str>) -> Result<Ingredient> {
        self.db.insert_ingredient(name, emoji)
    }

    pub fn list_ingredients(&self, search: Option<&str>) -> Result<Vec<Ingredient>> {
        self.db.list_ingredients(search)
    }

    pub fn create_recipe(&self, title: &str) -> Result<Recipe> {
        self.db.create_recipe(title)
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        self.db.list_recipes()
    }

    /// A recipe with its lines, or `None` when no recipe has this title.
    pub fn find_recipe(&self, title: &str) -> Result<Option<RecipeDetail>> {
        match self.db.find_recipe_by_title(title)? {
            Some(recipe) => Ok(Some(self.db.recipe_detail(recipe.id)?)),
            None => Ok(None),
        }
    }

    /// Append a line to a recipe, creating the ingredient if it is new.
    pub fn add_recipe_line(&self, recipe_title: &str, line: &NewRecipeLine) -> Result<RecipeDetail> {
        let recipe = self.db.get_recipe_by_title(recipe_title)?;
        let ingredient = self.db.get_or_create_ingredient(&line.name)?;
        self.db
            .add_recipe_line(recipe.id, ingredient.id, line.quantity, line.unit_code.as_deref())?;
        self.db.recipe_detail(recipe.id)
    }

    /// Create a recipe and all of its lines in one go.
    pub fn import_recipe(&self, title: &str, lines: &[NewRecipeLine]) -> Result<RecipeDetail> {
        let recipe = self.db.create_recipe(title)?;
        for line in lines {
            let ingredient = self.db.get_or_create_ingredient(&line.name)?;
            self.db.add_recipe_line(
                recipe.id,
                ingredient.id,
                line.quantity,
                line.unit_code.as_deref(),
            )?;
        }
        info!(recipe = %recipe.title, lines = lines.len(), "imported recipe");
        self.db.recipe_detail(recipe.id)
    }

    /// Drop every line of `ingredient` from a recipe. Returns false when the
    /// recipe had no such line.
    pub fn remove_recipe_line(&self, recipe_title: &str, ingredient: &str) -> Result<bool> {
        let recipe = self.db.get_recipe_by_title(recipe_title)?;
        let Some(ingredient) = self.db.find_ingredient_by_name(ingredient.trim())? else {
            return Ok(false);
        };
        self.db.remove_recipe_line(recipe.id, ingredient.id)
    }

    /// Delete a recipe. Meals planned with it stay planned, without a recipe.
    pub fn delete_recipe(&self, recipe_title: &str) -> Result<bool> {
        let recipe = self.db.get_recipe_by_title(recipe_title)?;
        let deleted = self.db.delete_recipe(recipe.id)?;
        if deleted {
            info!(recipe = %recipe.title, "deleted recipe");
        }
        Ok(deleted)
    }

    // --- Meal planning ---

    pub fn plan_home_meal(
        &self,
        date: NaiveDate,
        meal: MealSlot,
        recipe_title: Option<&str>,
    ) -> Result<PlannedMeal> {
        let recipe_id = match recipe_title {
            Some(title) => Some(self.db.get_recipe_by_title(title)?.id),
            None => None,
        };
        self.db
            .set_planned_meal(&self.user_id, date, meal, &MealLocation::Home { recipe_id })
    }

    pub fn plan_outside_meal(
        &self,
        date: NaiveDate,
        meal: MealSlot,
        name: Option<&str>,
    ) -> Result<PlannedMeal> {
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        self.db
            .set_planned_meal(&self.user_id, date, meal, &MealLocation::Outside { name })
    }

    pub fn clear_meal(&self, date: NaiveDate, meal: MealSlot) -> Result<bool> {
        self.db.clear_planned_meal(&self.user_id, date, meal)
    }

    pub fn week_plan(&self, window: &WeekWindow) -> Result<Vec<PlannedMeal>> {
        self.db.week_plan(&self.user_id, window)
    }

    // --- Shopping lists ---

    fn engine(&self) -> GrocerySync<'_> {
        GrocerySync::new(&self.db, &self.db, &self.db)
    }

    pub fn sync_week(&self, window: &WeekWindow) -> Result<SyncReport> {
        self.engine().run(&self.user_id, window)
    }

    pub fn preview_sync(&self, window: &WeekWindow) -> Result<SyncPreview> {
        self.engine().preview(&self.user_id, window)
    }

    pub fn week_list(&self, window: &WeekWindow) -> Result<ShoppingList> {
        get_or_create_list(&self.db, &self.user_id, window)
    }

    fn list_with_catalog(
        &self,
        window: &WeekWindow,
    ) -> Result<(ShoppingList, Vec<ShoppingListItem>, HashMap<i64, Ingredient>)> {
        let list = self.week_list(window)?;
        let items = self.db.list_items(list.id)?;
        let mut ids: Vec<i64> = items.iter().filter_map(ShoppingListItem::ingredient_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let catalog = self.db.ingredients(&ids)?;
        Ok((list, items, catalog))
    }

    pub fn list_view(&self, window: &WeekWindow, sort: SortMode) -> Result<ListView> {
        let (list, items, catalog) = self.list_with_catalog(window)?;
        Ok(present::list_view(list, &items, &catalog, sort))
    }

    pub fn add_manual_item(&self, window: &WeekWindow, item: &NewManualItem) -> Result<ShoppingListItem> {
        let list = self.week_list(window)?;
        self.db.add_manual_item(list.id, item)
    }

    /// Look up an item on one of this user's lists. Items on other users'
    /// lists are reported as missing.
    pub fn find_item(&self, item_id: i64) -> Result<Option<ShoppingListItem>> {
        let Some(item) = self.db.find_item(item_id)? else {
            return Ok(None);
        };
        let list = self.db.get_list(item.list_id)?;
        Ok((list.user_id == self.user_id).then_some(item))
    }

    pub fn get_item(&self, item_id: i64) -> Result<ShoppingListItem> {
        self.find_item(item_id)?.context("Item not found")
    }

    pub fn set_item_checked(&self, item_id: i64, checked: bool) -> Result<ShoppingListItem> {
        self.get_item(item_id)?;
        self.db.set_item_checked(item_id, checked)
    }

    pub fn remove_item(&self, item_id: i64) -> Result<bool> {
        self.get_item(item_id)?;
        self.db.delete_item(item_id)
    }

    pub fn clear_checked(&self, window: &WeekWindow) -> Result<usize> {
        let list = self.week_list(window)?;
        self.db.clear_checked(list.id)
    }

    pub fn share_text(&self, window: &WeekWindow) -> Result<String> {
        let (list, items, catalog) = self.list_with_catalog(window)?;
        Ok(present::share_text(&list.window(), &items, &catalog))
    }

    pub fn export_csv<W: Write>(&self, window: &WeekWindow, writer: W) -> Result<()> {
        let (_, items, catalog) = self.list_with_catalog(window)?;
        present::write_csv(writer, &items, &catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;

    fn week() -> WeekWindow {
        WeekWindow::parse("2024-06-10").unwrap()
    }

    fn monday() -> NaiveDate {
        week().start
    }

    fn line(name: &str, qty: Option<f64>, unit: Option<&str>) -> NewRecipeLine {
        NewRecipeLine {
            name: name.to_string(),
            quantity: qty,
            unit_code: unit.map(String::from),
        }
    }

    fn service_with_recipe_a() -> BasketService {
        let svc = BasketService::new_in_memory().unwrap();
        svc.import_recipe(
            "Recipe A",
            &[line("Flour", Some(2.0), Some("cup")), line("Salt", None, None)],
        )
        .unwrap();
        svc
    }

    fn items(svc: &BasketService) -> Vec<ShoppingListItem> {
        let list = svc.week_list(&week()).unwrap();
        svc.db().list_items(list.id).unwrap()
    }

    fn item_named(svc: &BasketService, name: &str) -> ShoppingListItem {
        let id = svc.db().find_ingredient_by_name(name).unwrap().unwrap().id;
        items(svc)
            .into_iter()
            .find(|i| i.ingredient_id() == Some(id))
            .unwrap()
    }

    #[test]
    fn test_import_recipe_reuses_ingredients() {
        let svc = service_with_recipe_a();
        svc.import_recipe("Recipe B", &[line("flour", Some(100.0), Some("g"))])
            .unwrap();

        assert_eq!(svc.list_ingredients(None).unwrap().len(), 2);
        let b = svc.find_recipe("recipe b").unwrap().unwrap();
        assert_eq!(b.ingredients[0].ingredient.as_ref().unwrap().name, "Flour");
    }

    #[test]
    fn test_add_recipe_line() {
        let svc = service_with_recipe_a();
        let detail = svc
            .add_recipe_line("Recipe A", &line("Olive oil", Some(1.0), Some("tbsp")))
            .unwrap();
        assert_eq!(detail.ingredients.len(), 3);
        assert!(svc.add_recipe_line("Nope", &line("Salt", None, None)).is_err());
    }

    #[test]
    fn test_scenario_fresh_week() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();

        let report = svc.sync_week(&week()).unwrap();
        assert_eq!(report.inserted, 2);

        let flour = item_named(&svc, "Flour");
        assert_eq!(flour.quantity, Some(2.0));
        assert_eq!(flour.unit_code.as_deref(), Some("cup"));
        assert!(!flour.checked);
        let salt = item_named(&svc, "Salt");
        assert_eq!(salt.quantity, None);
        assert!(!salt.checked);
    }

    #[test]
    fn test_scenario_checked_then_meal_removed() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.sync_week(&week()).unwrap();
        let flour = item_named(&svc, "Flour");
        svc.set_item_checked(flour.id, true).unwrap();

        svc.clear_meal(monday(), MealSlot::Dinner).unwrap();
        let report = svc.sync_week(&week()).unwrap();
        assert_eq!(report.deleted, 1);

        let remaining = items(&svc);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, flour.id);
        assert!(remaining[0].checked);
        assert_eq!(remaining[0].quantity, Some(2.0));
    }

    #[test]
    fn test_scenario_recipe_twice_and_quantity_change() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Lunch, Some("Recipe A"))
            .unwrap();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.sync_week(&week()).unwrap();
        assert_eq!(item_named(&svc, "Flour").quantity, Some(4.0));

        svc.clear_meal(monday(), MealSlot::Lunch).unwrap();
        let report = svc.sync_week(&week()).unwrap();
        assert_eq!(report.updated, 1);
        let flour = item_named(&svc, "Flour");
        assert_eq!(flour.quantity, Some(2.0));
        assert!(!flour.checked);
    }

    #[test]
    fn test_scenario_manual_item_untouched() {
        let svc = service_with_recipe_a();
        let towels = svc
            .add_manual_item(
                &week(),
                &NewManualItem {
                    text: "Paper towels".to_string(),
                    quantity: None,
                    unit_code: None,
                },
            )
            .unwrap();

        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.sync_week(&week()).unwrap();
        svc.clear_meal(monday(), MealSlot::Dinner).unwrap();
        svc.sync_week(&week()).unwrap();

        let all = items(&svc);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], towels);
        assert_eq!(
            all[0].kind,
            ItemKind::Manual {
                text: "Paper towels".to_string()
            }
        );
    }

    #[test]
    fn test_sync_is_idempotent_against_sqlite() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.plan_outside_meal(monday(), MealSlot::Lunch, Some("Cafe"))
            .unwrap();
        svc.sync_week(&week()).unwrap();
        let before = items(&svc);

        let second = svc.sync_week(&week()).unwrap();
        assert!(!second.changed());
        assert_eq!(items(&svc), before);
        assert!(svc.preview_sync(&week()).unwrap().plan.is_empty());
    }

    #[test]
    fn test_week_list_is_created_once() {
        let svc = BasketService::new_in_memory().unwrap();
        let a = svc.week_list(&week()).unwrap();
        let b = svc.week_list(&WeekWindow::parse("2024-06-14").unwrap()).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.user_id, svc.user_id());
    }

    #[test]
    fn test_list_view_and_share() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.sync_week(&week()).unwrap();
        let salt = item_named(&svc, "Salt");
        svc.set_item_checked(salt.id, true).unwrap();

        let view = svc.list_view(&week(), SortMode::Aisle).unwrap();
        assert_eq!(view.unchecked.len(), 1);
        assert_eq!(view.unchecked[0].name, "Flour");
        assert_eq!(view.unchecked[0].emoji, "🌾");
        assert_eq!(view.checked.len(), 1);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["unchecked"][0]["source"], "auto");
        assert_eq!(json["unchecked"][0]["aisle"], "Pasta, Grains & Legumes");

        let text = svc.share_text(&week()).unwrap();
        assert!(text.contains("# Pasta, Grains & Legumes\n- 2 cup Flour\n"));
        assert!(text.contains("# Checked items\n- Salt\n"));
    }

    #[test]
    fn test_clear_checked_and_remove() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.sync_week(&week()).unwrap();
        let flour = item_named(&svc, "Flour");
        let salt = item_named(&svc, "Salt");
        svc.set_item_checked(flour.id, true).unwrap();

        assert_eq!(svc.clear_checked(&week()).unwrap(), 1);
        assert!(svc.remove_item(salt.id).unwrap());
        assert!(items(&svc).is_empty());
        assert!(svc.remove_item(salt.id).is_err());
    }

    #[test]
    fn test_export_csv() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.sync_week(&week()).unwrap();

        let mut out = Vec::new();
        svc.export_csv(&week(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("aisle,name,quantity,unit,checked,source\n"));
        assert!(text.contains("\"Pasta, Grains & Legumes\",Flour,2,cup,false,auto"));
    }

    #[test]
    fn test_remove_recipe_line_and_resync() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.sync_week(&week()).unwrap();
        assert_eq!(items(&svc).len(), 2);

        assert!(svc.remove_recipe_line("recipe a", "salt").unwrap());
        assert!(!svc.remove_recipe_line("Recipe A", "Salt").unwrap());
        assert!(!svc.remove_recipe_line("Recipe A", "Saffron").unwrap());
        assert!(svc.remove_recipe_line("Ghost", "Salt").is_err());

        let report = svc.sync_week(&week()).unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(items(&svc).len(), 1);
    }

    #[test]
    fn test_delete_recipe_keeps_meal_but_empties_list() {
        let svc = service_with_recipe_a();
        svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Recipe A"))
            .unwrap();
        svc.sync_week(&week()).unwrap();

        assert!(svc.delete_recipe("Recipe A").unwrap());
        assert!(svc.find_recipe("Recipe A").unwrap().is_none());
        assert!(svc.delete_recipe("Recipe A").is_err());

        let plan = svc.week_plan(&week()).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].location, MealLocation::Home { recipe_id: None });

        svc.sync_week(&week()).unwrap();
        assert!(items(&svc).is_empty());
    }

    #[test]
    fn test_find_item_hides_other_users_items() {
        let svc = BasketService::new_in_memory().unwrap();
        let mine = svc
            .add_manual_item(
                &week(),
                &NewManualItem {
                    text: "Foil".to_string(),
                    quantity: None,
                    unit_code: None,
                },
            )
            .unwrap();
        let theirs_list = svc.db().create_list("someone-else", &week()).unwrap();
        let theirs = svc
            .db()
            .add_manual_item(
                theirs_list.id,
                &NewManualItem {
                    text: "Candles".to_string(),
                    quantity: None,
                    unit_code: None,
                },
            )
            .unwrap();

        assert_eq!(svc.find_item(mine.id).unwrap().unwrap().id, mine.id);
        assert!(svc.find_item(theirs.id).unwrap().is_none());
        assert!(svc.find_item(9999).unwrap().is_none());
        assert!(svc.set_item_checked(theirs.id, true).is_err());
        assert!(!svc.db().get_item(theirs.id).unwrap().checked);
    }

    #[test]
    fn test_find_recipe() {
        let svc = service_with_recipe_a();
        assert_eq!(svc.find_recipe("recipe a").unwrap().unwrap().ingredients.len(), 2);
        assert!(svc.find_recipe("Ghost").unwrap().is_none());
    }

    #[test]
    fn test_plan_unknown_recipe_fails() {
        let svc = BasketService::new_in_memory().unwrap();
        assert!(
            svc.plan_home_meal(monday(), MealSlot::Dinner, Some("Ghost"))
                .is_err()
        );
        assert!(svc.week_plan(&week()).unwrap().is_empty());
    }
}
