use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{Connection, params, params_from_iter};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Ingredient, ItemKind, MealLocation, MealSlot, NewAutoItem, NewManualItem, PlannedMeal,
    QuantityUpdate, Recipe, RecipeDetail, RecipeIngredientLine, ShoppingList, ShoppingListItem,
    WeekWindow, normalize_unit, validate_ingredient_name, validate_manual_item,
};
use crate::ports::{ListStore, MealPlanReader, RecipeCatalog};

pub struct Database {
    conn: Connection,
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn date_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS config (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    emoji TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_ingredients_name
                    ON ingredients(name COLLATE NOCASE);

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_recipes_title
                    ON recipes(title COLLATE NOCASE);

                -- ingredient_id is not a foreign key: lines may outlive catalog rows
                CREATE TABLE IF NOT EXISTS recipe_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL,
                    quantity REAL,
                    unit_code TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe
                    ON recipe_ingredients(recipe_id);

                CREATE TABLE IF NOT EXISTS meal_plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    plan_date TEXT NOT NULL,
                    meal TEXT NOT NULL CHECK (meal IN ('breakfast', 'lunch', 'dinner', 'snack')),
                    location TEXT NOT NULL CHECK (location IN ('home', 'outside')),
                    recipe_id INTEGER REFERENCES recipes(id) ON DELETE SET NULL,
                    external_name TEXT,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, plan_date, meal)
                );

                CREATE TABLE IF NOT EXISTS shopping_lists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    start_date TEXT NOT NULL,
                    end_date TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (user_id, start_date, end_date)
                );

                CREATE TABLE IF NOT EXISTS shopping_list_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    list_id INTEGER NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE,
                    ingredient_id INTEGER,
                    custom_text TEXT,
                    quantity REAL,
                    unit_code TEXT,
                    checked INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    CHECK ((ingredient_id IS NULL) <> (custom_text IS NULL))
                );
                CREATE INDEX IF NOT EXISTS idx_shopping_list_items_list
                    ON shopping_list_items(list_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            name: row.get(1)?,
            emoji: row.get(2)?,
        })
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    // Expects columns:
    // 0: ri.recipe_id, 1: ri.ingredient_id, 2: ri.quantity, 3: ri.unit_code,
    // 4: i.id, 5: i.name, 6: i.emoji (all NULL when the ingredient is gone)
    fn line_from_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeIngredientLine> {
        let ingredient = match row.get::<_, Option<i64>>(4)? {
            Some(id) => Some(Ingredient {
                id,
                name: row.get(5)?,
                emoji: row.get(6)?,
            }),
            None => None,
        };
        Ok(RecipeIngredientLine {
            recipe_id: row.get(0)?,
            ingredient_id: row.get(1)?,
            quantity: row.get(2)?,
            unit_code: row.get(3)?,
            ingredient,
        })
    }

    // 0: id, 1: user_id, 2: plan_date, 3: meal, 4: location, 5: recipe_id, 6: external_name
    fn planned_meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<PlannedMeal> {
        let meal: String = row.get(3)?;
        let meal = MealSlot::parse(&meal)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
        let location: String = row.get(4)?;
        let location = if location == "outside" {
            MealLocation::Outside { name: row.get(6)? }
        } else {
            MealLocation::Home {
                recipe_id: row.get(5)?,
            }
        };
        Ok(PlannedMeal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            plan_date: date_at(row, 2)?,
            meal,
            location,
        })
    }

    fn list_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingList> {
        Ok(ShoppingList {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            start_date: date_at(row, 3)?,
            end_date: date_at(row, 4)?,
            created_at: row.get(5)?,
        })
    }

    // 0: id, 1: list_id, 2: ingredient_id, 3: custom_text, 4: quantity,
    // 5: unit_code, 6: checked, 7: created_at
    fn item_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingListItem> {
        let kind = match (row.get::<_, Option<i64>>(2)?, row.get::<_, Option<String>>(3)?) {
            (Some(ingredient_id), _) => ItemKind::Auto { ingredient_id },
            (None, Some(text)) => ItemKind::Manual { text },
            (None, None) => {
                return Err(rusqlite::Error::InvalidColumnType(
                    2,
                    "ingredient_id".to_string(),
                    Type::Null,
                ));
            }
        };
        Ok(ShoppingListItem {
            id: row.get(0)?,
            list_id: row.get(1)?,
            kind,
            quantity: row.get(4)?,
            unit_code: row.get(5)?,
            checked: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    // --- Ingredients ---

    pub fn insert_ingredient(&self, name: &str, emoji: Option<&str>) -> Result<Ingredient> {
        let name = validate_ingredient_name(name)?;
        let emoji = emoji.map(str::trim).filter(|e| !e.is_empty());
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingredients (name, emoji, created_at) VALUES (?1, ?2, ?3)",
                params![name, emoji, now],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    anyhow::anyhow!("Ingredient '{name}' already exists")
                } else {
                    e.into()
                }
            })?;
        let id = self.conn.last_insert_rowid();
        self.get_ingredient(id)
    }

    pub fn get_ingredient(&self, id: i64) -> Result<Ingredient> {
        self.conn
            .query_row(
                "SELECT id, name, emoji FROM ingredients WHERE id = ?1",
                params![id],
                Self::ingredient_from_row,
            )
            .context("Ingredient not found")
    }

    pub fn find_ingredient_by_name(&self, name: &str) -> Result<Option<Ingredient>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, emoji FROM ingredients WHERE name = ?1 COLLATE NOCASE")?;
        let mut rows = stmt.query(params![name.trim()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::ingredient_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_or_create_ingredient(&self, name: &str) -> Result<Ingredient> {
        if let Some(existing) = self.find_ingredient_by_name(name)? {
            return Ok(existing);
        }
        self.insert_ingredient(name, None)
    }

    pub fn list_ingredients(&self, search: Option<&str>) -> Result<Vec<Ingredient>> {
        let pattern = search.map(|q| {
            let escaped = q
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        });
        let mut stmt = self.conn.prepare(
            "SELECT id, name, emoji FROM ingredients
             WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'
             ORDER BY name COLLATE NOCASE",
        )?;
        let ingredients = stmt
            .query_map(params![pattern], Self::ingredient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    // --- Recipes ---

    pub fn create_recipe(&self, title: &str) -> Result<Recipe> {
        let title = title.trim();
        if title.is_empty() {
            bail!("Recipe title must not be empty");
        }
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO recipes (title, created_at) VALUES (?1, ?2)",
                params![title, now],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    anyhow::anyhow!("Recipe '{title}' already exists")
                } else {
                    e.into()
                }
            })?;
        let id = self.conn.last_insert_rowid();
        self.get_recipe(id)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Recipe> {
        self.conn
            .query_row(
                "SELECT id, title, created_at FROM recipes WHERE id = ?1",
                params![id],
                Self::recipe_from_row,
            )
            .context("Recipe not found")
    }

    pub fn find_recipe_by_title(&self, title: &str) -> Result<Option<Recipe>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, created_at FROM recipes WHERE title = ?1 COLLATE NOCASE")?;
        let mut rows = stmt.query(params![title.trim()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::recipe_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_recipe_by_title(&self, title: &str) -> Result<Recipe> {
        self.find_recipe_by_title(title)?
            .with_context(|| format!("Recipe '{title}' not found"))
    }

    pub fn add_recipe_line(
        &self,
        recipe_id: i64,
        ingredient_id: i64,
        quantity: Option<f64>,
        unit_code: Option<&str>,
    ) -> Result<()> {
        self.get_recipe(recipe_id)?;
        self.conn.execute(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit_code)
             VALUES (?1, ?2, ?3, ?4)",
            params![recipe_id, ingredient_id, quantity, normalize_unit(unit_code)],
        )?;
        Ok(())
    }

    pub fn remove_recipe_line(&self, recipe_id: i64, ingredient_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1 AND ingredient_id = ?2",
            params![recipe_id, ingredient_id],
        )?;
        Ok(rows > 0)
    }

    pub fn recipe_detail(&self, recipe_id: i64) -> Result<RecipeDetail> {
        let recipe = self.get_recipe(recipe_id)?;
        let ingredients = self.ingredient_lines(&[recipe_id])?;
        Ok(RecipeDetail {
            id: recipe.id,
            title: recipe.title,
            created_at: recipe.created_at,
            ingredients,
        })
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, created_at FROM recipes ORDER BY title COLLATE NOCASE")?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    pub fn delete_recipe(&self, recipe_id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![recipe_id])?;
        Ok(rows > 0)
    }

    // --- Meal plans ---

    const PLANNED_MEAL_COLUMNS: &'static str =
        "id, user_id, plan_date, meal, location, recipe_id, external_name";

    pub fn set_planned_meal(
        &self,
        user_id: &str,
        date: NaiveDate,
        meal: MealSlot,
        location: &MealLocation,
    ) -> Result<PlannedMeal> {
        let (recipe_id, external_name) = match location {
            MealLocation::Home { recipe_id } => (*recipe_id, None),
            MealLocation::Outside { name } => (None, name.as_deref()),
        };
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO meal_plans (user_id, plan_date, meal, location, recipe_id, external_name, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id, plan_date, meal) DO UPDATE SET
                location = excluded.location,
                recipe_id = excluded.recipe_id,
                external_name = excluded.external_name,
                updated_at = excluded.updated_at",
            params![
                user_id,
                iso(date),
                meal.as_str(),
                location.as_str(),
                recipe_id,
                external_name,
                now,
            ],
        )?;
        self.get_planned_meal(user_id, date, meal)?
            .context("Planned meal not found")
    }

    pub fn get_planned_meal(
        &self,
        user_id: &str,
        date: NaiveDate,
        meal: MealSlot,
    ) -> Result<Option<PlannedMeal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meal_plans WHERE user_id = ?1 AND plan_date = ?2 AND meal = ?3",
            Self::PLANNED_MEAL_COLUMNS
        ))?;
        let mut rows = stmt.query(params![user_id, iso(date), meal.as_str()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::planned_meal_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn clear_planned_meal(&self, user_id: &str, date: NaiveDate, meal: MealSlot) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM meal_plans WHERE user_id = ?1 AND plan_date = ?2 AND meal = ?3",
            params![user_id, iso(date), meal.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// Every planned meal in the week, home or outside, in calendar order.
    pub fn week_plan(&self, user_id: &str, window: &WeekWindow) -> Result<Vec<PlannedMeal>> {
        self.query_meals(user_id, window, false)
    }

    fn query_meals(&self, user_id: &str, window: &WeekWindow, home_with_recipe: bool) -> Result<Vec<PlannedMeal>> {
        let filter = if home_with_recipe {
            "AND location = 'home' AND recipe_id IS NOT NULL"
        } else {
            ""
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meal_plans
             WHERE user_id = ?1 AND plan_date BETWEEN ?2 AND ?3 {filter}
             ORDER BY plan_date,
                CASE meal WHEN 'breakfast' THEN 0 WHEN 'lunch' THEN 1 WHEN 'dinner' THEN 2 ELSE 3 END",
            Self::PLANNED_MEAL_COLUMNS
        ))?;
        let meals = stmt
            .query_map(
                params![user_id, window.start_iso(), window.end_iso()],
                Self::planned_meal_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    // --- Shopping lists ---

    const ITEM_COLUMNS: &'static str =
        "id, list_id, ingredient_id, custom_text, quantity, unit_code, checked, created_at";

    pub fn get_list(&self, id: i64) -> Result<ShoppingList> {
        self.conn
            .query_row(
                "SELECT id, user_id, title, start_date, end_date, created_at
                 FROM shopping_lists WHERE id = ?1",
                params![id],
                Self::list_from_row,
            )
            .context("Shopping list not found")
    }

    pub fn find_item(&self, id: i64) -> Result<Option<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM shopping_list_items WHERE id = ?1",
            Self::ITEM_COLUMNS
        ))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::item_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_item(&self, id: i64) -> Result<ShoppingListItem> {
        self.find_item(id)?.context("Item not found")
    }

    pub fn add_manual_item(&self, list_id: i64, item: &NewManualItem) -> Result<ShoppingListItem> {
        let item = validate_manual_item(item)?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO shopping_list_items (list_id, custom_text, quantity, unit_code, checked, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![list_id, item.text, item.quantity, item.unit_code, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_item(id)
    }

    pub fn set_item_checked(&self, id: i64, checked: bool) -> Result<ShoppingListItem> {
        let rows = self.conn.execute(
            "UPDATE shopping_list_items SET checked = ?1 WHERE id = ?2",
            params![checked, id],
        )?;
        if rows == 0 {
            bail!("Item not found");
        }
        self.get_item(id)
    }

    pub fn delete_item(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM shopping_list_items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn clear_checked(&self, list_id: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM shopping_list_items WHERE list_id = ?1 AND checked = 1",
            params![list_id],
        )?;
        Ok(rows)
    }

    // --- Config ---

    pub fn get_or_create_user_id(&self) -> Result<String> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM config WHERE key = 'user_id'")?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(row.get(0)?);
        }
        drop(rows);
        drop(stmt);

        let user_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES ('user_id', ?1)",
            params![user_id],
        )?;
        Ok(user_id)
    }
}

impl MealPlanReader for Database {
    fn planned_home_meals(&self, user_id: &str, window: &WeekWindow) -> Result<Vec<PlannedMeal>> {
        self.query_meals(user_id, window, true)
    }
}

impl RecipeCatalog for Database {
    fn ingredient_lines(&self, recipe_ids: &[i64]) -> Result<Vec<RecipeIngredientLine>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT ri.recipe_id, ri.ingredient_id, ri.quantity, ri.unit_code, i.id, i.name, i.emoji
             FROM recipe_ingredients ri
             LEFT JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id IN ({})
             ORDER BY ri.recipe_id, ri.id",
            placeholders(recipe_ids.len())
        ))?;
        let lines = stmt
            .query_map(params_from_iter(recipe_ids), Self::line_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    fn ingredients(&self, ids: &[i64]) -> Result<HashMap<i64, Ingredient>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, emoji FROM ingredients WHERE id IN ({})",
            placeholders(ids.len())
        ))?;
        let ingredients = stmt
            .query_map(params_from_iter(ids), Self::ingredient_from_row)?
            .map(|r| r.map(|i| (i.id, i)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(ingredients)
    }
}

impl ListStore for Database {
    fn find_list(&self, user_id: &str, window: &WeekWindow) -> Result<Option<ShoppingList>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, start_date, end_date, created_at
             FROM shopping_lists WHERE user_id = ?1 AND start_date = ?2 AND end_date = ?3",
        )?;
        let mut rows = stmt.query(params![user_id, window.start_iso(), window.end_iso()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::list_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn create_list(
        &self,
        user_id: &str,
        window: &WeekWindow,
    ) -> std::result::Result<ShoppingList, StoreError> {
        let now = Local::now().to_rfc3339();
        let title = format!("Grocery List • {}", window.start_iso());
        match self.conn.execute(
            "INSERT INTO shopping_lists (user_id, title, start_date, end_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, title, window.start_iso(), window.end_iso(), now],
        ) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::ListExists {
                    user_id: user_id.to_string(),
                    start: window.start,
                });
            }
            Err(e) => return Err(e.into()),
        }
        let id = self.conn.last_insert_rowid();
        Ok(self.get_list(id)?)
    }

    fn list_items(&self, list_id: i64) -> Result<Vec<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM shopping_list_items WHERE list_id = ?1 ORDER BY id",
            Self::ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![list_id], Self::item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn insert_auto_items(&self, list_id: i64, items: &[NewAutoItem]) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO shopping_list_items (list_id, ingredient_id, quantity, unit_code, checked, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            )?;
            for item in items {
                stmt.execute(params![list_id, item.ingredient_id, item.quantity, item.unit_code, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn update_quantities(&self, updates: &[QuantityUpdate]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE shopping_list_items SET quantity = ?1 WHERE id = ?2 AND checked = 0",
            )?;
            for update in updates {
                stmt.execute(params![update.quantity, update.item_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_items(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.conn.execute(
            &format!(
                "DELETE FROM shopping_list_items WHERE checked = 0 AND id IN ({})",
                placeholders(ids.len())
            ),
            params_from_iter(ids),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> WeekWindow {
        WeekWindow::parse("2024-06-10").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // --- Catalog tests ---

    #[test]
    fn test_insert_and_find_ingredient() {
        let db = Database::open_in_memory().unwrap();
        let flour = db.insert_ingredient("  Flour ", Some("🌾")).unwrap();
        assert_eq!(flour.name, "Flour");
        assert_eq!(flour.emoji.as_deref(), Some("🌾"));

        let found = db.find_ingredient_by_name("flour").unwrap().unwrap();
        assert_eq!(found.id, flour.id);
        assert!(db.find_ingredient_by_name("sugar").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_ingredient_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_ingredient("Salt", None).unwrap();
        let err = db.insert_ingredient("SALT", None).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(db.insert_ingredient("   ", None).is_err());
    }

    #[test]
    fn test_get_or_create_ingredient() {
        let db = Database::open_in_memory().unwrap();
        let a = db.get_or_create_ingredient("Garlic").unwrap();
        let b = db.get_or_create_ingredient("garlic").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(db.list_ingredients(None).unwrap().len(), 1);
    }

    #[test]
    fn test_list_ingredients_search() {
        let db = Database::open_in_memory().unwrap();
        db.insert_ingredient("Brown rice", None).unwrap();
        db.insert_ingredient("Rice vinegar", None).unwrap();
        db.insert_ingredient("Salt", None).unwrap();

        let all = db.list_ingredients(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "Brown rice");

        let rice = db.list_ingredients(Some("rice")).unwrap();
        assert_eq!(rice.len(), 2);
        assert!(db.list_ingredients(Some("100%")).unwrap().is_empty());
    }

    #[test]
    fn test_recipe_lines_and_detail() {
        let db = Database::open_in_memory().unwrap();
        let flour = db.insert_ingredient("Flour", None).unwrap();
        let salt = db.insert_ingredient("Salt", None).unwrap();
        let recipe = db.create_recipe("Flatbread").unwrap();
        db.add_recipe_line(recipe.id, flour.id, Some(2.0), Some("Cup")).unwrap();
        db.add_recipe_line(recipe.id, salt.id, None, None).unwrap();

        let detail = db.recipe_detail(recipe.id).unwrap();
        assert_eq!(detail.title, "Flatbread");
        assert_eq!(detail.ingredients.len(), 2);
        assert_eq!(detail.ingredients[0].unit_code.as_deref(), Some("cup"));
        assert_eq!(detail.ingredients[0].ingredient.as_ref().unwrap().name, "Flour");
        assert_eq!(detail.ingredients[1].quantity, None);

        assert_eq!(db.get_recipe_by_title("flatbread").unwrap().id, recipe.id);
        assert!(db.get_recipe_by_title("Pancakes").is_err());
        assert!(db.find_recipe_by_title("Pancakes").unwrap().is_none());
        assert!(db.create_recipe("FLATBREAD").is_err());
    }

    #[test]
    fn test_remove_and_delete_recipe() {
        let db = Database::open_in_memory().unwrap();
        let flour = db.insert_ingredient("Flour", None).unwrap();
        let recipe = db.create_recipe("Flatbread").unwrap();
        db.add_recipe_line(recipe.id, flour.id, Some(2.0), Some("cup")).unwrap();

        assert!(db.remove_recipe_line(recipe.id, flour.id).unwrap());
        assert!(!db.remove_recipe_line(recipe.id, flour.id).unwrap());
        assert!(db.delete_recipe(recipe.id).unwrap());
        assert!(db.list_recipes().unwrap().is_empty());
    }

    #[test]
    fn test_ingredient_lines_marks_missing_ingredients() {
        let db = Database::open_in_memory().unwrap();
        let flour = db.insert_ingredient("Flour", None).unwrap();
        let recipe = db.create_recipe("Flatbread").unwrap();
        db.add_recipe_line(recipe.id, flour.id, Some(2.0), Some("cup")).unwrap();
        db.add_recipe_line(recipe.id, 4242, Some(1.0), None).unwrap();

        let lines = db.ingredient_lines(&[recipe.id]).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ingredient.is_some());
        assert!(lines[1].ingredient.is_none());
        assert!(db.ingredient_lines(&[]).unwrap().is_empty());

        let catalog = db.ingredients(&[flour.id, 4242]).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[&flour.id].name, "Flour");
    }

    // --- Meal plan tests ---

    #[test]
    fn test_set_planned_meal_upserts() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.create_recipe("Flatbread").unwrap();
        let day = date("2024-06-12");

        let home = db
            .set_planned_meal("u1", day, MealSlot::Dinner, &MealLocation::Home { recipe_id: Some(recipe.id) })
            .unwrap();
        assert_eq!(home.location.recipe_id(), Some(recipe.id));

        let outside = db
            .set_planned_meal(
                "u1",
                day,
                MealSlot::Dinner,
                &MealLocation::Outside {
                    name: Some("Taqueria".to_string()),
                },
            )
            .unwrap();
        assert_eq!(outside.id, home.id);
        assert_eq!(
            outside.location,
            MealLocation::Outside {
                name: Some("Taqueria".to_string())
            }
        );
        assert_eq!(db.week_plan("u1", &week()).unwrap().len(), 1);
    }

    #[test]
    fn test_planned_home_meals_filters() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.create_recipe("Flatbread").unwrap();
        let home = MealLocation::Home { recipe_id: Some(recipe.id) };

        db.set_planned_meal("u1", date("2024-06-10"), MealSlot::Dinner, &home).unwrap();
        db.set_planned_meal("u1", date("2024-06-16"), MealSlot::Breakfast, &home).unwrap();
        db.set_planned_meal("u1", date("2024-06-11"), MealSlot::Lunch, &MealLocation::Home { recipe_id: None })
            .unwrap();
        db.set_planned_meal(
            "u1",
            date("2024-06-12"),
            MealSlot::Dinner,
            &MealLocation::Outside { name: None },
        )
        .unwrap();
        db.set_planned_meal("u1", date("2024-06-17"), MealSlot::Dinner, &home).unwrap();
        db.set_planned_meal("u2", date("2024-06-10"), MealSlot::Dinner, &home).unwrap();

        let meals = db.planned_home_meals("u1", &week()).unwrap();
        assert_eq!(meals.len(), 2);
        assert_eq!(meals[0].plan_date, date("2024-06-10"));
        assert_eq!(meals[1].plan_date, date("2024-06-16"));

        assert_eq!(db.week_plan("u1", &week()).unwrap().len(), 4);
    }

    #[test]
    fn test_clear_planned_meal() {
        let db = Database::open_in_memory().unwrap();
        let day = date("2024-06-10");
        db.set_planned_meal("u1", day, MealSlot::Snack, &MealLocation::Outside { name: None })
            .unwrap();
        assert!(db.clear_planned_meal("u1", day, MealSlot::Snack).unwrap());
        assert!(!db.clear_planned_meal("u1", day, MealSlot::Snack).unwrap());
    }

    #[test]
    fn test_deleting_recipe_detaches_planned_meals() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.create_recipe("Flatbread").unwrap();
        let day = date("2024-06-10");
        db.set_planned_meal("u1", day, MealSlot::Dinner, &MealLocation::Home { recipe_id: Some(recipe.id) })
            .unwrap();
        db.delete_recipe(recipe.id).unwrap();

        let meal = db.get_planned_meal("u1", day, MealSlot::Dinner).unwrap().unwrap();
        assert_eq!(meal.location.recipe_id(), None);
        assert!(db.planned_home_meals("u1", &week()).unwrap().is_empty());
    }

    // --- List store tests ---

    #[test]
    fn test_create_list_reports_uniqueness_violation() {
        let db = Database::open_in_memory().unwrap();
        let list = db.create_list("u1", &week()).unwrap();
        assert_eq!(list.title, "Grocery List • 2024-06-10");
        assert_eq!(list.end_date, date("2024-06-16"));

        let err = db.create_list("u1", &week()).unwrap_err();
        assert!(matches!(err, StoreError::ListExists { .. }));

        // Other users and other weeks are independent
        db.create_list("u2", &week()).unwrap();
        db.create_list("u1", &week().next()).unwrap();

        let found = db.find_list("u1", &week()).unwrap().unwrap();
        assert_eq!(found.id, list.id);
    }

    #[test]
    fn test_batch_item_writes() {
        let db = Database::open_in_memory().unwrap();
        let list = db.create_list("u1", &week()).unwrap();
        db.insert_auto_items(
            list.id,
            &[
                NewAutoItem {
                    ingredient_id: 1,
                    quantity: Some(2.0),
                    unit_code: Some("cup".to_string()),
                },
                NewAutoItem {
                    ingredient_id: 2,
                    quantity: None,
                    unit_code: None,
                },
            ],
        )
        .unwrap();

        let items = db.list_items(list.id).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| !i.checked && !i.is_manual()));

        db.update_quantities(&[QuantityUpdate {
            item_id: items[0].id,
            quantity: Some(3.0),
        }])
        .unwrap();
        assert_eq!(db.get_item(items[0].id).unwrap().quantity, Some(3.0));

        db.delete_items(&[items[1].id]).unwrap();
        db.delete_items(&[]).unwrap();
        assert_eq!(db.list_items(list.id).unwrap().len(), 1);
    }

    #[test]
    fn test_batch_writes_skip_items_checked_meanwhile() {
        let db = Database::open_in_memory().unwrap();
        let list = db.create_list("u1", &week()).unwrap();
        db.insert_auto_items(
            list.id,
            &[
                NewAutoItem {
                    ingredient_id: 1,
                    quantity: Some(2.0),
                    unit_code: Some("cup".to_string()),
                },
                NewAutoItem {
                    ingredient_id: 2,
                    quantity: None,
                    unit_code: None,
                },
            ],
        )
        .unwrap();
        let items = db.list_items(list.id).unwrap();
        for item in &items {
            db.set_item_checked(item.id, true).unwrap();
        }

        db.update_quantities(&[QuantityUpdate {
            item_id: items[0].id,
            quantity: Some(5.0),
        }])
        .unwrap();
        db.delete_items(&[items[1].id]).unwrap();

        let after = db.list_items(list.id).unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].quantity, Some(2.0));
        assert!(after.iter().all(|i| i.checked));
    }

    #[test]
    fn test_manual_items_and_checking() {
        let db = Database::open_in_memory().unwrap();
        let list = db.create_list("u1", &week()).unwrap();
        let towels = db
            .add_manual_item(
                list.id,
                &NewManualItem {
                    text: " Paper towels ".to_string(),
                    quantity: Some(2.0),
                    unit_code: Some("PC".to_string()),
                },
            )
            .unwrap();
        assert_eq!(
            towels.kind,
            ItemKind::Manual {
                text: "Paper towels".to_string()
            }
        );
        assert_eq!(towels.unit_code.as_deref(), Some("pc"));

        let checked = db.set_item_checked(towels.id, true).unwrap();
        assert!(checked.checked);
        assert!(db.set_item_checked(9999, true).is_err());

        assert_eq!(db.clear_checked(list.id).unwrap(), 1);
        assert!(db.list_items(list.id).unwrap().is_empty());
        assert!(!db.delete_item(towels.id).unwrap());
    }

    #[test]
    fn test_find_item_distinguishes_missing_from_failure() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.find_item(42).unwrap().is_none());
        assert!(db.get_item(42).is_err());

        db.conn.execute("DROP TABLE shopping_list_items", []).unwrap();
        assert!(db.find_item(42).is_err());
    }

    #[test]
    fn test_item_must_be_auto_or_manual() {
        let db = Database::open_in_memory().unwrap();
        let list = db.create_list("u1", &week()).unwrap();
        let both = db.conn.execute(
            "INSERT INTO shopping_list_items (list_id, ingredient_id, custom_text, checked, created_at)
             VALUES (?1, 1, 'x', 0, '')",
            params![list.id],
        );
        assert!(both.is_err());
        let neither = db.conn.execute(
            "INSERT INTO shopping_list_items (list_id, checked, created_at) VALUES (?1, 0, '')",
            params![list.id],
        );
        assert!(neither.is_err());
    }

    #[test]
    fn test_user_id_is_stable() {
        let db = Database::open_in_memory().unwrap();
        let first = db.get_or_create_user_id().unwrap();
        let second = db.get_or_create_user_id().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 36);
    }

    #[test]
    fn test_open_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basket.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_ingredient("Flour", None).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_ingredients(None).unwrap().len(), 1);
    }
}
