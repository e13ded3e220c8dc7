use std::fmt;

use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub created_at: String,
}

/// One ingredient line of a recipe, joined with its catalog row.
///
/// `ingredient` is `None` when `ingredient_id` does not resolve in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredientLine {
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub quantity: Option<f64>,
    pub unit_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient: Option<Ingredient>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub ingredients: Vec<RecipeIngredientLine>,
}

/// A recipe line named by ingredient, as typed or imported. The ingredient is
/// created in the catalog on first use.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipeLine {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit_code: Option<String>,
}

// --- Meal planning ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

pub const MEAL_SLOTS: &[MealSlot] = &[
    MealSlot::Breakfast,
    MealSlot::Lunch,
    MealSlot::Dinner,
    MealSlot::Snack,
];

impl MealSlot {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }

    pub fn parse(meal: &str) -> Result<Self> {
        let lower = meal.trim().to_lowercase();
        MEAL_SLOTS
            .iter()
            .copied()
            .find(|slot| slot.as_str() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = MEAL_SLOTS.iter().map(|s| s.as_str()).collect();
                anyhow::anyhow!(
                    "Invalid meal '{meal}'. Must be one of: {}",
                    names.join(", ")
                )
            })
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a planned meal is eaten. Only home meals carry a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "location", rename_all = "lowercase")]
pub enum MealLocation {
    Home {
        recipe_id: Option<i64>,
    },
    Outside {
        #[serde(rename = "external_name")]
        name: Option<String>,
    },
}

impl MealLocation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home { .. } => "home",
            Self::Outside { .. } => "outside",
        }
    }

    #[must_use]
    pub fn recipe_id(&self) -> Option<i64> {
        match self {
            Self::Home { recipe_id } => *recipe_id,
            Self::Outside { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedMeal {
    pub id: i64,
    pub user_id: String,
    pub plan_date: NaiveDate,
    pub meal: MealSlot,
    #[serde(flatten)]
    pub location: MealLocation,
}

/// A Monday-to-Sunday calendar range. One shopping list exists per user per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_monday());
        let start = date - chrono::Duration::days(offset);
        Self {
            start,
            end: start + chrono::Duration::days(6),
        }
    }

    /// Parse any `YYYY-MM-DD` date and return the week containing it.
    pub fn parse(date: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("Invalid date '{date}'. Must be YYYY-MM-DD"))?;
        Ok(Self::containing(date))
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    #[must_use]
    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    #[must_use]
    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let start = self.start;
        (0..7).map(move |i| start + chrono::Duration::days(i))
    }

    #[must_use]
    pub fn previous(&self) -> Self {
        Self::containing(self.start - chrono::Duration::days(7))
    }

    #[must_use]
    pub fn next(&self) -> Self {
        Self::containing(self.start + chrono::Duration::days(7))
    }
}

impl fmt::Display for WeekWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} – {}", self.start_iso(), self.end_iso())
    }
}

// --- Shopping lists ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingList {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: String,
}

impl ShoppingList {
    #[must_use]
    pub fn window(&self) -> WeekWindow {
        WeekWindow {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

/// An item is either derived from planned recipes or typed in by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ItemKind {
    Auto { ingredient_id: i64 },
    Manual { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingListItem {
    pub id: i64,
    pub list_id: i64,
    #[serde(flatten)]
    pub kind: ItemKind,
    pub quantity: Option<f64>,
    pub unit_code: Option<String>,
    pub checked: bool,
    pub created_at: String,
}

impl ShoppingListItem {
    /// Reconciliation key, present only for auto items.
    #[must_use]
    pub fn key(&self) -> Option<ItemKey> {
        match self.kind {
            ItemKind::Auto { ingredient_id } => {
                Some(ItemKey::new(ingredient_id, self.unit_code.as_deref()))
            }
            ItemKind::Manual { .. } => None,
        }
    }

    #[must_use]
    pub fn ingredient_id(&self) -> Option<i64> {
        match self.kind {
            ItemKind::Auto { ingredient_id } => Some(ingredient_id),
            ItemKind::Manual { .. } => None,
        }
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self.kind, ItemKind::Manual { .. })
    }
}

/// `(ingredient, unit)` identity of an auto item within one list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemKey {
    pub ingredient_id: i64,
    pub unit_code: Option<String>,
}

impl ItemKey {
    #[must_use]
    pub fn new(ingredient_id: i64, unit_code: Option<&str>) -> Self {
        Self {
            ingredient_id,
            unit_code: normalize_unit(unit_code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAutoItem {
    pub ingredient_id: i64,
    pub quantity: Option<f64>,
    pub unit_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityUpdate {
    pub item_id: i64,
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewManualItem {
    pub text: String,
    pub quantity: Option<f64>,
    pub unit_code: Option<String>,
}

/// Units offered by the recipe editor. Other codes are accepted verbatim.
pub const UNIT_CODES: &[&str] = &["g", "kg", "oz", "lb", "ml", "l", "tsp", "tbsp", "cup", "pc"];

/// Trim and lower-case a unit code; blank codes mean "no unit".
#[must_use]
pub fn normalize_unit(unit: Option<&str>) -> Option<String> {
    unit.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_lowercase)
}

#[must_use]
pub fn is_known_unit(unit: &str) -> bool {
    UNIT_CODES.contains(&unit.trim().to_lowercase().as_str())
}

/// Negative and non-finite quantities are treated as absent.
#[must_use]
pub fn sanitize_quantity(quantity: Option<f64>) -> Option<f64> {
    quantity.filter(|q| q.is_finite() && *q >= 0.0)
}

pub fn validate_ingredient_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("Ingredient name must not be empty");
    }
    Ok(trimmed.to_string())
}

/// Validate user-entered quantities: positive and finite when present.
pub fn validate_quantity(quantity: Option<f64>) -> Result<Option<f64>> {
    match quantity {
        Some(q) if !q.is_finite() || q <= 0.0 => {
            bail!("Quantity must be a positive number (got {q})")
        }
        other => Ok(other),
    }
}

pub fn validate_manual_item(item: &NewManualItem) -> Result<NewManualItem> {
    let text = item.text.trim();
    if text.is_empty() {
        bail!("Item text must not be empty");
    }
    Ok(NewManualItem {
        text: text.to_string(),
        quantity: validate_quantity(item.quantity)?,
        unit_code: normalize_unit(item.unit_code.as_deref()),
    })
}
