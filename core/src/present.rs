//! Display helpers for shopping lists: naming, ordering, grouping, share text and CSV.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::aisle::{self, Aisle, MANUAL_EMOJI};
use crate::models::{Ingredient, ItemKind, ShoppingList, ShoppingListItem, WeekWindow};

pub const UNKNOWN_INGREDIENT: &str = "Unknown ingredient";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Aisle,
    #[serde(rename = "az")]
    Alphabetical,
    Recent,
}

impl SortMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aisle => "aisle",
            Self::Alphabetical => "az",
            Self::Recent => "recent",
        }
    }

    pub fn parse(mode: &str) -> Result<Self> {
        match mode.trim().to_lowercase().as_str() {
            "aisle" => Ok(Self::Aisle),
            "az" | "a-z" | "alphabetical" => Ok(Self::Alphabetical),
            "recent" => Ok(Self::Recent),
            _ => anyhow::bail!("Invalid sort '{mode}'. Must be one of: aisle, az, recent"),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn display_name<'a>(item: &'a ShoppingListItem, catalog: &'a HashMap<i64, Ingredient>) -> &'a str {
    match &item.kind {
        ItemKind::Auto { ingredient_id } => catalog
            .get(ingredient_id)
            .map_or(UNKNOWN_INGREDIENT, |i| i.name.as_str()),
        ItemKind::Manual { text } => text.as_str(),
    }
}

#[must_use]
pub fn item_aisle(item: &ShoppingListItem, catalog: &HashMap<i64, Ingredient>) -> Aisle {
    aisle::classify(display_name(item, catalog))
}

#[must_use]
pub fn item_emoji<'a>(item: &'a ShoppingListItem, catalog: &'a HashMap<i64, Ingredient>) -> &'a str {
    match &item.kind {
        ItemKind::Auto { ingredient_id } => match catalog.get(ingredient_id) {
            Some(ing) => aisle::resolve_emoji(&ing.name, ing.emoji.as_deref()),
            None => aisle::FALLBACK_EMOJI,
        },
        ItemKind::Manual { .. } => MANUAL_EMOJI,
    }
}

/// Aisle label, then name, then id.
fn aisle_key(item: &ShoppingListItem, catalog: &HashMap<i64, Ingredient>) -> (&'static str, String, i64) {
    (
        item_aisle(item, catalog).label(),
        display_name(item, catalog).to_lowercase(),
        item.id,
    )
}

/// Sort in place. Ties fall back to item id so output is stable.
pub fn sort_items(items: &mut [ShoppingListItem], catalog: &HashMap<i64, Ingredient>, mode: SortMode) {
    match mode {
        SortMode::Aisle => items.sort_by_cached_key(|i| aisle_key(i, catalog)),
        SortMode::Alphabetical => {
            items.sort_by_cached_key(|i| (display_name(i, catalog).to_lowercase(), i.id));
        }
        SortMode::Recent => items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        }),
    }
}

/// Unchecked items grouped by aisle, aisles by label, names sorted within.
#[must_use]
pub fn group_by_aisle<'a>(
    items: &'a [ShoppingListItem],
    catalog: &HashMap<i64, Ingredient>,
) -> Vec<(Aisle, Vec<&'a ShoppingListItem>)> {
    let mut unchecked: Vec<&ShoppingListItem> = items.iter().filter(|i| !i.checked).collect();
    unchecked.sort_by_cached_key(|i| aisle_key(i, catalog));

    let mut groups: Vec<(Aisle, Vec<&ShoppingListItem>)> = Vec::new();
    for item in unchecked {
        let aisle = item_aisle(item, catalog);
        match groups.last_mut() {
            Some((last, members)) if *last == aisle => members.push(item),
            _ => groups.push((aisle, vec![item])),
        }
    }
    groups
}

/// Whole numbers print without decimals, others with at most two.
#[must_use]
pub fn format_quantity(quantity: Option<f64>) -> String {
    let Some(q) = quantity else {
        return String::new();
    };
    if (q - q.round()).abs() < 1e-9 {
        return format!("{}", q.round() as i64);
    }
    let fixed = format!("{q:.2}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// `2 cup Flour`, `Salt`, `3 Eggs`.
#[must_use]
pub fn describe_item(item: &ShoppingListItem, catalog: &HashMap<i64, Ingredient>) -> String {
    let name = display_name(item, catalog);
    let qty = format_quantity(item.quantity);
    if qty.is_empty() {
        return name.to_string();
    }
    match item.unit_code.as_deref() {
        Some(unit) if !unit.is_empty() => format!("{qty} {unit} {name}"),
        _ => format!("{qty} {name}"),
    }
}

/// Plain-text list for sharing: a header with the week, one `# <aisle>`
/// section per aisle, then the checked items.
#[must_use]
pub fn share_text(
    window: &WeekWindow,
    items: &[ShoppingListItem],
    catalog: &HashMap<i64, Ingredient>,
) -> String {
    let mut lines: Vec<String> = vec![
        "Here's my grocery list:".to_string(),
        String::new(),
        format!(
            "{} – {}",
            window.start.format("%a %b %-d"),
            window.end.format("%a %b %-d")
        ),
        String::new(),
    ];

    for (aisle, members) in group_by_aisle(items, catalog) {
        lines.push(format!("# {aisle}"));
        lines.extend(members.iter().map(|i| format!("- {}", describe_item(i, catalog))));
        lines.push(String::new());
    }

    let mut checked: Vec<&ShoppingListItem> = items.iter().filter(|i| i.checked).collect();
    if !checked.is_empty() {
        checked.sort_by_cached_key(|i| (display_name(i, catalog).to_lowercase(), i.id));
        lines.push("# Checked items".to_string());
        lines.extend(checked.iter().map(|i| format!("- {}", describe_item(i, catalog))));
        lines.push(String::new());
    }

    lines.join("\n")
}

/// An item with its resolved display fields.
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: ShoppingListItem,
    pub name: String,
    pub emoji: String,
    pub aisle: Aisle,
}

impl ItemView {
    #[must_use]
    pub fn new(item: &ShoppingListItem, catalog: &HashMap<i64, Ingredient>) -> Self {
        Self {
            item: item.clone(),
            name: display_name(item, catalog).to_string(),
            emoji: item_emoji(item, catalog).to_string(),
            aisle: item_aisle(item, catalog),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    pub list: ShoppingList,
    pub sort: SortMode,
    pub unchecked: Vec<ItemView>,
    pub checked: Vec<ItemView>,
}

/// Split a list into sorted unchecked items and checked items (alphabetical).
#[must_use]
pub fn list_view(
    list: ShoppingList,
    items: &[ShoppingListItem],
    catalog: &HashMap<i64, Ingredient>,
    sort: SortMode,
) -> ListView {
    let (mut checked, mut unchecked): (Vec<ShoppingListItem>, Vec<ShoppingListItem>) =
        items.iter().cloned().partition(|i| i.checked);
    sort_items(&mut unchecked, catalog, sort);
    sort_items(&mut checked, catalog, SortMode::Alphabetical);
    ListView {
        list,
        sort,
        unchecked: unchecked.iter().map(|i| ItemView::new(i, catalog)).collect(),
        checked: checked.iter().map(|i| ItemView::new(i, catalog)).collect(),
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    aisle: &'static str,
    name: &'a str,
    quantity: String,
    unit: &'a str,
    checked: bool,
    source: &'static str,
}

/// Export items as CSV in aisle order. Checked items are included.
pub fn write_csv<W: Write>(
    writer: W,
    items: &[ShoppingListItem],
    catalog: &HashMap<i64, Ingredient>,
) -> Result<()> {
    let mut sorted = items.to_vec();
    sort_items(&mut sorted, catalog, SortMode::Aisle);

    let mut csv = csv::Writer::from_writer(writer);
    for item in &sorted {
        csv.serialize(CsvRow {
            aisle: item_aisle(item, catalog).label(),
            name: display_name(item, catalog),
            quantity: format_quantity(item.quantity),
            unit: item.unit_code.as_deref().unwrap_or(""),
            checked: item.checked,
            source: if item.is_manual() { "manual" } else { "auto" },
        })
        .context("Failed to write CSV row")?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}
