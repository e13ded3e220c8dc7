use anyhow::{Context, Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use basket_core::aisle::resolve_emoji;
use basket_core::models::{NewRecipeLine, RecipeDetail, UNIT_CODES, is_known_unit};
use basket_core::present::format_quantity;
use basket_core::service::BasketService;

use super::helpers::{exit_not_found, parse_quantity, truncate};

pub(crate) fn cmd_recipe_create(svc: &BasketService, title: &str, json: bool) -> Result<()> {
    let recipe = svc.create_recipe(title)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let title = &recipe.title;
        println!("Created recipe: {title} (id: {})", recipe.id);
        println!(
            "Add ingredients with: basket recipe add-ingredient \"{title}\" <ingredient> --qty <n> --unit <unit>"
        );
    }
    Ok(())
}

pub(crate) fn cmd_recipe_add_ingredient(
    svc: &BasketService,
    recipe_title: &str,
    ingredient: &str,
    qty: Option<&str>,
    unit: Option<&str>,
    json: bool,
) -> Result<()> {
    if svc.find_recipe(recipe_title)?.is_none() {
        exit_not_found(&format!("Recipe '{recipe_title}' not found"), json);
    }
    let line = NewRecipeLine {
        name: ingredient.to_string(),
        quantity: parse_quantity(qty)?,
        unit_code: unit.map(String::from),
    };
    if let Some(warning) = unit_warning(unit) {
        eprintln!("Warning: {warning}");
    }
    let detail = svc.add_recipe_line(recipe_title, &line)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        let amount = format_quantity(line.quantity);
        let unit = line.unit_code.as_deref().unwrap_or("");
        let what = [amount.as_str(), unit, ingredient]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        println!("Added {what} to {}", detail.title);
    }
    Ok(())
}

/// Units outside the usual codes are stored as written, but only merge on the
/// list with lines spelled the same way.
fn unit_warning(unit: Option<&str>) -> Option<String> {
    let unit = unit.map(str::trim).filter(|u| !u.is_empty())?;
    if is_known_unit(unit) {
        return None;
    }
    Some(format!(
        "unit '{unit}' is not one of {}; it will only combine with lines using the same unit",
        UNIT_CODES.join(", ")
    ))
}

pub(crate) fn cmd_recipe_remove_ingredient(
    svc: &BasketService,
    recipe_title: &str,
    ingredient: &str,
    json: bool,
) -> Result<()> {
    if svc.find_recipe(recipe_title)?.is_none() {
        exit_not_found(&format!("Recipe '{recipe_title}' not found"), json);
    }
    if !svc.remove_recipe_line(recipe_title, ingredient)? {
        exit_not_found(&format!("Ingredient '{ingredient}' not found in recipe"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "removed": ingredient }));
    } else {
        println!("Removed {ingredient} from {recipe_title}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_delete(svc: &BasketService, recipe_title: &str, json: bool) -> Result<()> {
    if svc.find_recipe(recipe_title)?.is_none() {
        exit_not_found(&format!("Recipe '{recipe_title}' not found"), json);
    }
    svc.delete_recipe(recipe_title)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": recipe_title }));
    } else {
        println!("Deleted recipe {recipe_title}");
        println!("Run `basket list sync` to drop its items from the list");
    }
    Ok(())
}

fn print_recipe(detail: &RecipeDetail) {
    println!("=== {} ===", detail.title);
    if detail.ingredients.is_empty() {
        println!("  (no ingredients)");
        return;
    }
    println!("  INGREDIENTS:");
    for line in &detail.ingredients {
        let (icon, name) = match &line.ingredient {
            Some(i) => (resolve_emoji(&i.name, i.emoji.as_deref()), i.name.as_str()),
            None => (basket_core::aisle::FALLBACK_EMOJI, "?"),
        };
        let qty = format_quantity(line.quantity);
        let unit = line.unit_code.as_deref().unwrap_or("");
        if qty.is_empty() {
            println!("    {icon} {name}");
        } else {
            println!("    {icon} {name}: {qty} {unit}");
        }
    }
}

pub(crate) fn cmd_recipe_show(svc: &BasketService, recipe_title: &str, json: bool) -> Result<()> {
    let Some(detail) = svc.find_recipe(recipe_title)? else {
        exit_not_found(&format!("Recipe '{recipe_title}' not found"), json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print_recipe(&detail);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(svc: &BasketService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
    }

    let recipes = svc.list_recipes()?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        std::process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let mut rows = Vec::with_capacity(recipes.len());
    for r in &recipes {
        let detail = svc.db().recipe_detail(r.id)?;
        rows.push(RecipeRow {
            id: r.id,
            title: truncate(&r.title, 40),
            ingredients: detail.ingredients.len(),
        });
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

/// A Cooklang recipe reduced to what the grocery list needs.
#[derive(Debug)]
pub(crate) struct ParsedRecipe {
    pub title: Option<String>,
    pub lines: Vec<NewRecipeLine>,
}

/// Parse Cooklang source. Every ingredient occurrence becomes one line with
/// its quantity and unit as written; text quantities such as "a pinch" become
/// no quantity. Lines sharing a unit are summed later by the aggregator.
pub(crate) fn parse_cooklang(input: &str) -> Result<ParsedRecipe> {
    let (recipe, _report) = cooklang::parse(input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    let lines = recipe
        .ingredients
        .iter()
        .map(|ing| {
            let (quantity, unit_code) =
                ing.quantity
                    .as_ref()
                    .map_or((None, None), |qty: &cooklang::Quantity| {
                        let value = match qty.value() {
                            cooklang::Value::Number(n) => Some(n.value()),
                            cooklang::Value::Range { start, .. } => Some(start.value()),
                            cooklang::Value::Text(_) => None,
                        };
                        (value, qty.unit().map(String::from))
                    });
            NewRecipeLine {
                name: ing.display_name().to_string(),
                quantity,
                unit_code,
            }
        })
        .collect();

    Ok(ParsedRecipe {
        title: recipe.metadata.title().map(String::from),
        lines,
    })
}

pub(crate) fn cmd_recipe_import(
    svc: &BasketService,
    file: &std::path::Path,
    title_override: Option<String>,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let parsed = parse_cooklang(&input)?;

    let title = title_override
        .or(parsed.title)
        .or_else(|| file.file_stem().and_then(|s| s.to_str()).map(String::from))
        .context("Could not determine recipe title. Use --title to specify one")?;

    if parsed.lines.is_empty() {
        bail!("No ingredients found in recipe");
    }

    let detail = svc.import_recipe(&title, &parsed.lines)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        println!(
            "Imported recipe: {} ({} ingredients)",
            detail.title,
            detail.ingredients.len()
        );
    }
    Ok(())
}
