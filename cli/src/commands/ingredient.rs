use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use basket_core::aisle::{classify, resolve_emoji};
use basket_core::service::BasketService;

use super::helpers::{exit_not_found, truncate};

pub(crate) fn cmd_ingredient_add(
    svc: &BasketService,
    name: &str,
    emoji: Option<&str>,
    json: bool,
) -> Result<()> {
    let ingredient = svc.add_ingredient(name, emoji)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let icon = resolve_emoji(&ingredient.name, ingredient.emoji.as_deref());
        println!(
            "Added ingredient: {icon} {} (id: {})",
            ingredient.name, ingredient.id
        );
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(
    svc: &BasketService,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "")]
        emoji: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Aisle")]
        aisle: String,
    }

    let ingredients = svc.list_ingredients(search)?;
    if ingredients.is_empty() {
        let message = match search {
            Some(q) => format!("No ingredients matching '{q}'"),
            None => "No ingredients found".to_string(),
        };
        if json {
            println!("[]");
            std::process::exit(2);
        }
        exit_not_found(&message, false);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
        return Ok(());
    }

    let rows: Vec<IngredientRow> = ingredients
        .iter()
        .map(|i| IngredientRow {
            id: i.id,
            emoji: resolve_emoji(&i.name, i.emoji.as_deref()).to_string(),
            name: truncate(&i.name, 35),
            aisle: classify(&i.name).to_string(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}
