use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use basket_core::models::NewManualItem;
use basket_core::present::{ItemView, SortMode, format_quantity};
use basket_core::service::BasketService;

use super::helpers::{exit_not_found, parse_quantity, parse_week, truncate};

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "")]
    emoji: String,
    #[tabled(rename = "Item")]
    name: String,
    #[tabled(rename = "Qty")]
    quantity: String,
    #[tabled(rename = "Aisle")]
    aisle: String,
}

fn item_rows(items: &[ItemView]) -> Vec<ItemRow> {
    items
        .iter()
        .map(|v| ItemRow {
            id: v.item.id,
            emoji: v.emoji.clone(),
            name: truncate(&v.name, 35),
            quantity: [
                format_quantity(v.item.quantity),
                v.item.unit_code.clone().unwrap_or_default(),
            ]
            .join(" ")
            .trim()
            .to_string(),
            aisle: v.aisle.to_string(),
        })
        .collect()
}

fn print_items(items: &[ItemView]) {
    let table = Table::new(item_rows(items))
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn cmd_list_show(
    svc: &BasketService,
    week: Option<&str>,
    sort: &str,
    json: bool,
) -> Result<()> {
    let window = parse_week(week)?;
    let sort = SortMode::parse(sort)?;
    let view = svc.list_view(&window, sort)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{} ({window})", view.list.title);
    if view.unchecked.is_empty() && view.checked.is_empty() {
        println!("  (empty; run `basket list sync` after planning meals)");
        return Ok(());
    }
    if !view.unchecked.is_empty() {
        print_items(&view.unchecked);
    }
    if !view.checked.is_empty() {
        println!("\nChecked:");
        print_items(&view.checked);
    }
    Ok(())
}

pub(crate) fn cmd_list_sync(
    svc: &BasketService,
    week: Option<&str>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let window = parse_week(week)?;

    if dry_run {
        let preview = svc.preview_sync(&window)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        } else {
            let plan = &preview.plan;
            println!(
                "Dry run for {window}: {} to add, {} to update, {} to remove",
                plan.inserts.len(),
                plan.updates.len(),
                plan.deletes.len()
            );
            if preview.skipped_lines > 0 {
                println!("  {} recipe lines reference missing ingredients", preview.skipped_lines);
            }
        }
        return Ok(());
    }

    let report = svc.sync_week(&window)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.changed() {
        println!(
            "Synced {window}: {} added, {} updated, {} removed",
            report.inserted, report.updated, report.deleted
        );
    } else {
        println!("{window} is already up to date ({} items)", report.desired);
    }
    if report.skipped_lines > 0 && !json {
        eprintln!(
            "Warning: skipped {} recipe lines with missing ingredients",
            report.skipped_lines
        );
    }
    Ok(())
}

pub(crate) fn cmd_list_add(
    svc: &BasketService,
    week: Option<&str>,
    text: &str,
    qty: Option<&str>,
    unit: Option<&str>,
    json: bool,
) -> Result<()> {
    let window = parse_week(week)?;
    let item = svc.add_manual_item(
        &window,
        &NewManualItem {
            text: text.to_string(),
            quantity: parse_quantity(qty)?,
            unit_code: unit.map(String::from),
        },
    )?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("Added to {window}: {} (id: {})", text.trim(), item.id);
    }
    Ok(())
}

pub(crate) fn cmd_list_check(svc: &BasketService, id: i64, checked: bool, json: bool) -> Result<()> {
    if svc.find_item(id)?.is_none() {
        exit_not_found(&format!("Item {id} not found"), json);
    }
    let item = svc.set_item_checked(id, checked)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else if checked {
        println!("Checked item {id}");
    } else {
        println!("Unchecked item {id}");
    }
    Ok(())
}

pub(crate) fn cmd_list_remove(svc: &BasketService, id: i64, json: bool) -> Result<()> {
    if svc.find_item(id)?.is_none() {
        exit_not_found(&format!("Item {id} not found"), json);
    }
    svc.remove_item(id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Removed item {id}");
    }
    Ok(())
}

pub(crate) fn cmd_list_clear_checked(
    svc: &BasketService,
    week: Option<&str>,
    json: bool,
) -> Result<()> {
    let window = parse_week(week)?;
    let removed = svc.clear_checked(&window)?;
    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!("Removed {removed} checked items from {window}");
    }
    Ok(())
}

pub(crate) fn cmd_list_share(svc: &BasketService, week: Option<&str>, json: bool) -> Result<()> {
    let window = parse_week(week)?;
    let text = svc.share_text(&window)?;
    if json {
        println!("{}", serde_json::json!({ "week": window, "text": text }));
    } else {
        print!("{text}");
    }
    Ok(())
}

pub(crate) fn cmd_list_export(
    svc: &BasketService,
    week: Option<&str>,
    path: &std::path::Path,
    json: bool,
) -> Result<()> {
    let window = parse_week(week)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    svc.export_csv(&window, file)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "week": window, "path": path.display().to_string() })
        );
    } else {
        println!("Exported {window} to {}", path.display());
    }
    Ok(())
}
