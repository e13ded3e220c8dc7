use std::collections::HashMap;

use anyhow::{Result, bail};
use tabled::{Table, Tabled, settings::Style};

use basket_core::models::{MealLocation, MealSlot, PlannedMeal, WeekWindow};
use basket_core::service::BasketService;

use super::helpers::{exit_not_found, parse_date, parse_week, truncate};

pub(crate) fn cmd_plan_set(
    svc: &BasketService,
    date: &str,
    meal: &str,
    recipe: Option<&str>,
    outside: Option<&str>,
    json: bool,
) -> Result<()> {
    let date = parse_date(Some(date))?;
    let meal = MealSlot::parse(meal)?;

    let planned = match (recipe, outside) {
        (Some(title), None) => {
            if svc.find_recipe(title)?.is_none() {
                exit_not_found(&format!("Recipe '{title}' not found"), json);
            }
            svc.plan_home_meal(date, meal, Some(title))?
        }
        (None, Some(name)) => svc.plan_outside_meal(date, meal, Some(name))?,
        _ => bail!("Specify exactly one of --recipe or --outside"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
    } else {
        let what = recipe.or(outside).unwrap_or_default();
        let place = planned.location.as_str();
        println!("Planned {meal} on {date} ({place}): {what}");
    }
    Ok(())
}

pub(crate) fn cmd_plan_clear(svc: &BasketService, date: &str, meal: &str, json: bool) -> Result<()> {
    let date = parse_date(Some(date))?;
    let meal = MealSlot::parse(meal)?;
    if !svc.clear_meal(date, meal)? {
        exit_not_found(&format!("No {meal} planned on {date}"), json);
    }
    if json {
        println!(
            "{}",
            serde_json::json!({ "cleared": { "date": date, "meal": meal } })
        );
    } else {
        println!("Cleared {meal} on {date}");
    }
    Ok(())
}

fn describe_meal(meal: &PlannedMeal, titles: &HashMap<i64, String>) -> String {
    match &meal.location {
        MealLocation::Home {
            recipe_id: Some(id),
        } => titles
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("recipe #{id}")),
        MealLocation::Home { recipe_id: None } => "-".to_string(),
        MealLocation::Outside { name } => name.clone().unwrap_or_else(|| "-".to_string()),
    }
}

/// Days of the week with no meal planned, as short weekday names.
fn unplanned_days(window: &WeekWindow, meals: &[PlannedMeal]) -> Vec<String> {
    window
        .days()
        .filter(|day| !meals.iter().any(|m| m.plan_date == *day))
        .map(|day| day.format("%a").to_string())
        .collect()
}

pub(crate) fn cmd_plan_show(svc: &BasketService, week: Option<&str>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Where")]
        location: String,
        #[tabled(rename = "What")]
        what: String,
    }

    let window = parse_week(week)?;
    let meals = svc.week_plan(&window)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "week": window,
                "meals": meals,
            }))?
        );
        return Ok(());
    }

    println!("Meal plan: {window}");
    if meals.is_empty() {
        println!("  (nothing planned)");
        return Ok(());
    }

    let titles: HashMap<i64, String> = svc
        .list_recipes()?
        .into_iter()
        .map(|r| (r.id, r.title))
        .collect();

    let rows: Vec<PlanRow> = meals
        .iter()
        .map(|m| PlanRow {
            date: m.plan_date.format("%a %b %-d").to_string(),
            meal: m.meal.to_string(),
            location: m.location.as_str().to_string(),
            what: truncate(&describe_meal(m, &titles), 40),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");

    let free = unplanned_days(&window, &meals);
    if !free.is_empty() {
        println!("Nothing planned: {}", free.join(", "));
    }
    Ok(())
}
