use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::aggregate::DesiredState;
use crate::models::{ItemKey, NewAutoItem, QuantityUpdate, ShoppingListItem};
use crate::ports::ListStore;

/// Quantities closer than this are considered equal.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// The writes needed to bring a list's auto items in line with a desired state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcilePlan {
    pub inserts: Vec<NewAutoItem>,
    pub updates: Vec<QuantityUpdate>,
    pub deletes: Vec<i64>,
}

impl ReconcilePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}

fn quantity_differs(persisted: Option<f64>, desired: Option<f64>) -> bool {
    (persisted.unwrap_or(0.0) - desired.unwrap_or(0.0)).abs() > QUANTITY_EPSILON
}

/// Diff a list's current items against the desired state.
///
/// Manual items are never touched. Checked auto items are never updated or
/// deleted. When several auto items share a key, the lowest-id checked one (or
/// failing that the lowest-id unchecked one) represents the key and the other
/// unchecked copies are deleted.
#[must_use]
pub fn plan(desired: &DesiredState, items: &[ShoppingListItem]) -> ReconcilePlan {
    let mut by_key: BTreeMap<ItemKey, Vec<&ShoppingListItem>> = BTreeMap::new();
    for item in items {
        if let Some(key) = item.key() {
            by_key.entry(key).or_default().push(item);
        }
    }

    let mut out = ReconcilePlan::default();
    let mut representatives: BTreeMap<ItemKey, &ShoppingListItem> = BTreeMap::new();
    for (key, mut group) in by_key {
        group.sort_by_key(|item| (!item.checked, item.id));
        let Some((&first, rest)) = group.split_first() else {
            continue;
        };
        out.deletes
            .extend(rest.iter().filter(|dup| !dup.checked).map(|dup| dup.id));
        representatives.insert(key, first);
    }

    for (key, &quantity) in &desired.quantities {
        match representatives.get(key) {
            None => out.inserts.push(NewAutoItem {
                ingredient_id: key.ingredient_id,
                quantity,
                unit_code: key.unit_code.clone(),
            }),
            Some(existing) if existing.checked => {}
            Some(existing) => {
                if quantity_differs(existing.quantity, quantity) {
                    out.updates.push(QuantityUpdate {
                        item_id: existing.id,
                        quantity,
                    });
                }
            }
        }
    }

    for (key, existing) in &representatives {
        if !existing.checked && !desired.contains(key) {
            out.deletes.push(existing.id);
        }
    }
    out.deletes.sort_unstable();
    out
}

/// Write a plan: inserts, then updates, then deletes.
///
/// A failure part way leaves the list valid but stale; rerunning the whole
/// pass converges.
pub fn apply(store: &dyn ListStore, list_id: i64, plan: &ReconcilePlan) -> Result<()> {
    if !plan.inserts.is_empty() {
        store
            .insert_auto_items(list_id, &plan.inserts)
            .context("Failed to insert list items")?;
    }
    if !plan.updates.is_empty() {
        store
            .update_quantities(&plan.updates)
            .context("Failed to update list quantities")?;
    }
    if !plan.deletes.is_empty() {
        store
            .delete_items(&plan.deletes)
            .context("Failed to prune list items")?;
    }
    debug!(
        list_id,
        inserted = plan.inserts.len(),
        updated = plan.updates.len(),
        deleted = plan.deletes.len(),
        "applied reconcile plan"
    );
    Ok(())
}
