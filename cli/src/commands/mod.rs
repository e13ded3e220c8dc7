mod helpers;
mod ingredient;
mod list;
mod plan;
mod recipe;

pub(crate) use ingredient::{cmd_ingredient_add, cmd_ingredient_list};
pub(crate) use list::{
    cmd_list_add, cmd_list_check, cmd_list_clear_checked, cmd_list_export, cmd_list_remove,
    cmd_list_share, cmd_list_show, cmd_list_sync,
};
pub(crate) use plan::{cmd_plan_clear, cmd_plan_set, cmd_plan_show};
pub(crate) use recipe::{
    cmd_recipe_add_ingredient, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_import,
    cmd_recipe_list, cmd_recipe_remove_ingredient, cmd_recipe_show,
};
