mod ai;
mod check;
mod goals;
mod grocery;
mod helpers;
mod log;
mod meal;
mod plan;
mod summary;

pub(crate) use ai::{cmd_ai_recipe, cmd_ai_suggest};
pub(crate) use check::cmd_check;
pub(crate) use goals::{cmd_goals_set, cmd_goals_show};
pub(crate) use grocery::{
    cmd_grocery_add, cmd_grocery_delete, cmd_grocery_export, cmd_grocery_list, cmd_grocery_toggle,
};
pub(crate) use helpers::Service;
pub(crate) use log::{cmd_log, cmd_unlog};
pub(crate) use meal::{
    MacroInput, cmd_meal_add, cmd_meal_delete, cmd_meal_edit, cmd_meal_list, cmd_meal_show,
};
pub(crate) use plan::{cmd_plan_add, cmd_plan_clear, cmd_plan_remove, cmd_plan_show};
pub(crate) use summary::{cmd_history, cmd_summary};
