use anyhow::{Context, Result, bail};
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutritrack_core::grocery::write_csv;

use super::helpers::{Service, format_quantity, not_found, print_json, resolve_id, short_id};

pub(crate) fn cmd_grocery_list(svc: &Service, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct GroceryRow {
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "Unit")]
        unit: String,
    }

    let list = svc.grocery_list()?;
    if json {
        return print_json(&list);
    }

    if list.generated.is_empty() {
        println!("Nothing planned. Add meals with `nutritrack plan add`.");
    } else {
        let rows: Vec<GroceryRow> = list
            .generated
            .iter()
            .map(|i| GroceryRow {
                name: i.name.clone(),
                quantity: format_quantity(i.quantity),
                unit: i.unit.clone(),
            })
            .collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::single(1)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    if !list.manual.is_empty() {
        println!("\n  Also buy:");
        for item in &list.manual {
            let mark = if item.completed { "x" } else { " " };
            let id = short_id(&item.id);
            let text = &item.text;
            println!("    [{mark}] {text} ({id})");
        }
    }
    Ok(())
}

pub(crate) fn cmd_grocery_add(svc: &mut Service, text: &str, json: bool) -> Result<()> {
    if text.trim().is_empty() {
        bail!("Item text must not be empty");
    }
    let Some(item) = svc.add_manual_item(text)? else {
        bail!("Item text must not be empty");
    };
    if json {
        return print_json(&item);
    }
    let t = &item.text;
    let id = short_id(&item.id);
    println!("Added '{t}' ({id})");
    Ok(())
}

pub(crate) fn cmd_grocery_toggle(svc: &mut Service, id: &str, json: bool) -> Result<()> {
    let items = svc.manual_items()?;
    let Some(full_id) = resolve_id(items.iter().map(|i| i.id.as_str()), id)? else {
        not_found(&format!("Item {id} not found"), json);
    };
    let Some(item) = svc.toggle_manual_item(&full_id)? else {
        not_found(&format!("Item {id} not found"), json);
    };
    if json {
        return print_json(&item);
    }
    let t = &item.text;
    let state = if item.completed { "done" } else { "not done" };
    println!("Marked '{t}' as {state}");
    Ok(())
}

pub(crate) fn cmd_grocery_delete(svc: &mut Service, id: &str, json: bool) -> Result<()> {
    let items = svc.manual_items()?;
    let Some(full_id) = resolve_id(items.iter().map(|i| i.id.as_str()), id)? else {
        not_found(&format!("Item {id} not found"), json);
    };
    if !svc.delete_manual_item(&full_id)? {
        not_found(&format!("Item {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": full_id }));
    } else {
        println!("Deleted item {full_id}");
    }
    Ok(())
}

/// Write the generated list as CSV to `output`, or stdout when absent.
/// With `json` the list is printed as JSON instead.
pub(crate) fn cmd_grocery_export(svc: &Service, output: Option<&Path>, json: bool) -> Result<()> {
    let items = svc.generated_grocery_items()?;
    if json {
        return print_json(&items);
    }
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(&items, file)?;
            eprintln!("Wrote {} item(s) to {}", items.len(), path.display());
        }
        None => write_csv(&items, std::io::stdout().lock())?,
    }
    Ok(())
}
