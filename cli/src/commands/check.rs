use anyhow::Result;

use super::helpers::{Service, print_json};

/// Report plan and log references to deleted meals. Read-only.
pub(crate) fn cmd_check(svc: &Service, json: bool) -> Result<()> {
    let report = svc.integrity_report()?;
    if json {
        return print_json(&report);
    }

    for (key, updated_at) in svc.store().keys()? {
        println!("  {key} (updated {updated_at})");
    }
    println!();

    if report.is_clean() {
        println!("No dangling references");
        return Ok(());
    }
    if !report.dangling_plan_entries.is_empty() {
        let n = report.dangling_plan_entries.len();
        println!("Plan entries for deleted meals, skipped in the grocery list ({n}):");
        for id in &report.dangling_plan_entries {
            println!("    {id}");
        }
    }
    if !report.orphaned_log_entries.is_empty() {
        let n = report.orphaned_log_entries.len();
        println!("Log entries whose meal was deleted, still counted in totals ({n}):");
        for id in &report.orphaned_log_entries {
            println!("    {id}");
        }
    }
    println!("\nRemove stale plan entries with `nutritrack plan remove <id>`.");
    Ok(())
}
