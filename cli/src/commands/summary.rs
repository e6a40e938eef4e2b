use anyhow::Result;
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutritrack_core::models::{DailySummary, MacroProgress};

use super::helpers::{Service, no_neg_zero, parse_date, print_json, short_id};

pub(crate) fn cmd_summary(svc: &Service, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = svc.daily_summary(date)?;

    if json {
        return print_json(&summary);
    }

    if summary.entries.is_empty() {
        let date = &summary.date;
        eprintln!("No entries for {date}");
        print_progress(&summary);
        process::exit(2);
    }

    let date = &summary.date;
    println!("=== {date} ===\n");

    for e in &summary.entries {
        let id = short_id(&e.id);
        let name = &e.meal_name;
        let servings = e.servings;
        let time = e.timestamp.get(11..16).unwrap_or("");
        println!(
            "  [{id}] {time} {name} x{servings} — {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
            e.calories, e.protein, e.carbs, e.fat
        );
    }
    println!();

    let t = &summary.totals;
    println!(
        "  TOTAL: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        t.calories, t.protein, t.carbs, t.fat
    );
    print_progress(&summary);
    Ok(())
}

fn print_progress(summary: &DailySummary) {
    let g = &summary.goals;
    println!(
        "  GOAL: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        g.calories, g.protein, g.carbs, g.fat
    );
    let p = &summary.progress;
    println!(
        "  REMAINING: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        no_neg_zero(p.calories.remaining),
        no_neg_zero(p.protein.remaining),
        no_neg_zero(p.carbs.remaining),
        no_neg_zero(p.fat.remaining)
    );
    println!();
    for (label, m) in [
        ("Calories", &p.calories),
        ("Protein", &p.protein),
        ("Carbs", &p.carbs),
        ("Fat", &p.fat),
    ] {
        println!("  {label:<9} {}", progress_bar(m, 20));
    }
}

/// Fixed-width text bar, e.g. `[##########----------]  50%`.
fn progress_bar(m: &MacroProgress, width: usize) -> String {
    #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((m.percent / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    let marker = if m.over { " over" } else { "" };
    format!(
        "[{}{}] {:>3.0}%{marker}",
        "#".repeat(filled),
        "-".repeat(width - filled),
        m.percent
    )
}

pub(crate) fn cmd_history(svc: &Service, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Meals")]
        count: usize,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let today = Local::now().date_naive();
    let history = svc.history(today, days)?;

    if json {
        return print_json(&history);
    }

    if history.iter().all(|d| d.totals.count == 0) {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .map(|d| {
            let t = &d.totals;
            HistoryRow {
                date: d.date.clone(),
                count: t.count,
                calories: format!("{:.0}", no_neg_zero(t.calories)),
                protein: format!("{:.0}g", no_neg_zero(t.protein)),
                carbs: format!("{:.0}g", no_neg_zero(t.carbs)),
                fat: format!("{:.0}g", no_neg_zero(t.fat)),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
