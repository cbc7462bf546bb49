//! Terminal rendering of nutrition records.

use colored::*;
use macrolog::NutritionRecord;

const FOOD_WIDTH: usize = 24;
const QUANTITY_WIDTH: usize = 16;

/// Format a record as an aligned table
pub fn format_record(record: &NutritionRecord) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{:<fw$} {:<qw$} {:>8} {:>9} {:>9} {:>9}\n",
        "Food",
        "Quantity",
        "kcal",
        "Protein",
        "Carbs",
        "Fat",
        fw = FOOD_WIDTH,
        qw = QUANTITY_WIDTH
    ));

    for item in &record.items {
        out.push_str(&format!(
            "{:<fw$} {:<qw$} {:>8.0} {:>8.1}g {:>8.1}g {:>8.1}g\n",
            clip(&item.food, FOOD_WIDTH),
            clip(&item.quantity, QUANTITY_WIDTH),
            item.macros.calories,
            item.macros.protein,
            item.macros.carbs,
            item.macros.fat,
            fw = FOOD_WIDTH,
            qw = QUANTITY_WIDTH
        ));
    }

    out.push_str(&"-".repeat(FOOD_WIDTH + QUANTITY_WIDTH + 40));
    out.push('\n');

    let totals = &record.totals;
    out.push_str(&format!(
        "{:<fw$} {:<qw$} {:>8.0} {:>8.1}g {:>8.1}g {:>8.1}g\n",
        "Total",
        "",
        totals.calories,
        totals.protein,
        totals.carbs,
        totals.fat,
        fw = FOOD_WIDTH,
        qw = QUANTITY_WIDTH
    ));

    out
}

/// Print a record table with a highlighted header and totals row
pub fn print_record(record: &NutritionRecord) {
    let table = format_record(record);
    let lines: Vec<&str> = table.lines().collect();
    let last = lines.len().saturating_sub(1);

    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("{}", line.bold());
        } else if i == last {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line);
        }
    }
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width - 1).collect();
        format!("{}…", kept)
    }
}
