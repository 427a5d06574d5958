use ghgcalc_core::aggregate::Bucket;
use ghgcalc_core::factors::schema::EmissionFactor;
use ghgcalc_core::matching::{MatchStatus, MatchedRow};
use ghgcalc_core::trace::{TraceBundle, TraceSeverity};
use ghgcalc_core::EmissionReport;
use std::fmt::Display;

pub fn print_matches(rows: &[MatchedRow]) {
    if rows.is_empty() {
        println!("  (no activity rows)");
        return;
    }

    let key_width = rows
        .iter()
        .map(|r| r.suggested_factor_key.chars().count())
        .max()
        .unwrap_or(10)
        .max(10);

    println!(
        "  {:>4}  {:<width$}  {:>12}  {:<14}  Status",
        "Row",
        "Factor key",
        "Factor",
        "Unit",
        width = key_width
    );
    println!("  {}", "-".repeat(key_width + 54));

    for (i, row) in rows.iter().enumerate() {
        let marker = match row.status {
            MatchStatus::Unmatched => " (!)",
            _ => "",
        };
        println!(
            "  {:>4}  {:<width$}  {:>12}  {:<14}  {}{}",
            i,
            row.suggested_factor_key,
            row.factor.value.to_string(),
            row.factor.unit,
            row.status,
            marker,
            width = key_width
        );
    }
}

pub fn print_report(report: &EmissionReport) {
    let s = &report.summary;

    println!("=== Emissions by row ===\n");
    for (i, row) in report.rows.iter().enumerate() {
        let a = &row.row.activity;
        println!(
            "  {:>4}  {:<28} {:<24} {:>14} {:<6} x {:>10} = {:>14.4} kg  {:>12.2} t  {}",
            i,
            a.subcategory,
            a.source,
            a.activity_quantity.to_string(),
            a.unit_of_measure,
            row.row.factor.value.to_string(),
            row.emission.emission_kg,
            row.emission.emission_tonnes,
            row.emission.scope
        );
    }

    println!("\n=== Summary ===\n");
    println!("  Total: {:.2} tCO2e ({:.4} kg)", s.total_tonnes, s.total_kg);
    println!(
        "  Rows: {} ({} matched, {} unmatched, {} manual override)\n",
        s.row_count, s.matched_count, s.unmatched_count, s.overridden_count
    );

    print_buckets("By scope", &s.by_scope);
    print_buckets("By greenhouse gas", &s.by_ghg);
    print_buckets("By subcategory", &s.by_subcategory);
}

fn print_buckets<K: Display>(title: &str, buckets: &[Bucket<K>]) {
    println!("  {title}:");
    let width = buckets
        .iter()
        .map(|b| b.key.to_string().chars().count())
        .max()
        .unwrap_or(8);
    for b in buckets {
        println!(
            "    {:<width$}  {:>14.2} t  {:>6.2}%",
            b.key.to_string(),
            b.tonnes,
            b.percent,
            width = width
        );
    }
    println!();
}

pub fn print_trace(trace: &TraceBundle) {
    println!("=== Calculation trace ===\n");
    for entry in &trace.entries {
        println!("  [{}] {} / {}", entry.entry_id, entry.subcategory, entry.source);
        for step in &entry.steps {
            println!("    {}", step.message);
        }
        println!();
    }

    if !trace.warnings.is_empty() {
        println!("  Warnings:");
        for w in &trace.warnings {
            let level = match w.severity {
                TraceSeverity::Important => "!",
                TraceSeverity::Info => "-",
            };
            match w.row {
                Some(row) => println!("    {level} row {row}: {}", w.message),
                None => println!("    {level} {}", w.message),
            }
        }
        println!();
    }
}

pub fn print_factors<'a>(factors: impl Iterator<Item = &'a EmissionFactor>) {
    let mut factors: Vec<&EmissionFactor> = factors.collect();
    factors.sort_by(|a, b| a.key.cmp(&b.key));

    let key_width = factors
        .iter()
        .map(|f| f.key.chars().count())
        .max()
        .unwrap_or(20);

    for f in &factors {
        println!(
            "  {:<width$}  {:>10}  {:<14}  {}",
            f.key,
            f.factor.to_string(),
            f.unit,
            f.ghg_type,
            width = key_width
        );
    }
}
