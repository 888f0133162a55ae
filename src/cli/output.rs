use colored::*;
use std::path::Path;

use crate::common::format::{self, format_path, format_size, format_size_colored};
use crate::duplicates::{DecisionLayout, DecisionSet, ScanReport, ScoredRecord};

fn display_id(id: &str) -> String {
    format_path(Path::new(id))
}

fn print_member(label: ColoredString, member: &ScoredRecord, keep: bool) {
    let path = display_id(&member.record.id);
    let path = if keep {
        path.green().to_string()
    } else {
        path.dimmed().to_string()
    };
    println!("      {} {}", label, path);
    println!(
        "          {}  •  sharpness {:.1}  •  {}  •  score {:.2}",
        format::format_resolution(member.record.width, member.record.height),
        member.record.sharpness,
        format_size(member.record.byte_len),
        member.score,
    );
}

/// Print scan results in human-readable format
pub fn print_scan_results(report: &ScanReport, detailed: bool) {
    println!();
    println!("  {} PhotoPrune Similar Photo Scan", "🖼️");
    println!("{}", "─".repeat(60).dimmed());
    println!(
        "  Fingerprinted {} of {} in {}  •  threshold {}",
        report.records_scanned.to_string().cyan(),
        format::format_count(report.images_seen),
        format::format_duration(report.duration_secs).cyan(),
        report.threshold,
    );
    println!("{}", "─".repeat(60).dimmed());
    println!();

    if !report.failures.is_empty() {
        println!(
            "  {} {} could not be read and were skipped",
            "⚠".yellow(),
            format::format_count(report.failures.len())
        );
        if detailed {
            for (id, err) in &report.failures {
                println!("      {} {}", display_id(id).dimmed(), err.to_string().dimmed());
            }
        }
        println!();
    }

    if report.groups.is_empty() {
        println!("  {} No similar photos found!", "✨");
        println!();
        return;
    }

    println!(
        "  {} {} ({} groups, {} to delete, {} reclaimable)",
        "●".yellow(),
        "Similar Photos".yellow().bold(),
        report.groups.len(),
        format::format_count(report.total_discards()),
        format_size_colored(report.total_reclaimable()),
    );
    println!();

    for (i, group) in report.groups.iter().enumerate() {
        println!(
            "    Group {} — {}, {} reclaimable",
            (i + 1).to_string().bold(),
            format::format_count(group.member_count()),
            format_size(group.reclaimable_bytes()),
        );

        if detailed {
            print_member("keep →".green(), &group.keeper, true);
            for member in &group.discard {
                print_member("  del →".red(), member, false);
            }
        } else {
            println!(
                "      {} {}",
                "keep →".dimmed(),
                display_id(&group.keeper.record.id).green()
            );
        }
        println!();
    }

    if !detailed {
        println!("      Run with {} to see every photo", "--detailed".cyan());
        println!();
    }
}

/// Print scan results as JSON: a summary plus the decision file content
pub fn print_scan_json(report: &ScanReport) {
    let json = serde_json::json!({
        "images_seen": report.images_seen,
        "records_scanned": report.records_scanned,
        "threshold": report.threshold,
        "duration_secs": report.duration_secs,
        "total_groups": report.groups.len(),
        "total_discards": report.total_discards(),
        "total_reclaimable": report.total_reclaimable(),
        "groups": report.groups.iter().map(|g| {
            serde_json::json!({
                "keeper": g.keeper,
                "discard": g.discard,
            })
        }).collect::<Vec<_>>(),
        "decisions": report.decisions,
        "errors": report.failures.iter().map(|(id, e)| {
            serde_json::json!({ "id": id, "error": e.to_string() })
        }).collect::<Vec<_>>(),
    });
    match serde_json::to_string_pretty(&json) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Error serializing: {}", e),
    }
}

pub fn print_scan_quiet(report: &ScanReport) {
    println!(
        "{}  {}  {}",
        report.groups.len(),
        report.total_discards(),
        format_size(report.total_reclaimable())
    );
}

/// Print a decision file review in human-readable format
pub fn print_plan(decisions: &DecisionSet, layout: DecisionLayout, source: &Path, detailed: bool) {
    let keep = decisions.keep_paths();
    let delete = decisions.delete_paths();

    println!();
    println!("  {} PhotoPrune Decision Plan", "📋");
    println!("{}", "─".repeat(60).dimmed());
    println!("  Source: {} ({} layout)", format_path(source).cyan(), layout);
    println!("{}", "─".repeat(60).dimmed());
    println!();

    if decisions.is_empty() {
        println!("  No groups in this decision file.");
        println!();
        return;
    }

    format_kv("Groups", &decisions.group_count().to_string());
    format_kv("To keep", &format::format_count(keep.len()));
    format_kv("To delete", &format::format_count(delete.len()));
    format_kv("Space to save", &decisions.space_savings().to_string());
    println!();

    if detailed {
        for (id, group) in decisions.iter() {
            println!(
                "    Group {} — {} kept, {} deleted, {} to save",
                id.bold(),
                group.keep.len(),
                group.delete.len(),
                group.space_savings(),
            );
            for entry in &group.keep {
                println!("      {} {}", "keep →".green(), display_id(&entry.path).green());
            }
            for entry in &group.delete {
                let size = entry.size.map(format_size).unwrap_or_else(|| "size unknown".to_string());
                println!(
                    "      {} {} ({})",
                    "  del →".red(),
                    display_id(&entry.path).dimmed(),
                    size
                );
            }
            println!();
        }
    } else {
        println!("      Run with {} to see every path", "--detailed".cyan());
        println!();
    }

    println!(
        "  {} This is a plan only. Nothing has been moved or deleted.",
        "ℹ".cyan()
    );
    println!();
}

pub fn print_plan_json(decisions: &DecisionSet, layout: DecisionLayout) {
    let savings = decisions.space_savings();
    let json = serde_json::json!({
        "layout": layout.to_string(),
        "groups": decisions.group_count(),
        "keep": decisions.keep_paths(),
        "delete": decisions.delete_paths(),
        "space_savings_bytes": savings.bytes(),
        "space_savings": savings.to_string(),
        "decisions": decisions,
    });
    match serde_json::to_string_pretty(&json) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Error serializing: {}", e),
    }
}

pub fn print_plan_quiet(decisions: &DecisionSet) {
    println!(
        "{}  {}  {}",
        decisions.group_count(),
        decisions.delete_paths().len(),
        decisions.space_savings()
    );
}

fn format_kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}
