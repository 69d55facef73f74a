// Command handling and plain-text rendering

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use crossterm::style::Stylize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{Cli, Commands};
use crate::adaptation::{
    AdaptationController, AdaptationPreview, ApplyOutcome, BenchmarkReport, WeightHistoryEntry,
    WeightSuggestion,
};
use crate::audit::{
    hash_prompt, AuditRecord, LineStatus, Outcome, OutcomeUpdate, PartitionReport, ReviewCycle,
};
use crate::config::default_config_path;
use crate::critique::{compute_composite_score, merge_critiques, Critique, MergeResult};
use crate::reflection::{Aggregator, ReflectionReport};

/// Parse `id=reason` for `--reason`
pub fn parse_reason(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((id, reason)) if !id.trim().is_empty() => {
            Ok((id.trim().to_string(), reason.trim().to_string()))
        }
        _ => Err(format!("expected id=reason, got '{}'", raw)),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let controller = AdaptationController::open(config_path)?;
    let json = cli.json;

    match cli.command {
        Commands::Merge {
            critiques,
            project,
            prompt_file,
            prompt_hash,
            priority,
            cost,
            duration_ms,
            dry_run,
        } => {
            let prompt_hash = match (prompt_hash, prompt_file) {
                (Some(hash), _) => hash,
                (None, Some(path)) => {
                    let prompt = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read prompt {}", path.display()))?;
                    hash_prompt(&prompt)
                }
                (None, None) => bail!("one of --prompt-file or --prompt-hash is required"),
            };
            cmd_merge(
                &controller,
                &critiques,
                &project,
                &prompt_hash,
                priority,
                cost,
                duration_ms,
                dry_run,
                json,
            )
        }
        Commands::Outcome {
            outcome,
            prompt_hash,
            date,
            accepted,
            rejected,
            reasons,
        } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let update = OutcomeUpdate {
                accepted_ids: accepted,
                rejected_ids: rejected,
                rejection_reasons: if reasons.is_empty() {
                    None
                } else {
                    Some(reasons.into_iter().collect())
                },
            };
            cmd_outcome(&controller, date, &prompt_hash, outcome, &update, json)
        }
        Commands::Verify { date } => cmd_verify(&controller, date, json),
        Commands::Reflect { days } => {
            let config = controller.config_store().load()?;
            let days = days.unwrap_or(config.reflection.window_days);
            let (report, _) = Aggregator::new(controller.audit_store(), config.reflection)
                .reflect(days)
                .context("Failed to load audit window")?;
            if json {
                print_json(&report)
            } else {
                print!("{}", format_reflection(&report));
                Ok(())
            }
        }
        Commands::Preview { days } => {
            let days = resolve_days(&controller, days)?;
            let preview = controller.preview(days)?;
            if json {
                print_json(&preview)
            } else {
                print!("{}", format_preview(&preview));
                Ok(())
            }
        }
        Commands::Apply { days } => {
            let days = resolve_days(&controller, days)?;
            let outcome = controller.apply(days)?;
            if json {
                print_json(&outcome)
            } else {
                print!("{}", format_apply(&outcome));
                Ok(())
            }
        }
        Commands::History { limit } => {
            let entries = controller.history(Some(limit))?;
            if json {
                print_json(&entries)
            } else {
                print!("{}", format_history(&entries));
                Ok(())
            }
        }
        Commands::Benchmark { days } => {
            let days = resolve_days(&controller, days)?;
            let report = controller.benchmark(days)?;
            if json {
                print_json(&report)
            } else {
                print!("{}", format_benchmark(&report));
                Ok(())
            }
        }
    }
}

fn resolve_days(controller: &AdaptationController, days: Option<u32>) -> Result<u32> {
    match days {
        Some(days) => Ok(days),
        None => Ok(controller.config_store().load()?.reflection.window_days),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_merge(
    controller: &AdaptationController,
    critiques_path: &Path,
    project: &str,
    prompt_hash: &str,
    priority: Vec<String>,
    cost: f64,
    duration_ms: u64,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let raw = fs::read_to_string(critiques_path)
        .with_context(|| format!("Failed to read critiques {}", critiques_path.display()))?;
    let critiques: Vec<Critique> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse critiques {}", critiques_path.display()))?;

    let config = controller.config_store().load()?;
    let priority = if priority.is_empty() {
        config.merge.priority.clone()
    } else {
        priority
    };

    let merged = merge_critiques(&critiques, &priority);
    let composite = compute_composite_score(&critiques, &config.scoring.weights);

    let mut record = AuditRecord::from_review(ReviewCycle {
        project,
        prompt_hash,
        reviewers_active: critiques.iter().map(|c| c.reviewer_role.clone()).collect(),
        merge: &merged,
        scores: composite.scores.clone(),
        composite_score: composite.composite,
        cost,
        duration_ms,
    });

    // A failed audit write never fails the review itself
    let recorded = !dry_run && controller.audit_store().append_best_effort(&mut record);

    if json {
        #[derive(Serialize)]
        struct MergeOutput<'a> {
            merge: &'a MergeResult,
            composite_score: Option<f64>,
            prompt_hash: &'a str,
            recorded: bool,
        }
        return print_json(&MergeOutput {
            merge: &merged,
            composite_score: composite.composite,
            prompt_hash,
            recorded,
        });
    }

    print!("{}", format_merge(&merged, composite.composite, &priority));
    if recorded {
        println!("Recorded as {} on {}", prompt_hash, record.date_key());
    } else if !dry_run {
        eprintln!("{}", "Warning: audit record was not written".yellow());
    }
    Ok(())
}

fn cmd_outcome(
    controller: &AdaptationController,
    date: NaiveDate,
    prompt_hash: &str,
    outcome: Outcome,
    update: &OutcomeUpdate,
    json: bool,
) -> Result<()> {
    let updated = controller
        .audit_store()
        .update_outcome(date, prompt_hash, outcome, update)
        .with_context(|| format!("Failed to record outcome for {}", prompt_hash))?;

    if json {
        return print_json(&serde_json::json!({
            "date": date.to_string(),
            "prompt_hash": prompt_hash,
            "outcome": outcome,
            "updated": updated,
        }));
    }
    if updated {
        println!("Recorded '{}' for {} ({})", outcome, prompt_hash, date);
    } else {
        println!(
            "No pending review for {} on {}; nothing changed",
            prompt_hash, date
        );
    }
    Ok(())
}

fn cmd_verify(
    controller: &AdaptationController,
    date: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let store = controller.audit_store();
    let dates = match date {
        Some(date) => vec![date],
        None => store.partition_dates()?,
    };

    let mut reports = Vec::with_capacity(dates.len());
    for date in dates {
        reports.push(
            store
                .verify_partition(date)
                .with_context(|| format!("Failed to verify partition {}", date))?,
        );
    }

    if json {
        let value: Vec<serde_json::Value> = reports.iter().map(report_json).collect();
        print_json(&value)?;
    } else {
        print!("{}", format_verify(&reports));
    }

    let tampered: usize = reports
        .iter()
        .map(|r| r.count(|s| matches!(s, LineStatus::Tampered(_))))
        .sum();
    if tampered > 0 {
        bail!("{} record(s) failed integrity verification", tampered);
    }
    Ok(())
}

fn report_json(report: &PartitionReport) -> serde_json::Value {
    let lines: Vec<serde_json::Value> = report
        .lines
        .iter()
        .map(|(line, status)| {
            let (status, detail) = match status {
                LineStatus::Valid => ("valid", None),
                LineStatus::Unhashed => ("unhashed", None),
                LineStatus::Tampered(e) => ("tampered", Some(e.to_string())),
                LineStatus::Malformed(e) => ("malformed", Some(e.clone())),
            };
            serde_json::json!({ "line": line, "status": status, "detail": detail })
        })
        .collect();
    serde_json::json!({
        "date": report.date.to_string(),
        "clean": report.is_clean(),
        "lines": lines,
    })
}

// ── Rendering ───────────────────────────────────────────────────────────────

pub fn format_merge(merged: &MergeResult, composite: Option<f64>, priority: &[String]) -> String {
    if merged.no_changes {
        return "No changes: every reviewer reported no issues\n".to_string();
    }

    let mut output = format!(
        "Merged plan: {} ops, {} conflicts, max severity {}\n",
        merged.ops.len(),
        merged.conflicts.len(),
        merged.severity_max
    );
    match composite {
        Some(score) => output.push_str(&format!("Composite score: {:.2}\n", score)),
        None => output.push_str("Composite score: n/a\n"),
    }

    for (i, op) in merged.ops.iter().enumerate() {
        output.push_str(&format!(
            "  {:>2}. [{}] {} {} → {} ({}/{})\n",
            i + 1,
            op.severity,
            op.op.op.as_str(),
            op.op.target,
            op.op.value,
            op.role,
            op.finding_id
        ));
    }

    if !merged.conflicts.is_empty() {
        output.push_str("\nConflicts:\n");
        for conflict in &merged.conflicts {
            output.push_str(&format!(
                "  {} '{}': {} adds, {} removes; {} prevails\n",
                conflict.target,
                conflict.value,
                conflict.addition.role,
                conflict.removal.role,
                conflict.winner(priority)
            ));
        }
    }
    output
}

pub fn format_verify(reports: &[PartitionReport]) -> String {
    if reports.is_empty() {
        return "No audit partitions found\n".to_string();
    }

    let mut output = String::new();
    for report in reports {
        let valid = report.count(|s| matches!(s, LineStatus::Valid));
        let unhashed = report.count(|s| matches!(s, LineStatus::Unhashed));
        let tampered = report.count(|s| matches!(s, LineStatus::Tampered(_)));
        let malformed = report.count(|s| matches!(s, LineStatus::Malformed(_)));

        let label = if report.is_clean() {
            "ok".green()
        } else {
            "FAILED".red()
        };
        output.push_str(&format!(
            "{} {}: {} valid, {} unhashed, {} tampered, {} malformed\n",
            report.date, label, valid, unhashed, tampered, malformed
        ));
        for (line, status) in &report.lines {
            match status {
                LineStatus::Tampered(e) => {
                    output.push_str(&format!("    line {}: {}\n", line, e))
                }
                LineStatus::Malformed(e) => {
                    output.push_str(&format!("    line {}: malformed ({})\n", line, e))
                }
                _ => {}
            }
        }
    }
    output
}

pub fn format_reflection(report: &ReflectionReport) -> String {
    let mut output = format!(
        "Reflection over {} days: {} records, {} with outcomes",
        report.window_days, report.total_records, report.outcome_records
    );
    if report.skipped > 0 || report.malformed > 0 {
        output.push_str(&format!(
            " ({} failed verification, {} malformed)",
            report.skipped, report.malformed
        ));
    }
    output.push('\n');

    if !report.sufficient_data {
        output.push_str("Insufficient data for reviewer metrics\n");
        return output;
    }

    output.push_str(&format!(
        "\n  {:<20} {:>8} {:>8} {:>8} {:>8} {:>10} {:>12}\n",
        "reviewer", "proposed", "accepted", "rejected", "reviews", "precision", "correlation"
    ));
    for m in report.reviewers.values() {
        output.push_str(&format!(
            "  {:<20} {:>8} {:>8} {:>8} {:>8} {:>10.2} {:>12.2}\n",
            m.role,
            m.proposed,
            m.accepted,
            m.rejected,
            m.review_count,
            m.precision,
            m.outcome_correlation
        ));
    }

    if !report.high_precision_roles.is_empty() {
        output.push_str(&format!(
            "\nHigh precision: {}\n",
            report.high_precision_roles.join(", ")
        ));
    }
    if !report.low_precision_roles.is_empty() {
        output.push_str(&format!(
            "Low precision: {}\n",
            report.low_precision_roles.join(", ")
        ));
    }
    output
}

fn format_diff(diff: &[WeightSuggestion]) -> String {
    let mut output = format!(
        "  {:<20} {:>8} {:>10} {:>8}  {}\n",
        "reviewer", "current", "suggested", "delta", "reason"
    );
    for s in diff {
        output.push_str(&format!(
            "  {:<20} {:>8.2} {:>10.2} {:>+8.2}  {}\n",
            s.role, s.current, s.suggested, s.delta, s.reason
        ));
    }
    output
}

pub fn format_preview(preview: &AdaptationPreview) -> String {
    if !preview.sufficient_data {
        return format!(
            "Insufficient data over {} days ({} reviews with outcomes)\n",
            preview.window_days, preview.report.outcome_records
        );
    }
    if preview.diff.is_empty() {
        return "No reviewer has enough reviews to adjust\n".to_string();
    }
    format!(
        "Proposed weights over {} days:\n{}",
        preview.window_days,
        format_diff(&preview.diff)
    )
}

pub fn format_apply(outcome: &ApplyOutcome) -> String {
    match outcome {
        ApplyOutcome::Applied {
            changes,
            history_logged,
            ..
        } => {
            let mut output = format!("Applied weights:\n{}", format_diff(changes));
            if !history_logged {
                output.push_str("Warning: weight-change log was not updated\n");
            }
            output
        }
        ApplyOutcome::InsufficientData {
            outcome_records,
            required,
        } => format!(
            "Not applied: {} reviews with outcomes, {} required\n",
            outcome_records, required
        ),
        ApplyOutcome::NoQualifyingReviewers => {
            "Not applied: no reviewer has enough reviews to adjust\n".to_string()
        }
    }
}

fn format_weights(weights: &BTreeMap<String, f64>) -> String {
    if weights.is_empty() {
        return "(defaults)".to_string();
    }
    weights
        .iter()
        .map(|(role, weight)| format!("{}={:.2}", role, weight))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_history(entries: &[WeightHistoryEntry]) -> String {
    if entries.is_empty() {
        return "No weight changes recorded\n".to_string();
    }
    let mut output = String::from("Weight changes:\n");
    for entry in entries {
        output.push_str(&format!(
            "  {} ({} day window)\n    before: {}\n    after:  {}\n",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.measurement_period_days,
            format_weights(&entry.weights_before),
            format_weights(&entry.weights_after)
        ));
    }
    output
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

pub fn format_benchmark(report: &BenchmarkReport) -> String {
    let mut output = format!(
        "Benchmark over {} days ({} scored reviews with outcomes)\n\n",
        report.window_days, report.records_scored
    );
    output.push_str(&format!(
        "  {:<10} {:>10} {:>10} {:>11}\n",
        "weighting", "favorable", "rejected", "separation"
    ));
    for (name, summary) in [("current", &report.current), ("uniform", &report.uniform)] {
        output.push_str(&format!(
            "  {:<10} {:>10} {:>10} {:>11}\n",
            name,
            format_optional(summary.mean_favorable),
            format_optional(summary.mean_rejected),
            format_optional(summary.separation)
        ));
    }
    if let Some(gain) = report.improvement() {
        output.push_str(&format!("\nSeparation vs uniform: {:+.2}\n", gain));
    }
    output
}
