//! Command-line interface
//!
//! Training, one-off prediction, range checks, dataset inspection and the
//! HTTP server.

use clap::{Parser, Subcommand};
use colored::*;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::data::{DataSource, DatasetProvider, DatasetStatistics};
use crate::ensemble::{Diagnosis, RiskLevel};
use crate::features::catalog::{self, FeatureGroup};
use crate::features::{validate, ENGINEERED_NAMES, FEATURE_NAMES};
use crate::inference::{PredictRequest, PredictionService, TrainOptions};
use crate::store::write_json;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(235, 180, 80) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", warn("!"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn source_label(source: DataSource) -> &'static str {
    match source {
        DataSource::Remote => "UCI reference",
        DataSource::Synthetic => "synthetic fallback",
    }
}

fn diagnosis_colored(d: Diagnosis) -> ColoredString {
    match d {
        Diagnosis::Benign => ok(&d.to_string()).bold(),
        Diagnosis::Malignant => d.to_string().red().bold(),
    }
}

fn risk_colored(r: RiskLevel) -> ColoredString {
    match r {
        RiskLevel::Low | RiskLevel::LowMedium => ok(r.as_str()),
        RiskLevel::Medium | RiskLevel::MediumHigh => warn(r.as_str()),
        RiskLevel::High => r.as_str().red(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "wisconsin")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Weighted classifier ensemble for Wisconsin breast cancer risk prediction")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the reference dataset, train the ensemble and persist it
    Train {
        /// Output directory for model artifacts and reports
        #[arg(short, long, env = "MODELS_DIR", default_value = "models")]
        output_dir: PathBuf,

        /// Held-out share for evaluation
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// Seed for the split, folds and models
        #[arg(long, default_value = "42")]
        random_state: u64,

        /// Grid-search random forest, gradient boosting and RBF SVM first
        #[arg(long)]
        hyperparameter_tuning: bool,

        /// Smaller models for a fast run
        #[arg(long)]
        quick: bool,

        /// Print weights and the per-class report
        #[arg(short, long)]
        verbose: bool,
    },

    /// Predict one sample from a JSON file of feature values
    Predict {
        /// JSON object of the 30 features, or `{"features": {...}}`
        #[arg(short, long)]
        features: PathBuf,

        /// Directory holding a trained ensemble
        #[arg(short, long, env = "MODELS_DIR", default_value = "models")]
        model_dir: PathBuf,

        /// Show every member's probabilities
        #[arg(short, long)]
        individual: bool,
    },

    /// Check a value against a feature's reference range
    Validate {
        feature: String,
        value: f64,
    },

    /// Describe the features, optionally with dataset statistics
    Info {
        /// Fetch the dataset and print class balance and correlations
        #[arg(long)]
        stats: bool,
    },

    /// Start the HTTP server
    Serve {
        /// Server port
        #[arg(short, long, env = "API_PORT", default_value = "8080")]
        port: u16,

        /// Server host
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Directory holding a trained ensemble
        #[arg(short, long, env = "MODELS_DIR", default_value = "models")]
        model_dir: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_train(
    output_dir: &Path,
    test_size: f64,
    random_state: u64,
    tuning: bool,
    quick: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    if !(test_size > 0.0 && test_size < 1.0) {
        anyhow::bail!("test size must be in (0, 1), got {}", test_size);
    }

    section("Train");
    println!("  {:<16} {}", muted("Started"), chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("  {:<16} {}", muted("Output"), output_dir.display());
    println!("  {:<16} {}", muted("Test size"), test_size);
    println!("  {:<16} {}", muted("Random state"), random_state);
    println!();

    let config = EngineConfig::default()
        .with_models_dir(output_dir)
        .with_test_size(test_size)
        .with_random_state(random_state);

    step_run("Loading dataset");
    let start = Instant::now();
    let data = DatasetProvider::from_config(&config).fetch().await?;
    step_done(&format!(
        "{} samples × {} features from {} in {:?}",
        data.n_samples(),
        data.n_features(),
        source_label(data.source),
        start.elapsed()
    ));
    let stats = DatasetStatistics::compute(&data);
    step_ok(&format!(
        "{} benign, {} malignant",
        stats.benign_samples, stats.malignant_samples
    ));
    if data.source == DataSource::Synthetic {
        step_warn("reference dataset unreachable, training on synthetic data");
    }

    let service = Arc::new(PredictionService::new(config));
    let options = TrainOptions {
        output_dir: Some(output_dir.to_path_buf()),
        tuning,
        test_size: Some(test_size),
        quick,
    };

    step_run(if tuning { "Tuning and training ensemble" } else { "Training ensemble" });
    let start = Instant::now();
    let worker = Arc::clone(&service);
    let response = tokio::task::spawn_blocking(move || worker.train_on(&data, &options)).await??;
    step_done(&format!("{:?}", start.elapsed()));

    section("Models");
    println!("  {:<24} {:>10} {:>10} {:>8}", muted("Model"), muted("CV acc"), muted("± std"), muted("Weight"));
    println!("  {}", dim(&"─".repeat(56)));
    for (name, perf) in &response.summary.model_performance {
        let weight = response.summary.ensemble_weights.get(name).copied().unwrap_or(0.0);
        println!(
            "  {:<24} {:>10.4} {:>10.4} {:>8.4}",
            name, perf.mean_accuracy, perf.std_accuracy, weight
        );
    }
    for (name, reason) in &response.summary.failed_models {
        println!("  {:<24} {}", name, format!("failed: {}", reason).red());
    }

    if !response.tuning.is_empty() {
        section("Tuning");
        for result in &response.tuning {
            println!(
                "  {:<24} {:>10.4}  {}",
                result.model_name,
                result.best_score,
                dim(&serde_json::Value::Object(result.best_params.clone()).to_string())
            );
        }
    }

    if let Some(eval) = &response.evaluation {
        section("Held-out evaluation");
        println!("  {:<20} {}", muted("Accuracy"), format!("{:.4}", eval.ensemble_accuracy).white().bold());
        println!("  {:<20} {:.4}", muted("ROC AUC"), eval.ensemble_roc_auc);
        println!("  {:<20} {:.4}", muted("Avg confidence"), eval.average_confidence);
        println!("  {:<20} {:.4}", muted("Avg uncertainty"), eval.average_uncertainty);
        if verbose {
            let report = &eval.classification_report;
            println!();
            println!("  {:<12} {:>10} {:>10} {:>10} {:>8}", "", muted("precision"), muted("recall"), muted("f1"), muted("support"));
            for (label, m) in [("benign", &report.benign), ("malignant", &report.malignant)] {
                println!(
                    "  {:<12} {:>10.4} {:>10.4} {:>10.4} {:>8}",
                    label, m.precision, m.recall, m.f1_score, m.support
                );
            }
            let [[tn, fp], [fn_, tp]] = eval.confusion_matrix;
            println!();
            println!("  {:<20} tn={} fp={} fn={} tp={}", muted("Confusion"), tn, fp, fn_, tp);
        }
    }

    section("Artifacts");
    let report = json!({
        "training_info": {
            "timestamp": response.trained_at,
            "data_source": data_source_json(response.summary.data_source),
            "total_samples": stats.total_samples,
            "class_distribution": {
                "benign_samples": stats.benign_samples,
                "malignant_samples": stats.malignant_samples,
                "benign_percentage": stats.benign_percentage,
                "malignant_percentage": stats.malignant_percentage,
            },
            "group_correlations": stats.group_correlations,
        },
        "data_preparation": {
            "original_features": FEATURE_NAMES.len(),
            "enhanced_features": response.dataset_info.features_used,
            "training_samples": response.dataset_info.training_samples,
            "test_samples": response.dataset_info.test_samples,
        },
        "model_performance": response.summary.model_performance,
        "ensemble_weights": response.summary.ensemble_weights,
        "failed_models": response.summary.failed_models,
        "ensemble_evaluation": response.evaluation,
        "hyperparameter_tuning": response.tuning,
    });
    let report_path = output_dir.join("training_report.json");
    write_json(&report_path, &report)?;
    step_ok(&format!("training report → {}", report_path.display()));

    let importance_path = output_dir.join("feature_importance.json");
    write_json(&importance_path, &service.feature_importance()?)?;
    step_ok(&format!("feature importance → {}", importance_path.display()));
    step_ok(&format!("{} models → {}", response.summary.trained_models, output_dir.display()));

    println!();
    Ok(())
}

fn data_source_json(source: DataSource) -> serde_json::Value {
    serde_json::to_value(source).unwrap_or(serde_json::Value::Null)
}

/// Accepts either a flat feature object or one wrapped in `features`
fn read_features(path: &Path) -> anyhow::Result<HashMap<String, f64>> {
    let text = std::fs::read_to_string(path)?;
    let mut value: serde_json::Value = serde_json::from_str(&text)?;
    if let Some(inner) = value.get_mut("features") {
        value = inner.take();
    }
    Ok(serde_json::from_value(value)?)
}

pub fn cmd_predict(features_path: &Path, model_dir: &Path, individual: bool) -> anyhow::Result<()> {
    section("Predict");

    let features = read_features(features_path)?;
    let service = PredictionService::open(EngineConfig::default().with_models_dir(model_dir))?;
    if !service.is_trained() {
        anyhow::bail!(
            "no trained ensemble in {}; run `wisconsin train` first",
            model_dir.display()
        );
    }

    let request = PredictRequest {
        return_individual: individual,
        ..PredictRequest::new(features)
    };
    let out = service.predict(&request)?;

    println!("  {:<16} {}", muted("Diagnosis"), diagnosis_colored(out.prediction));
    println!("  {:<16} {:.4}", muted("Confidence"), out.confidence);
    if let Some(u) = out.uncertainty {
        println!("  {:<16} {:.4}", muted("Uncertainty"), u);
    }
    println!("  {:<16} {}", muted("Risk"), risk_colored(out.risk_level));
    println!(
        "  {:<16} benign {:.4}  malignant {:.4}",
        muted("Probabilities"),
        out.probabilities.benign,
        out.probabilities.malignant
    );

    let flagged: Vec<_> = out.feature_validation.iter().filter(|(_, v)| !v.valid).collect();
    if !flagged.is_empty() {
        section("Out of range");
        for (name, v) in flagged {
            println!("  {:<24} {}", name, warn(&v.message));
        }
    }

    if let Some(members) = &out.individual_predictions {
        section("Members");
        for (name, p) in members {
            println!(
                "  {:<24} {:<10} {:>8.4}  {}",
                name,
                p.prediction.to_string(),
                p.confidence,
                dim(&format!("malignant {:.4}", p.probabilities.malignant))
            );
        }
    }
    for name in &out.failed_models {
        step_warn(&format!("{} failed to predict", name));
    }

    println!();
    Ok(())
}

pub fn cmd_validate(feature: &str, value: f64) -> anyhow::Result<()> {
    section("Validate");

    let result = validate(feature, value);
    let mark = if result.valid { ok("valid") } else { warn("out of range") };
    println!("  {:<16} {}", muted("Feature"), feature);
    println!("  {:<16} {}", muted("Value"), value);
    println!("  {:<16} {}", muted("Result"), mark);
    println!("  {:<16} {}", muted("Message"), result.message);
    if let Some(s) = &result.suggestion {
        println!("  {:<16} {}", muted("Suggestion"), s);
    }
    if let Some(spec) = catalog::lookup(feature) {
        println!("  {:<16} {}", muted("Description"), spec.description);
        println!(
            "  {:<16} [{}, {}] typical [{}, {}]",
            muted("Range"),
            spec.min,
            spec.max,
            spec.typical.0,
            spec.typical.1
        );
    }

    println!();
    Ok(())
}

pub async fn cmd_info(stats: bool) -> anyhow::Result<()> {
    section("Features");

    for group in FeatureGroup::ALL {
        println!("  {}", accent(group.name()));
        for spec in catalog::group(group) {
            println!(
                "    {:<26} {:>9} – {:<9} {}",
                spec.name,
                spec.min,
                spec.max,
                dim(spec.description)
            );
        }
    }
    println!("  {}", accent("engineered"));
    for name in ENGINEERED_NAMES {
        println!("    {}", name);
    }

    if stats {
        section("Dataset");
        step_run("Loading dataset");
        let config = EngineConfig::default();
        let data = DatasetProvider::from_config(&config).fetch().await?;
        step_done(source_label(data.source));

        let stats = DatasetStatistics::compute(&data);
        println!("  {:<16} {}", muted("Samples"), stats.total_samples);
        println!(
            "  {:<16} {} ({:.1}%)",
            muted("Benign"),
            stats.benign_samples,
            stats.benign_percentage
        );
        println!(
            "  {:<16} {} ({:.1}%)",
            muted("Malignant"),
            stats.malignant_samples,
            stats.malignant_percentage
        );
        for (group, corr) in &stats.group_correlations {
            println!("  {:<16} {:.4}", muted(group), corr);
        }

        section("Most predictive");
        for f in stats.top_predictive(10) {
            println!("  {:<26} {:>8.4}", f.name, f.correlation);
        }
    }

    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: &str, port: u16, model_dir: &Path) -> anyhow::Result<()> {
    use crate::server::run_server;

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Wisconsin Ensemble".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}/api/wisconsin", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/health", host, port)));
    line_box(&kv("Models ", &model_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = EngineConfig::default()
        .with_models_dir(model_dir)
        .with_address(host, port);

    run_server(config).await
}

// ─── Help ──────────────────────────────────────────────────────────────────────

pub fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("wisconsin train", "Train and persist the ensemble"),
        ("wisconsin train --hyperparameter-tuning", "Grid-search key models first"),
        ("wisconsin predict -f sample.json", "Predict one sample"),
        ("wisconsin validate radius_mean 14.2", "Check a value's range"),
        ("wisconsin info --stats", "Features and dataset statistics"),
        ("wisconsin serve -p 3000", "Serve on custom port"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<44} {}", cmd.white(), muted(desc));
    }

    section("Endpoints");

    let endpoints: &[(&str, &str)] = &[
        ("/api/health", "Health check"),
        ("/api/wisconsin/train-ensemble", "Train (POST)"),
        ("/api/wisconsin/predict", "Predict (POST)"),
        ("/api/wisconsin/ensemble-status", "Loaded models and weights"),
        ("/api/wisconsin/feature-importance", "Importance by group"),
    ];

    for (url, desc) in endpoints {
        println!("  {:<44} {}", accent(url), muted(desc));
    }

    println!();
}
