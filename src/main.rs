//! Command-line entry point for the claim verification pipeline

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use veracity::config::Settings;
use veracity::models::{VerdictLabel, VerificationReport};
use veracity::{VerificationError, VerificationPipeline};

#[derive(Debug, Parser)]
#[command(name = "veracity", version, about = "Multi-agent claim verification pipeline")]
struct Cli {
    /// Configuration file (INI)
    #[arg(long, global = true, default_value = "config/config.ini")]
    config: PathBuf,

    /// JSON result file
    #[arg(long, global = true, default_value = "results.json")]
    output: PathBuf,

    /// Log filter override, e.g. `debug` or `veracity=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify a single claim
    Verify {
        /// The claim text to check
        #[arg(long)]
        claim: String,
    },
    /// Verify a batch of claims from a text or CSV file
    Batch {
        /// Claims file: `.csv` with a header row and the claim in the
        /// first column, otherwise one claim per line (`#` comments
        /// skipped)
        #[arg(long)]
        file: PathBuf,
    },
    /// List configured LLM providers and their availability
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let settings = Settings::load(Some(&cli.config)).context("failed to load configuration")?;
    let pipeline = VerificationPipeline::new(&settings).context("failed to build pipeline")?;

    match cli.command {
        Command::Providers => {
            let statuses = pipeline.probe_providers().await;
            if statuses.is_empty() {
                println!("No LLM providers configured.");
            }
            for status in statuses {
                println!(
                    "{:<10} {:<30} {}",
                    status.kind,
                    status.model,
                    if status.available { "available" } else { "unreachable" }
                );
            }
        }
        Command::Verify { claim } => {
            run_claims(&pipeline, vec![claim], &cli.output).await?;
        }
        Command::Batch { file } => {
            let claims = load_claims(&file)?;
            info!("Loaded {} claims from {}", claims.len(), file.display());
            run_claims(&pipeline, claims, &cli.output).await?;
        }
    }

    Ok(())
}

fn init_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Read claims from a batch file
///
/// A `.csv` file is parsed with a header row and the claim in the first
/// column; anything else is plain text, one claim per line.
fn load_claims(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read claims file {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
        parse_csv_claims(&text)
    } else {
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }
}

fn parse_csv_claims(text: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut claims = Vec::new();
    for record in reader.records() {
        let record = record.context("failed to parse claims CSV")?;
        if let Some(claim) = record.get(0) {
            let claim = claim.trim();
            if !claim.is_empty() {
                claims.push(claim.to_string());
            }
        }
    }
    Ok(claims)
}

async fn run_claims(
    pipeline: &VerificationPipeline,
    claims: Vec<String>,
    output: &Path,
) -> anyhow::Result<()> {
    let total = claims.len();
    let started = Instant::now();
    let mut reports: Vec<VerificationReport> = Vec::with_capacity(total);
    let mut rejected = 0usize;

    for (index, claim) in claims.iter().enumerate() {
        info!("Processing claim {}/{}: {}", index + 1, total, claim);
        match pipeline.verify(claim).await {
            Ok(report) => reports.push(report),
            Err(VerificationError::InvalidClaim(reason)) => {
                warn!("Skipping invalid claim {}/{}: {}", index + 1, total, reason);
                rejected += 1;
            }
            Err(e) => {
                error!("Claim {}/{} failed: {}", index + 1, total, e);
                rejected += 1;
            }
        }
    }

    let json = serde_json::to_string_pretty(&reports)?;
    std::fs::write(output, json)
        .with_context(|| format!("failed to write results to {}", output.display()))?;

    log_summary(pipeline, &reports, rejected, started.elapsed().as_secs_f64());
    info!("Results saved to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_claims(name: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_plain_text_claims_skip_comments_and_blanks() {
        let (_dir, path) = write_claims(
            "claims.txt",
            "# sample claims\nThe Berlin Wall fell in 1989\n\nApple Inc was founded in 1976\n",
        );

        let claims = load_claims(&path).unwrap();
        assert_eq!(
            claims,
            vec!["The Berlin Wall fell in 1989", "Apple Inc was founded in 1976"]
        );
    }

    #[test]
    fn test_csv_claims_use_first_column_and_skip_header() {
        let (_dir, path) = write_claims(
            "claims.csv",
            "claim,category\n\
             The Berlin Wall fell in 1989,historical\n\
             \"Apple Inc was founded in 1976, in a garage\",corporate\n",
        );

        let claims = load_claims(&path).unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0], "The Berlin Wall fell in 1989");
        assert_eq!(claims[1], "Apple Inc was founded in 1976, in a garage");
    }

    #[test]
    fn test_csv_empty_rows_are_skipped() {
        let (_dir, path) = write_claims("claims.csv", "claim\nOne real claim here\n,\n");

        let claims = load_claims(&path).unwrap();
        assert_eq!(claims, vec!["One real claim here"]);
    }
}

fn log_summary(
    pipeline: &VerificationPipeline,
    reports: &[VerificationReport],
    rejected: usize,
    elapsed_secs: f64,
) {
    let count_of = |label: VerdictLabel| reports.iter().filter(|r| r.verdict == label).count();
    let usage = pipeline.usage();
    let cache = pipeline.cache_stats();

    info!("=== RUN SUMMARY ===");
    info!(
        "Claims processed: {} ({} supported, {} contradicted, {} insufficient, {} rejected)",
        reports.len(),
        count_of(VerdictLabel::Supported),
        count_of(VerdictLabel::Contradicted),
        count_of(VerdictLabel::InsufficientEvidence),
        rejected
    );
    info!(
        "Cache: {} hits, {} misses ({:.0}% hit rate)",
        cache.hits,
        cache.misses,
        cache.hit_rate() * 100.0
    );
    info!(
        "LLM usage: {} requests, {} fallbacks, {} tokens, ${:.4} estimated",
        usage.requests, usage.fallbacks, usage.total_tokens, usage.estimated_cost
    );
    info!("Total time: {:.2}s", elapsed_secs);
}
