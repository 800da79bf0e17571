use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use holm_db::Database;
use holm_server::{HolmServer, ServerConfig};
use serde_json::{json, Value};

use crate::cli::*;

const DEFAULT_DATA_DIR: &str = "./holm-data";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        data_dir,
        format,
    } = cli;
    match command {
        Command::Serve(args) => cmd_serve(data_dir, args).await,
        Command::Put(args) => cmd_put(&resolve_dir(data_dir), args, &format).await,
        Command::Get(args) => cmd_get(&resolve_dir(data_dir), args, &format).await,
        Command::Delete(args) => cmd_delete(&resolve_dir(data_dir), args, &format).await,
        Command::List(args) => cmd_list(&resolve_dir(data_dir), args, &format).await,
        Command::Verify(_) => cmd_verify(&resolve_dir(data_dir), &format).await,
        Command::Stats(_) => cmd_stats(&resolve_dir(data_dir), &format).await,
    }
}

async fn cmd_serve(data_dir: Option<String>, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_path(Path::new(path))?,
        None => ServerConfig::default(),
    };
    // Flag beats config file beats default.
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind}"))?;
    }
    if let Some(dir) = data_dir {
        config.data_dir = PathBuf::from(dir);
    }
    if args.durable {
        config.durable_appends = true;
    }

    println!(
        "Serving {} on {}",
        config.data_dir.display().to_string().bold(),
        config.bind_addr.to_string().cyan()
    );
    HolmServer::new(config).serve().await?;
    Ok(())
}

async fn cmd_put(dir: &Path, args: PutArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open(dir)?;
    let result = db.put(args.key, args.value.as_bytes()).await?;
    db.close()?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "key": result.key, "cid": result.cid.to_hex() })
        ),
        OutputFormat::Text => println!(
            "{} {} {}",
            "✓".green().bold(),
            result.key.yellow(),
            result.cid.short_hex().dimmed()
        ),
    }
    Ok(())
}

async fn cmd_get(dir: &Path, args: GetArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open(dir)?;
    let doc = db
        .get(&args.key)
        .await?
        .with_context(|| format!("no document under key {}", args.key))?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "key": doc.key,
                "cid": doc.cid.to_hex(),
                "value": decode_value(&doc.value),
            })
        ),
        OutputFormat::Text => {
            println!("{}  {}", doc.key.yellow().bold(), doc.cid.short_hex().dimmed());
            println!("{}", render_value(&doc.value));
        }
    }
    Ok(())
}

async fn cmd_delete(dir: &Path, args: DeleteArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open(dir)?;
    let entry = db.delete(&args.key).await?;
    db.close()?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "deleted": args.key, "entry": entry.to_hex() })
        ),
        OutputFormat::Text => println!("{} Deleted {}", "✓".green(), args.key.yellow()),
    }
    Ok(())
}

async fn cmd_list(dir: &Path, args: ListArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open(dir)?;
    let docs = db.all().await?;
    match format {
        OutputFormat::Json => {
            let rows: Vec<Value> = if args.keys {
                docs.iter().map(|d| Value::String(d.key.clone())).collect()
            } else {
                docs.iter()
                    .map(|d| {
                        json!({
                            "key": d.key,
                            "cid": d.cid.to_hex(),
                            "value": decode_value(&d.value),
                        })
                    })
                    .collect()
            };
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if args.keys {
                for doc in &docs {
                    println!("{}", doc.key);
                }
            } else {
                for doc in &docs {
                    println!(
                        "{}  {}  {}",
                        doc.key.yellow(),
                        doc.cid.short_hex().dimmed(),
                        summarize(&doc.value)
                    );
                }
                println!("{} document(s)", docs.len().to_string().bold());
            }
        }
    }
    Ok(())
}

async fn cmd_verify(dir: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open(dir)?;
    let report = db.verify().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            if report.is_valid() {
                println!("{} Database verified", "✓".green().bold());
                println!("  Authors: {}", report.authors_checked);
                println!("  Entries: {}", report.entries_checked);
                println!("  Signatures: {}", report.signatures_checked);
            } else {
                println!("{} Verification failed", "✗".red().bold());
                for violation in &report.violations {
                    println!("  {}", violation.red());
                }
            }
        }
    }
    if !report.is_valid() {
        anyhow::bail!("{} violation(s) found", report.violations.len());
    }
    Ok(())
}

async fn cmd_stats(dir: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open(dir)?;
    let stats = db.stats().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("Replica {}", db.author().short_id().cyan());
            println!(
                "  Documents: {} live, {} tombstoned",
                stats.documents.to_string().bold(),
                stats.tombstones
            );
            println!("  Payloads: {} ({} bytes)", stats.payloads, stats.payload_bytes);
            println!(
                "  Log: {} entries across {} author(s)",
                stats.entries, stats.authors
            );
            println!("  Clock: {}", stats.clock);
        }
    }
    Ok(())
}

// ---- Helpers ----

fn resolve_dir(data_dir: Option<String>) -> PathBuf {
    PathBuf::from(data_dir.unwrap_or_else(|| DEFAULT_DATA_DIR.into()))
}

fn open(dir: &Path) -> anyhow::Result<Database> {
    Database::open(dir).with_context(|| format!("opening database at {}", dir.display()))
}

/// Decode payload bytes as JSON, falling back to a JSON string for raw bytes.
fn decode_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Pretty-print a payload: JSON documents indented, raw bytes as-is.
fn render_value(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// One-line value preview for listings.
fn summarize(bytes: &[u8]) -> String {
    let text = match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => value.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    };
    if text.chars().count() > 60 {
        let prefix: String = text.chars().take(57).collect();
        format!("{prefix}...")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_get_delete_against_a_real_directory() {
        let dir = TempDir::new().unwrap();
        cmd_put(
            dir.path(),
            PutArgs {
                value: r#"{"n":1}"#.into(),
                key: Some("doc".into()),
            },
            &OutputFormat::Text,
        )
        .await
        .unwrap();

        cmd_get(
            dir.path(),
            GetArgs { key: "doc".into() },
            &OutputFormat::Json,
        )
        .await
        .unwrap();

        cmd_delete(
            dir.path(),
            DeleteArgs { key: "doc".into() },
            &OutputFormat::Text,
        )
        .await
        .unwrap();

        let missing = cmd_get(
            dir.path(),
            GetArgs { key: "doc".into() },
            &OutputFormat::Text,
        )
        .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn verify_and_stats_run_on_a_fresh_directory() {
        let dir = TempDir::new().unwrap();
        cmd_verify(dir.path(), &OutputFormat::Text).await.unwrap();
        cmd_stats(dir.path(), &OutputFormat::Json).await.unwrap();
    }

    #[test]
    fn decode_value_parses_json_documents() {
        assert_eq!(decode_value(b"{\"a\":1}"), json!({"a": 1}));
    }

    #[test]
    fn decode_value_wraps_raw_bytes_as_string() {
        assert_eq!(decode_value(b"plain text"), json!("plain text"));
    }

    #[test]
    fn render_value_indents_json() {
        let rendered = render_value(b"{\"a\":1}");
        assert!(rendered.contains("\n"));
        assert!(rendered.contains("\"a\": 1"));
    }

    #[test]
    fn summarize_truncates_long_values() {
        let long = "x".repeat(200);
        let summary = summarize(long.as_bytes());
        assert_eq!(summary.chars().count(), 60);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn resolve_dir_falls_back_to_default() {
        assert_eq!(resolve_dir(None), PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(resolve_dir(Some("/tmp/x".into())), PathBuf::from("/tmp/x"));
    }
}
