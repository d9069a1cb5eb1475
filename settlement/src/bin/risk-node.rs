//! Risk node binary
//!
//! Reads one JSON command per line on stdin and writes one JSON response per
//! line on stdout. Logs go to stderr.
//!
//! ```text
//! {"op": "create", "account_id": "ana@example.com", "amount": "42.50", "merchant": "Corner Store", "timestamp": "2024-06-01T14:30:00Z"}
//! {"op": "finalize", "transaction_id": "…", "status": "approved", "analyst": "lee", "note": "verified with customer"}
//! ```

use anyhow::Context;
use ledger_core::{
    Account, AnalystNote, InMemoryAccountStore, InMemoryTransactionStore, TransactionFilter,
    TransactionStatus,
};
use risk_engine::{InMemoryRuleStore, RiskEngine};
use serde::Deserialize;
use serde_json::{json, Value};
use settlement::{Config, NewTransaction, TransactionEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
    Create(NewTransaction),
    Finalize {
        transaction_id: Uuid,
        status: TransactionStatus,
        #[serde(default)]
        analyst: Option<String>,
        #[serde(default)]
        note: Option<String>,
    },
    Annotate {
        transaction_id: Uuid,
        analyst: String,
        note: String,
    },
    Settle {
        transaction_id: Uuid,
    },
    Get {
        transaction_id: Uuid,
    },
    List(TransactionFilter),
    Metrics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SETTLEMENT_CONFIG").ok())
        .map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(config.json_logs);

    tracing::info!(service = %config.service_name, "Starting risk node");

    let engine = build_engine(&config)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(&line) {
            Ok(command) => execute(&engine, command).await,
            Err(e) => json!({
                "ok": false,
                "error": { "code": "validation_error", "message": e.to_string() },
            }),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    tracing::info!("Input closed, shutting down risk node");
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_engine(config: &Config) -> anyhow::Result<TransactionEngine> {
    let rules = match config.rules_path {
        Some(ref path) => InMemoryRuleStore::load_or_empty(path),
        None => {
            tracing::warn!("No rules file configured, running without fraud rules");
            InMemoryRuleStore::default()
        }
    };

    let accounts = match config.accounts_path {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read accounts from {}", path.display()))?;
            let accounts: Vec<Account> =
                serde_json::from_str(&content).context("Failed to parse accounts")?;
            tracing::info!(count = accounts.len(), "Loaded accounts");
            InMemoryAccountStore::with_accounts(accounts)
        }
        None => InMemoryAccountStore::new(),
    };

    let risk = RiskEngine::from_config(&config.risk, Arc::new(rules));
    tracing::info!(
        scoring_available = risk.scorer().is_available(),
        fraud_threshold = config.risk.fraud_threshold,
        review_threshold = config.risk.review_threshold,
        "Risk engine ready"
    );

    Ok(TransactionEngine::new(
        Arc::new(InMemoryTransactionStore::new()),
        Arc::new(accounts),
        Arc::new(risk),
    )?)
}

async fn execute(engine: &TransactionEngine, command: Command) -> Value {
    let result = match command {
        Command::Create(request) => engine.create(request).await.map(to_json),
        Command::Finalize {
            transaction_id,
            status,
            analyst,
            note,
        } => {
            let note = note.map(|note| AnalystNote::new(analyst.unwrap_or_default(), note));
            engine
                .finalize(transaction_id, status, note)
                .await
                .map(to_json)
        }
        Command::Annotate {
            transaction_id,
            analyst,
            note,
        } => engine
            .annotate(transaction_id, &analyst, &note)
            .await
            .map(to_json),
        Command::Settle { transaction_id } => engine.settle(transaction_id).await.map(to_json),
        Command::Get { transaction_id } => engine.get(transaction_id).await.map(to_json),
        Command::List(filter) => engine.list(&filter).await.map(to_json),
        Command::Metrics => match engine.metrics().render() {
            Ok(text) => Ok(Value::String(text)),
            Err(e) => Err(settlement::Error::Persistence(e.to_string())),
        },
    };

    match result {
        Ok(value) => json!({ "ok": true, "result": value }),
        Err(e) => json!({
            "ok": false,
            "error": {
                "code": e.code(),
                "message": e.to_string(),
                "retryable": e.is_retryable(),
            },
        }),
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
