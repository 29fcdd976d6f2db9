use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use seatpay::application::payments::{BatchTarget, PaymentsService, Ports};
use seatpay::config::EngineConfig;
use seatpay::domain::ports::{
    SharedBatchDirectory, SharedPartnerSettings, SharedPaymentGateway, SharedProfileStore,
    SharedSubscriptionStore, SharedTransactionStore,
};
use seatpay::infrastructure::in_memory::{
    InMemoryAccountDirectory, InMemoryBatchDirectory, InMemoryPartnerSettings,
    InMemoryProfileStore, InMemorySubscriptionStore, InMemoryTransactionStore,
};
use seatpay::infrastructure::log_notifier::LogNotifier;
#[cfg(feature = "storage-rocksdb")]
use seatpay::infrastructure::rocksdb::RocksDbStore;
use seatpay::infrastructure::sandbox::SandboxGateway;
use seatpay::infrastructure::stripe::StripeGateway;
use seatpay::interfaces::csv::history_writer::HistoryWriter;
use seatpay::interfaces::csv::order_reader::OrderReader;
use seatpay::interfaces::csv::receipt_writer::{ReceiptRow, ReceiptWriter};
use seatpay::telemetry;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "seatpay", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file. Built-in defaults apply to anything it omits.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Payment processor to charge through.
    #[arg(long, global = true, value_enum, default_value_t = GatewayKind::Sandbox)]
    gateway: GatewayKind,

    /// Processor API key; overrides the configuration file.
    #[arg(long, global = true, env = "SEATPAY_GATEWAY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true, env = "SEATPAY_LOG", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Prices a seat purchase without charging anything.
    Quote {
        #[arg(long)]
        seats: u32,
        /// 3, 5, 10 or unlimited
        #[arg(long, default_value = "5")]
        sessions_per_day: String,
        /// 1, 3, 6 or 12
        #[arg(long, default_value_t = 1)]
        months: u32,
    },
    /// Buys seats for every order in a CSV file and prints one receipt row per order.
    Purchase {
        /// Orders CSV file
        input: PathBuf,
    },
    /// Prints an account's payment history, newest first.
    History { account_id: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GatewayKind {
    Sandbox,
    Stripe,
}

struct Stores {
    profiles: SharedProfileStore,
    ledger: SharedTransactionStore,
    batches: SharedBatchDirectory,
    subscriptions: SharedSubscriptionStore,
    settings: SharedPartnerSettings,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            profiles: Arc::new(InMemoryProfileStore::new()),
            ledger: Arc::new(InMemoryTransactionStore::new()),
            batches: Arc::new(InMemoryBatchDirectory::new()),
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            settings: Arc::new(InMemoryPartnerSettings::new()),
        }
    }

    #[cfg(feature = "storage-rocksdb")]
    fn persistent(path: &Path) -> Result<Self> {
        let store = RocksDbStore::open(path).into_diagnostic()?;
        Ok(Self {
            profiles: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            batches: Arc::new(store.clone()),
            subscriptions: Arc::new(store.clone()),
            settings: Arc::new(store),
        })
    }

    fn open(db_path: Option<&Path>) -> Result<Self> {
        match db_path {
            #[cfg(feature = "storage-rocksdb")]
            Some(path) => Self::persistent(path),
            #[cfg(not(feature = "storage-rocksdb"))]
            Some(_) => {
                warn!(
                    "Persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
                );
                Ok(Self::in_memory())
            }
            None => Ok(Self::in_memory()),
        }
    }
}

fn build_gateway(kind: GatewayKind, config: &EngineConfig) -> Result<SharedPaymentGateway> {
    Ok(match kind {
        GatewayKind::Sandbox => Arc::new(SandboxGateway::new()),
        GatewayKind::Stripe => Arc::new(StripeGateway::new(&config.gateway).into_diagnostic()?),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level, cli.log_json);

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };
    if let Some(key) = cli.api_key.clone() {
        config.gateway.api_key = Some(key);
    }

    let accounts = InMemoryAccountDirectory::new();
    let stores = Stores::open(cli.db_path.as_deref())?;
    let gateway = build_gateway(cli.gateway, &config)?;
    let service = PaymentsService::new(
        config,
        Ports {
            accounts: Arc::new(accounts.clone()),
            gateway,
            profiles: stores.profiles,
            ledger: stores.ledger,
            batches: stores.batches,
            subscriptions: stores.subscriptions,
            settings: stores.settings,
            notifier: Arc::new(LogNotifier),
        },
    );

    match cli.command {
        Command::Quote {
            seats,
            sessions_per_day,
            months,
        } => {
            let quote = service
                .quote_seats(seats, &sessions_per_day, months)
                .into_diagnostic()?;
            println!("{}", serde_json::to_string_pretty(&quote).into_diagnostic()?);
        }
        Command::Purchase { input } => {
            let file = File::open(input).into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = ReceiptWriter::new(stdout.lock());

            for (index, order) in OrderReader::new(file).orders().enumerate() {
                let line = index + 1;
                let row = match order {
                    Ok(order) => {
                        accounts
                            .insert(&order.partner_id, &order.email, &order.name)
                            .await;
                        let purchase = order.to_purchase();
                        let target = purchase.batch.clone();
                        match service.purchase_seats(purchase).await {
                            Ok(receipt) => ReceiptRow::success(line, &receipt),
                            Err(e) => {
                                let batch_id = match target {
                                    BatchTarget::Existing(batch_id) => Some(batch_id),
                                    BatchTarget::New(name) => service
                                        .find_batch(&order.partner_id, &name)
                                        .await
                                        .ok()
                                        .flatten()
                                        .map(|batch| batch.id),
                                };
                                warn!(
                                    line,
                                    partner_id = %order.partner_id,
                                    batch_id = ?batch_id,
                                    error = %e,
                                    "Order failed"
                                );
                                ReceiptRow::failure(
                                    line,
                                    &order.partner_id,
                                    &order.batch_name,
                                    batch_id.as_deref(),
                                    &e,
                                )
                            }
                        }
                    }
                    Err(e) => {
                        warn!(line, error = %e, "Unreadable order");
                        ReceiptRow::failure(line, "", "", None, &e)
                    }
                };
                writer.write_row(&row).into_diagnostic()?;
            }
            writer.finish().into_diagnostic()?;
        }
        Command::History { account_id } => {
            let history = service.payment_history(&account_id).await.into_diagnostic()?;
            info!(account_id = %account_id, entries = history.len(), "Payment history loaded");
            let stdout = io::stdout();
            HistoryWriter::new(stdout.lock())
                .write_history(&history)
                .into_diagnostic()?;
        }
    }

    Ok(())
}
