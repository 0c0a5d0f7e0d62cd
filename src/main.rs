use clap::{Args, Parser, Subcommand};
use merchant_hub::application::dispatcher::CallbackDispatcher;
use merchant_hub::config::Settings;
use merchant_hub::domain::ports::HistoryStoreBox;
use merchant_hub::domain::transaction::{Deposit, HistoryDocument, InternalId};
use merchant_hub::infrastructure::file_ledger::FileHistoryStore;
use merchant_hub::infrastructure::gateway::PassthroughGatewayFactory;
use merchant_hub::infrastructure::file_session::{FileSessionStore, SESSION_DIR};
use merchant_hub::interfaces::callback::{CallbackParams, payload_from_form, payload_from_json};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, env = "MERCHANT_HUB_CONFIG", default_value = "merchant.json")]
    config: PathBuf,

    /// Overrides `data_dir` from the settings file
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep history in RocksDB under the data dir instead of JSON files
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    rocksdb: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured merchants
    Merchants,
    /// Allocate an internal id and print its callback URLs
    Begin {
        #[arg(long)]
        merchant: String,
        #[arg(long)]
        username: String,
    },
    /// Start a deposit: callback URLs, gateway redirect and initial history
    Initiate {
        #[arg(long)]
        merchant: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        description: Option<String>,
        /// Where to send the user after checkout
        #[arg(long)]
        back_url: Option<String>,
        /// Session the back URL is remembered in, until `success` or `cancel`
        #[arg(long, default_value = "cli")]
        session: String,
    },
    /// Handle a server-to-server notification
    Notify(CallbackArgs),
    /// Handle the user's return after a completed payment
    Success(CallbackArgs),
    /// Handle the user's return after a cancelled payment
    Cancel(CallbackArgs),
    /// Print the history document of a transaction
    History { internal_id: String },
    /// Print where a transaction's history is stored
    Locate { internal_id: String },
}

#[derive(Args)]
struct CallbackArgs {
    /// The callback URL as called by the provider
    #[arg(long)]
    url: Url,
    /// Provider payload as a JSON object
    #[arg(long, conflicts_with = "form")]
    payload: Option<String>,
    /// Provider payload as a form-encoded body
    #[arg(long)]
    form: Option<String>,
    /// Session to recall the back URL from
    #[arg(long, default_value = "cli")]
    session: String,
}

impl CallbackArgs {
    fn params(&self) -> Result<CallbackParams> {
        CallbackParams::from_url(&self.url).into_diagnostic()
    }

    fn payload(&self) -> Result<HistoryDocument> {
        match (&self.payload, &self.form) {
            (Some(json), _) => payload_from_json(json).into_diagnostic(),
            (None, Some(form)) => Ok(payload_from_form(form)),
            (None, None) => Ok(HistoryDocument::new()),
        }
    }
}

#[derive(Serialize)]
struct MerchantSummary<'a> {
    id: &'a str,
    gateway: &'a str,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config).into_diagnostic()?;
    if let Some(data_dir) = &cli.data_dir {
        settings.data_dir = data_dir.clone();
    }

    let history = history_store(&cli, &settings.data_dir)?;
    let dispatcher = settings
        .build_dispatcher(
            history,
            Box::new(FileSessionStore::new(settings.data_dir.join(SESSION_DIR))),
            Box::new(PassthroughGatewayFactory),
        )
        .into_diagnostic()?;

    run(cli.command, &dispatcher).await
}

async fn run(command: Command, dispatcher: &CallbackDispatcher) -> Result<()> {
    match command {
        Command::Merchants => {
            let registry = dispatcher.registry();
            let mut merchants = Vec::new();
            for id in registry.ids() {
                let config = registry.config(id).into_diagnostic()?;
                merchants.push(MerchantSummary {
                    id,
                    gateway: &config.gateway,
                });
            }
            print_json(&merchants)
        }
        Command::Begin { merchant, username } => {
            let merchant = dispatcher.registry().get(&merchant).into_diagnostic()?;
            let urls = dispatcher
                .correlator()
                .begin_transaction(merchant.as_ref(), &username)
                .into_diagnostic()?;
            print_json(&urls)
        }
        Command::Initiate {
            merchant,
            username,
            amount,
            currency,
            description,
            back_url,
            session,
        } => {
            let mut deposit = Deposit::new(amount, currency).into_diagnostic()?;
            if let Some(description) = description {
                deposit = deposit.with_description(description);
            }
            let checkout = dispatcher
                .initiate(&merchant, &username, &session, back_url.as_deref(), &deposit)
                .await
                .into_diagnostic()?;
            print_json(&checkout)
        }
        Command::Notify(args) => {
            let ack = dispatcher
                .on_notify(&args.params()?, args.payload()?)
                .await
                .into_diagnostic()?;
            println!("{}", ack.body);
            Ok(())
        }
        Command::Success(args) => {
            let outcome = dispatcher
                .on_success(&args.params()?, &args.session, args.payload()?)
                .await
                .into_diagnostic()?;
            print_json(&outcome)
        }
        Command::Cancel(args) => {
            let outcome = dispatcher
                .on_cancel(&args.params()?, &args.session, args.payload()?)
                .await
                .into_diagnostic()?;
            print_json(&outcome)
        }
        Command::History { internal_id } => {
            let id = InternalId::parse(&internal_id).into_diagnostic()?;
            let document = dispatcher.ledger().read(&id).await.into_diagnostic()?;
            print_json(&document)
        }
        Command::Locate { internal_id } => {
            let id = InternalId::parse(&internal_id).into_diagnostic()?;
            println!("{}", dispatcher.ledger().location(&id));
            Ok(())
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn history_store(cli: &Cli, data_dir: &Path) -> Result<HistoryStoreBox> {
    use merchant_hub::infrastructure::rocksdb::RocksDBHistoryStore;

    if cli.rocksdb {
        let store = RocksDBHistoryStore::open(data_dir.join("history.db")).into_diagnostic()?;
        return Ok(Box::new(store));
    }
    Ok(Box::new(FileHistoryStore::new(data_dir)))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn history_store(_cli: &Cli, data_dir: &Path) -> Result<HistoryStoreBox> {
    Ok(Box::new(FileHistoryStore::new(data_dir)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value).into_diagnostic()?);
    Ok(())
}
