use std::{path::PathBuf, time::SystemTime};

use cadfeed::{Client, ClientConfig, ConsumerKey, ConsumerSecret, CustomerId, IssuerId};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

#[derive(Debug, Parser)]
struct Opts {
    /// The issuer ID assigned to the application
    #[clap(long, env = "CADFEED_ISSUER_ID")]
    issuer_id: IssuerId,

    /// The customer to act for
    #[clap(long, env = "CADFEED_CUSTOMER_ID")]
    customer_id: CustomerId,

    /// The application's OAuth consumer key
    #[clap(long, env = "CADFEED_CONSUMER_KEY")]
    consumer_key: ConsumerKey,

    /// The application's OAuth consumer secret
    #[clap(long, env = "CADFEED_CONSUMER_SECRET", hide_env_values = true)]
    consumer_secret: ConsumerSecret,

    /// The PEM-encoded RSA key used to sign assertions
    #[clap(short = 'k', long, env = "CADFEED_PRIVATE_KEY_PATH")]
    private_key: PathBuf,

    /// The audience to issue assertions for
    #[clap(short, long, env = "CADFEED_AUDIENCE")]
    audience: String,

    /// Writes each signed assertion to this file
    #[clap(long, env = "CADFEED_ASSERTION_DUMP")]
    assertion_dump: Option<PathBuf>,

    /// Also lists transactions of each account since this date
    #[clap(long)]
    since: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let mut config = ClientConfig::new(
        opts.issuer_id,
        opts.customer_id,
        opts.consumer_key,
        opts.consumer_secret,
        opts.private_key,
        opts.audience,
    )?;
    if let Some(path) = opts.assertion_dump {
        config = config.with_assertion_dump(path);
    }

    let client = Client::new(config)?;

    let credential = client.get_valid_token().await?;
    tracing::info!(
        token = format_args!("{:#?}", credential.token()),
        expires_at = credential.expires_at().0,
        "obtained credential"
    );

    let accounts = client.customer_accounts().await?;
    let accounts = accounts["accounts"].as_array().cloned().unwrap_or_default();
    tracing::info!(count = accounts.len(), "listed customer accounts");

    for account in &accounts {
        tracing::info!(
            account.id = %account["accountId"],
            account.nickname = %account["accountNickname"],
            "account"
        );

        if let (Some(since), Some(id)) = (opts.since, account["accountId"].as_u64()) {
            let today = DateTime::<Utc>::from(SystemTime::now()).date_naive();
            let transactions = client.account_transactions(id, since, today).await?;
            tracing::info!(
                account.id = id,
                transactions = %transactions,
                "account transactions"
            );
        }
    }

    Ok(())
}
