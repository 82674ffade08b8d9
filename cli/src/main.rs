/*
 * The CLI module drives the parts of the lake which are not event driven: provisioning the
 * catalog and running a backfill.
 */
use finlake::catalog::{LakeResources, EXTRACT_JOB_NAME, INTRADAY_FUNCTION, TICKERS};
use finlake::config::{LakeConfig, BUCKET_NAME_ENV};
use gumdrop::Options;
use tracing::log::*;

mod backfill;
mod provision;

/// Environment variable holding the Glue database name
const DATABASE_NAME_ENV: &str = "DATABASE_NAME";
/// Environment variable holding the IAM role the crawlers run as
const CRAWLER_ROLE_ENV: &str = "CRAWLER_ROLE_ARN";
const DEFAULT_DATABASE: &str = "financedb";

/*
 * Flags is a structure for managing command linke parameters
 */
#[derive(Debug, Default, Options)]
struct Flags {
    #[options(help = "print help message")]
    help: bool,
    #[options(help = "Bucket of the lake, can also be set by BUCKET_NAME")]
    bucket: Option<String>,
    #[options(help = "Glue database name, can also be set by DATABASE_NAME")]
    database: Option<String>,
    #[options(command)]
    command: Option<Command>,
}

#[derive(Debug, Options)]
enum Command {
    #[options(help = "start the extract job, backfill intraday data and run the crawlers")]
    Backfill(BackfillOpts),
    #[options(help = "create the Glue database, tables and crawlers which do not exist yet")]
    Provision(ProvisionOpts),
    #[options(help = "print the scheduled Lambda invocations as JSON")]
    Schedules(PrintOpts),
    #[options(help = "print the bucket notifications which invoke the Lambdas as JSON")]
    Notifications(PrintOpts),
}

#[derive(Debug, Default, Options)]
struct BackfillOpts {
    #[options(help = "print help message")]
    help: bool,
    #[options(no_short, help = "do not start the extract job")]
    skip_job: bool,
    #[options(no_short, help = "do not invoke the intraday Lambda")]
    skip_lambda: bool,
    #[options(no_short, help = "do not start the crawlers")]
    skip_crawlers: bool,
    #[options(help = "ticker to backfill, may be repeated (default: MSFT, AMZN, IBM)")]
    ticker: Vec<String>,
    #[options(help = "name of the intraday Lambda (default: intraday_data_handler)")]
    function: Option<String>,
    #[options(help = "name of the extract job (default: rds_extract_job)")]
    job: Option<String>,
}

#[derive(Debug, Default, Options)]
struct ProvisionOpts {
    #[options(help = "print help message")]
    help: bool,
    #[options(help = "IAM role for the crawlers, can also be set by CRAWLER_ROLE_ARN")]
    role: Option<String>,
}

#[derive(Debug, Default, Options)]
struct PrintOpts {
    #[options(help = "print help message")]
    help: bool,
}

/*
 * Main entrypoint for the command line
 */
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    info!("Starting finlake");
    let flags = Flags::parse_args_default_or_exit();
    debug!("Options as read: {:?}", flags);

    match &flags.command {
        Some(Command::Backfill(opts)) => {
            let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let plan = backfill_plan(&flags, opts)?;
            backfill::run(&plan, &config).await
        }
        Some(Command::Provision(opts)) => {
            let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let resources = resources(&flags)?;
            let role = crawler_role(opts)?;
            provision::run(&resources, &role, &config).await
        }
        Some(Command::Schedules(_)) => {
            let resources = resources(&flags)?;
            println!("{}", serde_json::to_string_pretty(&resources.schedules())?);
            Ok(())
        }
        Some(Command::Notifications(_)) => {
            let resources = resources(&flags)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&resources.notifications())?
            );
            Ok(())
        }
        None => {
            println!("{}", Flags::usage());
            if let Some(commands) = Flags::command_list() {
                println!("\nAvailable commands:\n{commands}");
            }
            Ok(())
        }
    }
}

/*
 * Resolve the deployment from the flags, falling back to the environment. The bucket is
 * required, the database defaults to `financedb` and the dataset prefixes are read from the
 * same variables the Lambdas use
 */
fn resources(flags: &Flags) -> Result<LakeResources, anyhow::Error> {
    let bucket = match &flags.bucket {
        Some(bucket) => bucket.to_string(),
        None => std::env::var(BUCKET_NAME_ENV)
            .map_err(|_| anyhow::anyhow!("--bucket or {BUCKET_NAME_ENV} must be set"))?,
    };
    let database = match &flags.database {
        Some(database) => database.to_string(),
        None => std::env::var(DATABASE_NAME_ENV).unwrap_or(DEFAULT_DATABASE.into()),
    };
    let config = LakeConfig::new(bucket).with_env_prefixes();
    Ok(LakeResources::from_config(&config, database))
}

fn crawler_role(opts: &ProvisionOpts) -> Result<String, anyhow::Error> {
    match &opts.role {
        Some(role) => Ok(role.to_string()),
        None => std::env::var(CRAWLER_ROLE_ENV)
            .map_err(|_| anyhow::anyhow!("--role or {CRAWLER_ROLE_ENV} must be set")),
    }
}

/*
 * Turn the backfill flags into the list of steps to run. Crawlers are only resolved when they
 * are going to be started, so skipping them does not require a bucket
 */
fn backfill_plan(flags: &Flags, opts: &BackfillOpts) -> Result<backfill::Plan, anyhow::Error> {
    let job = if opts.skip_job {
        None
    } else {
        Some(opts.job.clone().unwrap_or(EXTRACT_JOB_NAME.into()))
    };
    let tickers = match (opts.skip_lambda, opts.ticker.is_empty()) {
        (true, _) => vec![],
        (false, true) => TICKERS.iter().map(|t| t.to_string()).collect(),
        (false, false) => opts.ticker.clone(),
    };
    let crawlers = if opts.skip_crawlers {
        vec![]
    } else {
        resources(flags)?.crawler_names()
    };
    Ok(backfill::Plan {
        job,
        function: opts.function.clone().unwrap_or(INTRADAY_FUNCTION.into()),
        tickers,
        crawlers,
    })
}
