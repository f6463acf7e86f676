use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use ferry_api::{ObjectKey, Plan};
use ferry_controller::prelude::*;
use ferry_controller::{init_logging, Manifest};
use ferry_inventory::{ClientConfig, Inventory, RestClient, WebInventory};
use ferry_webhook::ProviderAdmitter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arg::new("config")
        .long("config")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Settings file (TOML)");
    let manifest = Arg::new("manifest")
        .long("manifest")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Objects to load (YAML)");

    let cli = Command::new("ferry-controller")
        .version(ferry_controller::VERSION)
        .about("Plan reconciliation controller")
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Reconcile plans until interrupted")
                .arg(config.clone())
                .arg(manifest.clone()),
        )
        .subcommand(
            Command::new("reconcile")
                .about("Reconcile one plan and print its status")
                .arg(config)
                .arg(manifest)
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .required(true)
                        .help("Plan key as namespace/name"),
                )
                .arg(
                    Arg::new("passes")
                        .long("passes")
                        .default_value("10")
                        .value_parser(clap::value_parser!(usize))
                        .help("Maximum passes before giving up"),
                ),
        )
        .get_matches();

    match cli.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("reconcile", args)) => reconcile(args).await,
        _ => anyhow::bail!("unknown subcommand"),
    }
}

struct Runtime {
    store: Arc<MemoryStore>,
    reconciler: Arc<Reconciler>,
}

fn setup(args: &ArgMatches) -> anyhow::Result<Runtime> {
    let settings = match args.get_one::<PathBuf>("config") {
        Some(path) => Settings::load(path)?,
        None => Settings::new(),
    };
    init_logging(settings.log_format);

    let store = Arc::new(MemoryStore::new().with_admission(Arc::new(ProviderAdmitter::new())));
    let manifest_path = args
        .get_one::<PathBuf>("manifest")
        .context("--manifest is required")?;
    Manifest::load(manifest_path)?.apply(&store)?;

    let inventory = inventory(&settings)?;
    let engine = Arc::new(SimulatedEngine::new(store.clone(), Duration::from_secs(1)));
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        inventory,
        engine,
        Arc::new(TracingRecorder),
        settings,
    ));
    Ok(Runtime { store, reconciler })
}

fn inventory(settings: &Settings) -> anyhow::Result<Option<Arc<dyn Inventory>>> {
    let Some(url) = &settings.inventory.url else {
        return Ok(None);
    };
    let mut config = ClientConfig::new(url.clone()).with_timeout(settings.inventory.timeout());
    if let (Some(user), Some(password)) = (&settings.inventory.user, &settings.inventory.password) {
        config = config.with_credentials(user.clone(), password.clone());
    }
    if let Some(path) = &settings.inventory.cacert {
        let pem = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        config = config.with_cacert(pem);
    }
    Ok(Some(Arc::new(WebInventory::new(RestClient::new(config)))))
}

async fn run(args: &ArgMatches) -> anyhow::Result<()> {
    let Runtime { store, reconciler } = setup(args)?;
    let controller = Controller::new(reconciler, store);
    controller
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to wait for ctrl-c");
            }
        })
        .await?;
    Ok(())
}

async fn reconcile(args: &ArgMatches) -> anyhow::Result<()> {
    let Runtime { store, reconciler } = setup(args)?;
    let key: ObjectKey = args
        .get_one::<String>("plan")
        .context("--plan is required")?
        .parse()?;
    let passes = args.get_one::<usize>("passes").copied().unwrap_or(10);

    for pass in 1..=passes {
        match reconciler.reconcile(&key).await {
            Action::Done => break,
            Action::Requeue(delay) => {
                tracing::info!(pass, ?delay, "requeue");
                tokio::time::sleep(delay).await;
            }
        }
    }

    let plan: Plan = store.get(&key)?;
    println!("{}", serde_json::to_string_pretty(&plan.status)?);
    Ok(())
}
