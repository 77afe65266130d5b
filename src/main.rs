//! WavesLab entry point: CLI wiring and config-driven driver construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, info};

use waveslab_sim::cli::{Cli, Command, RunArgs};
use waveslab_sim::config::{Mode, ScenarioConfig, SimulationConfig};
use waveslab_sim::io::export::CycleLog;
use waveslab_sim::logging::init_logging;
use waveslab_sim::reporting;
use waveslab_sim::sim::clock::{Horizon, ReplayClock};
use waveslab_sim::sim::driver::{Cadence, Driver, Historical, RealTime};
use waveslab_sim::sim::household::Household;
use waveslab_sim::sim::types::RunReport;
use waveslab_sim::storage::{JsonFileRepository, NodeRepository};
use waveslab_sim::transport::{HttpEndpointTransport, InfluxSink, Transport};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let data_dir = cli.data_dir;
    match cli.command {
        Command::Run(args) => run(args, data_dir).await,
        #[cfg(feature = "api")]
        Command::Serve { port } => {
            let repo = open_repo(&resolve_data_dir(data_dir))?;
            let state = Arc::new(waveslab_sim::api::AppState { repo });
            let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
            waveslab_sim::api::serve(state, addr)
                .await
                .context("API server failed")
        }
        command => manage(command, &open_repo(&resolve_data_dir(data_dir))?),
    }
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| SimulationConfig::default().data_dir)
}

fn open_repo(dir: &Path) -> anyhow::Result<Arc<dyn NodeRepository>> {
    let repo = JsonFileRepository::open(dir)
        .with_context(|| format!("cannot open node store in \"{}\"", dir.display()))?;
    Ok(Arc::new(repo))
}

/// Repository commands: one call, one printed result.
fn manage(command: Command, repo: &Arc<dyn NodeRepository>) -> anyhow::Result<()> {
    match command {
        Command::Status => println!("{}", reporting::status_table(&repo.list_all()?)),
        Command::Info { active, utility } => {
            let mut nodes = if active {
                repo.list_active()?
            } else {
                repo.list_all()?
            };
            if let Some(utility) = utility {
                nodes.retain(|n| n.node_type == utility);
            }
            println!("{}", reporting::info_table(&nodes));
        }
        Command::Switch { node_id } => {
            let node = repo.switch(&node_id)?;
            println!("Node '{}' switched to {}", node.id, node.status);
        }
        Command::Users => println!("{}", reporting::users_table(&repo.list_users()?)),
        Command::Assign { node_id, username } => {
            let node = repo.assign_user(&node_id, &username)?;
            println!("Node '{}' assigned to '{username}'", node.id);
        }
        Command::SetEndpoint { node_id, url } => {
            let node = repo.update_endpoint(&node_id, &url)?;
            println!("Node '{}' now reports to {}", node.id, node.endpoint);
        }
        other => bail!("unsupported command {other:?}"),
    }
    Ok(())
}

fn load_scenario(args: &RunArgs) -> anyhow::Result<ScenarioConfig> {
    // --scenario takes priority, then --preset, then the realtime default
    let scenario = if let Some(path) = &args.scenario {
        ScenarioConfig::from_toml_file(path)?
    } else if let Some(name) = &args.preset {
        ScenarioConfig::from_preset(name)?
    } else {
        ScenarioConfig::realtime()
    };
    Ok(scenario)
}

async fn run(args: RunArgs, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let mut scenario = load_scenario(&args)?;
    if let Some(seed) = args.seed {
        scenario.simulation.seed = Some(seed);
    }
    if let Some(dir) = data_dir {
        scenario.simulation.data_dir = dir;
    }
    scenario.sink.apply_env_overrides();

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        bail!("scenario has {} invalid field(s)", errors.len());
    }

    let repo = open_repo(&scenario.simulation.data_dir)?;
    let household = Household::new(repo, scenario.switch_policy()?, scenario.simulation.seed);
    let cycle_log = args
        .cycle_log
        .as_deref()
        .map(|path| {
            CycleLog::create(path)
                .with_context(|| format!("cannot create cycle log \"{}\"", path.display()))
        })
        .transpose()?;

    let timeout = scenario.http_timeout();
    let parts = Parts { household, cycle_log };
    let report = if scenario.simulation.transport == "influx" {
        with_cadence(&scenario, parts, InfluxSink::new(&scenario.sink, timeout)?).await?
    } else {
        with_cadence(&scenario, parts, HttpEndpointTransport::new(timeout)?).await?
    };

    println!("\n{report}");
    if let Some(path) = &args.cycle_log {
        eprintln!("Cycle log written to {}", path.display());
    }
    Ok(())
}

/// Driver inputs that do not depend on the cadence or transport type.
struct Parts {
    household: Household,
    cycle_log: Option<CycleLog>,
}

async fn with_cadence<T>(scenario: &ScenarioConfig, parts: Parts, transport: T) -> anyhow::Result<RunReport>
where
    T: Transport + 'static,
{
    match scenario.mode() {
        Mode::RealTime => {
            let cadence = RealTime::new(Duration::from_secs(scenario.realtime.interval_secs));
            drive(parts, transport, cadence).await
        }
        Mode::Historical => {
            let h = &scenario.historical;
            let horizon = h.end.map_or(Horizon::WallClock, Horizon::Fixed);
            let clock = ReplayClock::new(h.start, scenario.replay_increment()?, horizon);
            let cadence = Historical::new(clock).with_pause(Duration::from_millis(h.pause_ms));
            drive(parts, transport, cadence).await
        }
    }
}

/// Runs the driver on its own task until it finishes or Ctrl-C stops it.
async fn drive<C, T>(parts: Parts, transport: T, cadence: C) -> anyhow::Result<RunReport>
where
    C: Cadence + 'static,
    T: Transport + 'static,
{
    let mut driver = Driver::new(parts.household, transport, cadence);
    if let Some(log) = parts.cycle_log {
        driver = driver.with_cycle_log(log);
    }
    let handle = driver.handle();
    let mut task = tokio::spawn(driver.run());

    tokio::select! {
        finished = &mut task => return Ok(finished?),
        signal = tokio::signal::ctrl_c() => {
            signal.context("cannot listen for Ctrl-C")?;
            info!("Interrupt received");
            handle.stop();
        }
    }
    Ok(task.await?)
}
