//! End-to-end tests of the `waveslab` binary against a temporary store.

mod common;

use std::path::Path;
use std::process::{Command, Output};

use waveslab_sim::config::ScenarioConfig;
use waveslab_sim::devices::{NodeStatus, NodeType, VirtualUser, WaveNode};
use waveslab_sim::storage::{JsonFileRepository, NodeRepository};

use common::kitchen_faucet;

fn seed_store(dir: &Path) {
    let nodes = vec![
        kitchen_faucet(),
        WaveNode::new("Living Room Light", NodeType::Electricity),
        WaveNode::new("Boiler", NodeType::Gas),
    ];
    JsonFileRepository::create(dir, &nodes, &[VirtualUser::new("alice"), VirtualUser::new("bob")])
        .expect("store");
}

fn waveslab(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_waveslab"))
        .arg("--data-dir")
        .arg(dir)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("waveslab process should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn switch_persists_and_status_reports_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_store(dir.path());

    let output = waveslab(dir.path(), &["switch", "boiler"]);
    assert!(output.status.success(), "switch failed: {output:?}");
    assert!(stdout(&output).contains("Node 'boiler' switched to on"));

    let output = waveslab(dir.path(), &["status"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(&format!("{:<30} on  - Boiler", "[boiler]")), "got {text}");

    let repo = JsonFileRepository::open(dir.path()).expect("open");
    let boiler = repo.get("boiler").expect("get").expect("present");
    assert_eq!(boiler.status, NodeStatus::On);
}

#[test]
fn switch_unknown_node_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_store(dir.path());

    let output = waveslab(dir.path(), &["switch", "garage-door"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("garage-door"));
}

#[test]
fn info_filters_active_by_utility() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_store(dir.path());

    let output = waveslab(dir.path(), &["info", "--active", "--utility", "water"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("[kitchen-faucet]"));
    assert!(!text.contains("[boiler]"));
}

#[test]
fn assign_and_set_endpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_store(dir.path());

    assert!(waveslab(dir.path(), &["assign", "boiler", "bob"]).status.success());
    assert!(!waveslab(dir.path(), &["assign", "boiler", "carol"]).status.success());
    let url = "http://localhost:3002/m?smart_furniture_hookup_id=b1";
    assert!(waveslab(dir.path(), &["set-endpoint", "boiler", url]).status.success());

    let repo = JsonFileRepository::open(dir.path()).expect("open");
    let boiler = repo.get("boiler").expect("get").expect("present");
    assert_eq!(boiler.assigned_user.as_deref(), Some("bob"));
    assert_eq!(boiler.endpoint, url);

    let users = stdout(&waveslab(dir.path(), &["users"]));
    assert!(users.contains("alice") && users.contains("bob"));
}

#[test]
fn bounded_replay_runs_to_completion() {
    let dir = tempfile::tempdir().expect("tempdir");
    // no endpoints, so every reading is skipped and nothing leaves the process
    let nodes = vec![
        WaveNode::new("Living Room Light", NodeType::Electricity),
        WaveNode::new("Boiler", NodeType::Gas),
    ];
    JsonFileRepository::create(dir.path(), &nodes, &[]).expect("store");

    let scenario = dir.path().join("replay.toml");
    std::fs::write(
        &scenario,
        r#"
[simulation]
mode = "historical"
transport = "http"
seed = 3

[historical]
start = "2025-10-01T00:00:00"
end = "2025-10-01T01:00:00"
increment_secs = 60
"#,
    )
    .expect("write scenario");
    let log = dir.path().join("cycles.csv");

    let output = waveslab(
        dir.path(),
        &[
            "run",
            "--scenario",
            scenario.to_str().expect("utf-8 path"),
            "--cycle-log",
            log.to_str().expect("utf-8 path"),
        ],
    );

    assert!(output.status.success(), "run failed: {output:?}");
    let text = stdout(&output);
    assert!(text.contains("Ended:            caught up"), "got {text}");
    assert!(text.contains("Iterations:       60"));
    assert!(text.contains("Switch cycles:    4"));
    let rows = std::fs::read_to_string(&log).expect("cycle log");
    assert_eq!(rows.lines().count(), 61);
}

#[test]
fn shipped_scenarios_validate() {
    for name in ["realtime", "historical"] {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("scenarios")
            .join(format!("{name}.toml"));
        let cfg = ScenarioConfig::from_toml_file(&path).expect("scenario parses");
        let errors = cfg.validate();
        assert!(errors.is_empty(), "{name}: {errors:?}");
    }
}

#[test]
fn invalid_preset_exits_non_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_store(dir.path());
    let output = waveslab(dir.path(), &["run", "--preset", "turbo"]);
    assert!(!output.status.success());
}
