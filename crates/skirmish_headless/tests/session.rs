//! End-to-end runner sessions over in-memory pipes and scenario files.

use std::io::Cursor;
use std::path::Path;

use serde_json::Value;
use skirmish_headless::batch::verify_determinism;
use skirmish_headless::{HeadlessConfig, HeadlessRunner, Scenario, ScenarioRun};

fn session(runner: &mut HeadlessRunner, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    runner.serve(Cursor::new(input), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn empty_runner() -> HeadlessRunner {
    HeadlessRunner::new(&Scenario::default(), HeadlessConfig::default()).unwrap()
}

fn mirror_path() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/mirror.ron"))
}

#[test]
fn test_scripted_session() {
    let mut runner = empty_runner();
    let input = r#"{"cmd":"deploy","template":"Knight","team":0,"col":6,"row":18}
{"cmd":"tick","count":10}

{"cmd":"query"}
{"cmd":"hash"}
{"cmd":"quit"}
{"cmd":"tick"}
"#;
    let out = session(&mut runner, input);

    let types: Vec<&str> = out.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["ready", "spawned", "ack", "state", "state_hash", "bye"]);

    assert_eq!(out[1]["template"], "Knight");
    let state = &out[3];
    assert_eq!(state["tick"], 10);
    assert_eq!(state["status"], "in_progress");
    assert_eq!(state["units"].as_array().unwrap().len(), 1);
    assert_eq!(state["structures"].as_array().unwrap().len(), 6);
    assert_eq!(state["hash"], out[4]["hash"]);
    assert_eq!(runner.run_state().game().current_tick(), 10);
}

#[test]
fn test_bad_lines_do_not_end_session() {
    let mut runner = empty_runner();
    let out = session(
        &mut runner,
        "not json\n{\"cmd\":\"deploy\",\"template\":\"Knight\",\"team\":4,\"col\":1,\"row\":1}\n{\"cmd\":\"quit\"}\n",
    );
    assert_eq!(out.len(), 4);
    assert_eq!(out[1]["type"], "error");
    assert_eq!(out[2]["type"], "error");
    assert_eq!(out[2]["cmd"], "deploy");
    assert_eq!(out[3]["type"], "bye");
}

#[test]
fn test_load_scenario_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("duel.ron");
    std::fs::write(
        &path,
        r#"(
            name: "duel",
            deployments: [
                (tick: 0, template: "Giant", team: 0, col: 28, row: 18),
                (tick: 0, template: "Giant", team: 1, col: 28, row: 45),
            ],
        )"#,
    )
    .unwrap();

    let mut runner = empty_runner();
    let load = serde_json::json!({"cmd": "load_scenario", "path": path.to_str().unwrap()});
    let input = format!("{load}\n{{\"cmd\":\"tick\"}}\n{{\"cmd\":\"query\"}}\n");
    let out = session(&mut runner, &input);

    assert_eq!(out[1]["type"], "ready");
    assert_eq!(out[1]["tick"], 0);
    assert_eq!(out[3]["units"].as_array().unwrap().len(), 2);
}

#[test]
fn test_load_missing_scenario_keeps_match() {
    let mut runner = empty_runner();
    let out = session(
        &mut runner,
        "{\"cmd\":\"tick\",\"count\":3}\n{\"cmd\":\"load_scenario\",\"path\":\"/nope/missing.ron\"}\n",
    );
    assert_eq!(out[2]["type"], "error");
    assert_eq!(runner.run_state().game().current_tick(), 3);
}

#[test]
fn test_stop_reports_game_over_then_rejects_ticks() {
    let mut runner = empty_runner();
    let out = session(&mut runner, "{\"cmd\":\"stop\"}\n{\"cmd\":\"tick\"}\n{\"cmd\":\"query\"}\n");
    let types: Vec<&str> = out.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["ready", "ack", "game_over", "error", "state"]);
    assert_eq!(out[2]["reason"], "stopped");
    assert!(out[2]["winner"].is_null());
    assert_eq!(out[4]["status"], "finished");
}

#[test]
fn test_bundled_scenario_parses_and_runs() {
    let scenario = Scenario::load(mirror_path()).unwrap();
    assert_eq!(scenario.name, "Mirror Lanes");

    let scenario = Scenario {
        max_ticks: 250,
        ..scenario
    };
    let mut run = ScenarioRun::new(&scenario).unwrap();
    let report = run.run_to_end();
    assert_eq!(report.ticks, 250);
    assert!(report.units_deployed >= 8);
}

#[test]
fn test_bundled_scenario_is_deterministic() {
    let scenario = Scenario {
        max_ticks: 400,
        ..Scenario::load(mirror_path()).unwrap()
    };
    assert_eq!(verify_determinism(&scenario, 3), Ok(true));
}
