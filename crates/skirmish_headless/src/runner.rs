//! Headless runner: a match driven by JSON-line commands.
//!
//! Reads commands from any `BufRead`, writes responses to any `Write`.
//! The binary wires these to stdin and stdout; tests use in-memory
//! buffers.

use std::io::{self, BufRead, Write};
use std::path::Path;

use skirmish_core::components::Team;
use skirmish_core::math::Vec2Fixed;
use skirmish_core::simulation::UnitSpawnParams;
use skirmish_core::templates::UnitTemplate;
use tracing::{debug, info, warn};

use crate::protocol::{Command, Response};
use crate::scenario::{Scenario, ScenarioError, ScenarioRun};

/// Runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Emit a full state after every `tick` command instead of an ack.
    pub auto_state: bool,
}

/// Command-driven match runner.
#[derive(Debug)]
pub struct HeadlessRunner {
    run: ScenarioRun,
    config: HeadlessConfig,
    game_over_sent: bool,
}

impl HeadlessRunner {
    /// Runner over a scenario.
    pub fn new(scenario: &Scenario, config: HeadlessConfig) -> Result<Self, ScenarioError> {
        Ok(Self {
            run: ScenarioRun::new(scenario)?,
            config,
            game_over_sent: false,
        })
    }

    /// The scenario run being driven.
    #[must_use]
    pub fn run_state(&self) -> &ScenarioRun {
        &self.run
    }

    /// Drive the loop until `quit` or end of input.
    pub fn serve<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        send(&mut output, &Response::ready(self.run.game().current_tick()))?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let responses = self.handle_line(line);
            let quit = responses.iter().any(|r| matches!(r, Response::Bye));
            for response in &responses {
                send(&mut output, response)?;
            }
            if quit {
                info!("Runner shutting down");
                return Ok(());
            }
        }

        debug!("Input closed");
        Ok(())
    }

    /// Parse and execute one line.
    pub fn handle_line(&mut self, line: &str) -> Vec<Response> {
        match Command::from_json(line) {
            Ok(cmd) => self.handle(cmd),
            Err(e) => {
                warn!(error = %e, "Malformed command");
                vec![Response::error(format!("Invalid command: {e}"), None)]
            }
        }
    }

    /// Execute one command.
    pub fn handle(&mut self, cmd: Command) -> Vec<Response> {
        let name = cmd.name();
        debug!(cmd = name, "Command received");

        let mut out = match cmd {
            Command::Tick { count } => self.tick(count),
            Command::Query => vec![self.state()],
            Command::Deploy {
                template,
                team,
                col,
                row,
                pay,
            } => vec![self.deploy(&template, team, col, row, pay)],
            Command::Spawn { team, x, y, stats } => vec![self.spawn(team, Vec2Fixed::new(x, y), stats)],
            Command::ToggleGrid => {
                self.run.game_mut().toggle_grid_overlay();
                vec![Response::ack(name)]
            }
            Command::Hash => vec![Response::StateHash {
                tick: self.run.game().current_tick(),
                hash: self.run.game().state_hash(),
            }],
            Command::LoadScenario { path } => vec![self.load_scenario(Path::new(&path))],
            Command::Stop => {
                self.run.game_mut().stop();
                vec![Response::ack(name)]
            }
            Command::Quit => vec![Response::Bye],
        };

        if !self.game_over_sent {
            if let Some(outcome) = self.run.game().outcome() {
                self.game_over_sent = true;
                out.push(Response::game_over(&outcome));
            }
        }
        out
    }

    fn tick(&mut self, count: u32) -> Vec<Response> {
        if let Some(outcome) = self.run.game().outcome() {
            return vec![Response::error(
                format!("Match ended at tick {}", outcome.tick),
                Some("tick"),
            )];
        }

        for _ in 0..count {
            if let Err(e) = self.run.step() {
                return vec![Response::error(e.to_string(), Some("tick"))];
            }
            if self.run.game().is_finished() {
                break;
            }
        }

        if self.config.auto_state {
            vec![self.state()]
        } else {
            vec![Response::ack("tick")]
        }
    }

    fn state(&self) -> Response {
        let game = self.run.game();
        Response::state(&game.snapshot(), game.state_hash())
    }

    fn deploy(&mut self, template: &str, team: u8, col: i32, row: i32, pay: bool) -> Response {
        let result = Team::new(team).and_then(|team| {
            let game = self.run.game_mut();
            if pay {
                game.deploy(template, team, col, row)
            } else {
                game.spawn_from_template(template, team, col, row)
            }
        });
        match result {
            Ok(id) => Response::Spawned {
                unit_id: id.0,
                template: template.to_string(),
                team,
            },
            Err(e) => Response::error(e.to_string(), Some("deploy")),
        }
    }

    fn spawn(&mut self, team: u8, position: Vec2Fixed, stats: UnitTemplate) -> Response {
        let template = stats.name.clone();
        let result = Team::new(team).and_then(|side| {
            self.run.game_mut().spawn_unit(UnitSpawnParams {
                team: side,
                position,
                stats,
            })
        });
        match result {
            Ok(id) => Response::Spawned {
                unit_id: id.0,
                template,
                team,
            },
            Err(e) => Response::error(e.to_string(), Some("spawn")),
        }
    }

    fn load_scenario(&mut self, path: &Path) -> Response {
        match Scenario::load(path).and_then(|s| ScenarioRun::new(&s)) {
            Ok(run) => {
                info!(path = %path.display(), "Scenario replaced");
                self.run = run;
                self.game_over_sent = false;
                Response::ready(self.run.game().current_tick())
            }
            Err(e) => Response::error(e.to_string(), Some("load_scenario")),
        }
    }
}

fn send<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()
}
