//! ASCII board renderer for terminal review.
//!
//! One character per grid cell. Team 0 draws in upper case, team 1 in
//! lower case.

use std::fmt::Write as _;

use skirmish_core::components::{StructureKind, Team};
use skirmish_core::math::{ratio, Fixed, Vec2Fixed};
use skirmish_core::snapshot::{MatchSnapshot, StructureView};
use skirmish_core::terrain::{TerrainClass, TerrainGrid};

/// ASCII rendering options.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Append tick, elixir and crown lines.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            use_color: true,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const BLUE: &str = "\x1b[34m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

fn team_color(team: Team) -> &'static str {
    if team == Team::TOP {
        colors::BLUE
    } else {
        colors::RED
    }
}

fn team_case(ch: char, team: Team) -> char {
    if team == Team::TOP {
        ch.to_ascii_uppercase()
    } else {
        ch.to_ascii_lowercase()
    }
}

/// Glyph for a unit: first letter of its template name.
fn unit_char(name: &str, team: Team) -> char {
    let base = name.chars().next().filter(char::is_ascii_alphabetic).unwrap_or('u');
    team_case(base, team)
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    ch: char,
    color: &'static str,
}

impl Cell {
    const fn plain(ch: char) -> Self {
        Self { ch, color: "" }
    }
}

fn terrain_cell(class: TerrainClass) -> Cell {
    match class {
        TerrainClass::Ground => Cell::plain('.'),
        TerrainClass::Water => Cell {
            ch: '~',
            color: colors::CYAN,
        },
        TerrainClass::Bridge => Cell {
            ch: '=',
            color: colors::GRAY,
        },
    }
}

/// Cells whose centers fall inside a structure's footprint.
///
/// Cell-center offsets from the footprint center are whole or half cells,
/// so a quarter-cell margin keeps the test clear of rounding.
fn footprint(grid: &TerrainGrid, s: &StructureView) -> Vec<(usize, usize)> {
    let half = ratio(1, 2);
    let margin = ratio(1, 4);
    let reach_x = (Fixed::from_num(s.width) * half - margin) * grid.cell_width();
    let reach_y = (Fixed::from_num(s.height) * half - margin) * grid.cell_height();
    let mut cells = Vec::new();
    for row in 0..grid.rows() {
        for col in 0..grid.columns() {
            let center = grid.cell_to_world(col as i32, row as i32);
            if (center.x - s.position.x).abs() < reach_x && (center.y - s.position.y).abs() < reach_y {
                cells.push((col, row));
            }
        }
    }
    cells
}

/// Render a snapshot on its terrain grid.
///
/// Units draw over projectiles, projectiles over structures. With the grid
/// overlay flag set, column and row indices frame the board.
pub fn render_board(grid: &TerrainGrid, snapshot: &MatchSnapshot, config: &AsciiConfig) -> String {
    let columns = grid.columns();
    let rows = grid.rows();
    let mut board: Vec<Vec<Cell>> = (0..rows)
        .map(|row| {
            (0..columns)
                .map(|col| terrain_cell(grid.cell_at(col as i32, row as i32)))
                .collect()
        })
        .collect();

    for s in &snapshot.structures {
        let ch = match (s.active, s.kind) {
            (false, _) => 'x',
            (true, StructureKind::King) => team_case('k', s.team),
            (true, StructureKind::Regular) => team_case('t', s.team),
        };
        let cell = Cell {
            ch,
            color: if s.active { colors::BOLD } else { colors::GRAY },
        };
        for (col, row) in footprint(grid, s) {
            board[row][col] = cell;
        }
    }

    let mut place = |pos: Vec2Fixed, cell: Cell| {
        let at = grid.world_to_cell(pos);
        if grid.in_bounds(at.col, at.row) {
            board[at.row as usize][at.col as usize] = cell;
        }
    };
    for p in &snapshot.projectiles {
        place(
            p.position,
            Cell {
                ch: if p.area { '@' } else { '*' },
                color: team_color(p.team),
            },
        );
    }
    for u in &snapshot.units {
        place(
            u.position,
            Cell {
                ch: unit_char(&u.name, u.team),
                color: team_color(u.team),
            },
        );
    }

    let mut output = String::new();
    if snapshot.show_grid {
        output.push_str("    ");
        for col in 0..columns {
            output.push(char::from_digit((col % 10) as u32, 10).unwrap_or(' '));
        }
        output.push('\n');
    }
    for (row, cells) in board.iter().enumerate() {
        if snapshot.show_grid {
            let _ = write!(output, "{row:>3} ");
        }
        for cell in cells {
            if config.use_color && !cell.color.is_empty() {
                output.push_str(cell.color);
                output.push(cell.ch);
                output.push_str(colors::RESET);
            } else {
                output.push(cell.ch);
            }
        }
        output.push('\n');
    }

    if config.show_legend {
        output.push_str(&legend(snapshot));
    }
    output
}

fn legend(snapshot: &MatchSnapshot) -> String {
    let mut out = format!("Tick {}", snapshot.tick);
    for p in &snapshot.players {
        let units = snapshot.units.iter().filter(|u| u.team == p.team).count();
        let _ = write!(
            out,
            " | Team {}: {} units, {:.1} elixir, {} crowns",
            u8::from(p.team),
            units,
            p.elixir.amount.to_num::<f64>(),
            p.crowns
        );
    }
    out.push('\n');
    if let Some(outcome) = snapshot.outcome {
        let winner = outcome
            .winner
            .map_or_else(|| "draw".to_string(), |t| format!("team {} wins", u8::from(t)));
        let _ = writeln!(out, "Finished at tick {}: {} ({:?})", outcome.tick, winner, outcome.reason);
    }
    out
}
