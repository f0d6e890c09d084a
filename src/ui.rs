//! Console rendering of boards and engine events.

use std::fmt::Write as _;

use crate::board::BoardData;
use crate::engine::{GameEngine, GameEvent, StatusObserver};

/// `(x, y)` as shown to players, e.g. `B4` for (1, 3).
pub fn format_coord(x: usize, y: usize) -> String {
    let col = (b'A' + x as u8) as char;
    format!("{}{}", col, y + 1)
}

/// Parse `B4` style input into `(x, y)`.
pub fn parse_coord(input: &str) -> Option<(usize, usize)> {
    let input = input.trim();
    if input.len() < 2 {
        return None;
    }
    let mut chars = input.chars();
    let col_ch = chars.next()?.to_ascii_uppercase();
    if !col_ch.is_ascii_uppercase() {
        return None;
    }
    let col = (col_ch as u8 - b'A') as usize;
    let row: usize = chars.as_str().parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((col, row - 1))
}

/// Grid with column letters and row numbers. Intact ships are only drawn
/// when `reveal` is set.
pub fn render_board(board: &BoardData, reveal: bool) -> String {
    let size = board.size();
    let mut out = String::from("   ");
    for c in 0..size {
        let _ = write!(out, " {}", (b'A' + c as u8) as char);
    }
    out.push('\n');
    for y in 0..size {
        let _ = write!(out, "{:2} ", y + 1);
        for x in 0..size {
            let ch = match board.cell(x, y) {
                Ok(cell) if cell.occupied && cell.shot => 'X',
                Ok(cell) if cell.shot => 'o',
                Ok(cell) if reveal && cell.occupied => 'S',
                _ => '.',
            };
            let _ = write!(out, " {}", ch);
        }
        out.push('\n');
    }
    out
}

/// Both boards of the local player plus the chat log.
pub fn render_view(engine: &GameEngine) -> String {
    let mut out = String::new();
    out.push_str("Opponent board:\n");
    out.push_str(&render_board(engine.opponent_board(), false));
    out.push_str("\nYour board:\n");
    out.push_str(&render_board(engine.own_board(), true));
    for (player, text) in engine.messages() {
        let _ = writeln!(out, "[player {}] {}", player, text);
    }
    out
}

/// Prints engine events to stdout.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl StatusObserver for ConsoleDisplay {
    fn notify(&self, event: &GameEvent) {
        match event {
            GameEvent::Phase(phase) => println!(">> {}", phase),
            GameEvent::Status(text) => println!("{}", text),
        }
    }
}
