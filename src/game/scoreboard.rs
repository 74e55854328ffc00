//! Scoreboard building

use serde::{Deserialize, Serialize};

use super::session::Roster;
use crate::util::time::format_clock;

/// Rows shown on the scoreboard
pub const SCOREBOARD_ROWS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub kills: u32,
    /// Rendered struck through
    pub left: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    /// Remaining time as `m:ss`
    pub time_left: String,
    pub entries: Vec<ScoreEntry>,
}

impl Scoreboard {
    /// Top participants by kills; ties keep roster order
    pub fn build(time_left_ticks: i64, roster: &Roster) -> Self {
        let mut entries: Vec<ScoreEntry> = roster
            .iter()
            .map(|s| ScoreEntry {
                name: s.name.clone(),
                kills: s.kills(),
                left: s.has_left(),
            })
            .collect();
        entries.sort_by(|a, b| b.kills.cmp(&a.kills));
        entries.truncate(SCOREBOARD_ROWS);

        Self {
            time_left: format_clock(time_left_ticks),
            entries,
        }
    }
}

/// Publishes the scoreboard at a fixed interval, and only when it changed
pub struct ScoreboardBuilder {
    ticks_since_update: u32,
    update_interval: u32,
    last: Option<Scoreboard>,
}

impl ScoreboardBuilder {
    pub fn new(update_interval: u32) -> Self {
        Self {
            ticks_since_update: update_interval,
            update_interval,
            last: None,
        }
    }

    /// Check on the next tick regardless of the interval
    pub fn force_next(&mut self) {
        self.ticks_since_update = self.update_interval;
    }

    pub fn update(&mut self, time_left_ticks: i64, roster: &Roster) -> Option<Scoreboard> {
        if self.ticks_since_update < self.update_interval {
            self.ticks_since_update += 1;
            return None;
        }
        self.ticks_since_update = 1;

        let board = Scoreboard::build(time_left_ticks, roster);
        if self.last.as_ref() == Some(&board) {
            return None;
        }
        self.last = Some(board.clone());
        Some(board)
    }
}
