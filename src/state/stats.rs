//! Durable player statistics.
//!
//! `StatsSnapshot` mirrors the profile record kept by the remote store.
//! Snapshots are never edited in place: each sync takes the freshly fetched
//! remote snapshot and derives a new one from local deltas.

use serde::{Deserialize, Deserializer, Serialize};

fn default_level() -> u32 {
    1
}

/// Read `null` as the type's default, the way the store leaves fresh
/// profiles.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn nullable_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Option::<u32>::deserialize(deserializer).map(|level| level.unwrap_or_else(default_level))
}

/// Aggregate profile record exchanged with the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsSnapshot {
    #[serde(deserialize_with = "nullable")]
    pub current_score: u64,

    #[serde(deserialize_with = "nullable")]
    pub highest_score: u64,

    #[serde(deserialize_with = "nullable")]
    pub best_tile_achieved: u32,

    #[serde(deserialize_with = "nullable_level")]
    pub level: u32,

    #[serde(deserialize_with = "nullable")]
    pub games_played: u32,

    #[serde(deserialize_with = "nullable")]
    pub average_score: f64,

    /// Travels as `HH:MM:SS`.
    #[serde(rename = "totalPlayTime", with = "play_time")]
    pub total_play_time_secs: u64,

    #[serde(deserialize_with = "nullable")]
    pub win_streak: u32,

    #[serde(deserialize_with = "nullable")]
    pub total_moves: u64,

    #[serde(deserialize_with = "nullable")]
    pub power_ups_used: u32,

    pub favorite_item: Option<String>,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            current_score: 0,
            highest_score: 0,
            best_tile_achieved: 0,
            level: default_level(),
            games_played: 0,
            average_score: 0.0,
            total_play_time_secs: 0,
            win_streak: 0,
            total_moves: 0,
            power_ups_used: 0,
            favorite_item: None,
        }
    }
}

/// Local progress not yet written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressDelta {
    pub moves: u64,
    pub play_secs: u64,
    pub highest_tile: u32,
}

impl ProgressDelta {
    pub fn is_empty(&self) -> bool {
        self.moves == 0 && self.play_secs == 0
    }
}

/// Final figures of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub score: u64,
    pub won: bool,
    /// Progress since the last successful sync.
    pub unsynced: ProgressDelta,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl StatsSnapshot {
    /// Fold in-progress play into the totals.
    ///
    /// Game counters (`gamesPlayed`, `averageScore`, `winStreak`,
    /// `currentScore`, `highestScore`) are left alone; only a finished game
    /// moves them.
    #[must_use]
    pub fn with_progress(&self, delta: &ProgressDelta) -> Self {
        Self {
            best_tile_achieved: self.best_tile_achieved.max(delta.highest_tile),
            total_moves: self.total_moves.saturating_add(delta.moves),
            total_play_time_secs: self.total_play_time_secs.saturating_add(delta.play_secs),
            ..self.clone()
        }
    }

    /// Record a finished game.
    #[must_use]
    pub fn with_outcome(&self, result: &GameResult) -> Self {
        let progressed = self.with_progress(&result.unsynced);
        let games_played = self.games_played.saturating_add(1);
        let total = self.average_score * f64::from(self.games_played) + result.score as f64;

        Self {
            current_score: result.score,
            highest_score: self.highest_score.max(result.score),
            games_played,
            average_score: round_cents(total / f64::from(games_played)),
            win_streak: if result.won {
                self.win_streak.saturating_add(1)
            } else {
                0
            },
            ..progressed
        }
    }
}

/// `HH:MM:SS` encoding of play time.
pub mod play_time {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(secs: u64) -> String {
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    /// Parse `HH:MM:SS`. Anything else, including totals past `u64`,
    /// reads as zero.
    pub fn parse(text: &str) -> u64 {
        let parts: Vec<&str> = text.trim().split(':').collect();
        let [h, m, s] = parts.as_slice() else {
            return 0;
        };
        match (h.parse::<u64>(), m.parse::<u64>(), s.parse::<u64>()) {
            (Ok(h), Ok(m), Ok(s)) => h
                .checked_mul(3600)
                .zip(m.checked_mul(60))
                .and_then(|(h, m)| h.checked_add(m))
                .and_then(|hm| hm.checked_add(s))
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn serialize<S: Serializer>(secs: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*secs))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(u64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Text(text)) => parse(&text),
            Some(Raw::Seconds(secs)) => secs,
            None => 0,
        })
    }
}
