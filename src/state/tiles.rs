//! Tile configuration.
//!
//! The store may publish a table of tiles (bakery items) with display
//! metadata. The game itself only cares about the largest configured value,
//! which becomes the winning tile.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::board::is_tile_value;
use super::session::DEFAULT_WINNING_TILE;

/// One configured tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTile")]
pub struct TileDefinition {
    pub id: Option<i64>,
    pub tile_value: u32,
    pub item_name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Tile record as the store publishes it. Older tables spell the fields
/// differently and some records carry both spellings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTile {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    tile_value: Option<u32>,
    #[serde(default)]
    value: Option<u32>,
    #[serde(default)]
    item_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    emoji: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    background_color: Option<String>,
}

impl TryFrom<RawTile> for TileDefinition {
    type Error = String;

    fn try_from(raw: RawTile) -> Result<Self, Self::Error> {
        let tile_value = raw
            .tile_value
            .filter(|&v| v != 0)
            .or(raw.value)
            .filter(|&v| v != 0)
            .ok_or_else(|| "tile has no value".to_string())?;

        Ok(Self {
            id: raw.id,
            tile_value,
            item_name: raw.item_name.or(raw.name).or(raw.label),
            icon: raw.icon.or(raw.emoji),
            color: raw.color.or(raw.background_color),
        })
    }
}

/// Read a published tile table, skipping records that cannot be used.
pub fn parse_tile_table(records: Vec<Value>) -> Vec<TileDefinition> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(tile) => Some(tile),
            Err(err) => {
                tracing::debug!(error = %err, "Skipping tile record");
                None
            }
        })
        .collect()
}

impl TileDefinition {
    pub fn new(tile_value: u32, item_name: impl Into<String>) -> Self {
        Self {
            id: None,
            tile_value,
            item_name: Some(item_name.into()),
            icon: None,
            color: None,
        }
    }

    /// Name to show for this tile.
    pub fn display_name(&self) -> String {
        match &self.item_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Tile {}", self.tile_value),
        }
    }
}

/// Winning tile for a tile table: the largest valid value, or the default.
pub fn winning_tile_value(tiles: &[TileDefinition]) -> u32 {
    tiles
        .iter()
        .map(|t| t.tile_value)
        .filter(|&v| is_tile_value(v))
        .max()
        .unwrap_or(DEFAULT_WINNING_TILE)
}
