//! # Map Storage
//!
//! Persistence boundary for tile maps. The coordinator loads every stored
//! map once at startup and stores a map again whenever it changed.

use crate::{DelverError, DelverResult, Position, TileMap};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Where tile maps live between runs.
pub trait MapStorage: Send {
    /// Every stored map, with no pending changes.
    fn get_all(&self) -> DelverResult<Vec<TileMap>>;

    /// Stores the full contents of a map, replacing any earlier copy.
    fn store(&mut self, map: &TileMap) -> DelverResult<()>;
}

/// Keeps maps in memory; counts stores so callers can observe persistence.
#[derive(Debug, Default)]
pub struct MemoryMapStorage {
    maps: BTreeMap<String, TileMap>,
    stores: usize,
}

impl MemoryMapStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `store` calls so far.
    pub fn store_count(&self) -> usize {
        self.stores
    }
}

impl MapStorage for MemoryMapStorage {
    fn get_all(&self) -> DelverResult<Vec<TileMap>> {
        Ok(self
            .maps
            .values()
            .map(|map| TileMap::from_tiles(map.name(), map.tiles()))
            .collect())
    }

    fn store(&mut self, map: &TileMap) -> DelverResult<()> {
        self.maps.insert(
            map.name().to_string(),
            TileMap::from_tiles(map.name(), map.tiles()),
        );
        self.stores += 1;
        Ok(())
    }
}

/// On-disk form of one map.
#[derive(Debug, Serialize, Deserialize)]
struct StoredMap {
    name: String,
    tiles: Vec<StoredTile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTile {
    x: i32,
    y: i32,
    value: u32,
}

impl From<&TileMap> for StoredMap {
    fn from(map: &TileMap) -> Self {
        let mut tiles: Vec<StoredTile> = map
            .tiles()
            .map(|(pos, value)| StoredTile {
                x: pos.x,
                y: pos.y,
                value,
            })
            .collect();
        tiles.sort_by_key(|tile| (tile.y, tile.x));
        Self {
            name: map.name().to_string(),
            tiles,
        }
    }
}

impl From<StoredMap> for TileMap {
    fn from(stored: StoredMap) -> Self {
        TileMap::from_tiles(
            stored.name,
            stored
                .tiles
                .into_iter()
                .map(|tile| (Position::new(tile.x, tile.y), tile.value)),
        )
    }
}

/// One JSON file per map in a directory.
#[derive(Debug, Clone)]
pub struct JsonMapStorage {
    dir: PathBuf,
}

impl JsonMapStorage {
    /// Uses `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> DelverResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl MapStorage for JsonMapStorage {
    fn get_all(&self) -> DelverResult<Vec<TileMap>> {
        let mut maps = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            let stored: StoredMap = serde_json::from_str(&text).map_err(|e| {
                DelverError::Storage(format!("{}: {}", path.display(), e))
            })?;
            maps.push(TileMap::from(stored));
        }
        maps.sort_by(|a, b| a.name().cmp(b.name()));
        debug!("Read {} map(s) from {}", maps.len(), self.dir.display());
        Ok(maps)
    }

    fn store(&mut self, map: &TileMap) -> DelverResult<()> {
        let path = self.path_for(map.name());
        let text = serde_json::to_string(&StoredMap::from(map))?;
        fs::write(&path, text)?;
        debug!("Stored map {} to {}", map.name(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileFlags;

    #[test]
    fn test_memory_storage_round_trip() {
        let mut storage = MemoryMapStorage::new();
        let mut map = TileMap::new("level-1");
        map.set_tile(Position::new(2, 3), TileFlags::CORRIDOR.bits());
        storage.store(&map).unwrap();

        let loaded = storage.get_all().unwrap();
        assert_eq!(storage.store_count(), 1);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].get_tile(Position::new(2, 3)), TileFlags::CORRIDOR.bits());
        assert!(!loaded[0].has_changes());
    }

    #[test]
    fn test_json_file_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonMapStorage::new(dir.path()).unwrap();
        let path = storage.path_for("Dungeon Level/2");
        assert_eq!(path, dir.path().join("Dungeon_Level_2.json"));
    }
}
