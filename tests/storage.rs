//! Integration tests for map persistence.

use delver::{
    AgentState, DelverResult, JsonMapStorage, MapStorage, NavigationCoordinator, Observation,
    Position, TileFlags, TileMap,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Storage that counts store calls and can be told to fail.
struct CountingStorage {
    stores: Arc<AtomicUsize>,
    fail: bool,
}

impl MapStorage for CountingStorage {
    fn get_all(&self) -> DelverResult<Vec<TileMap>> {
        Ok(Vec::new())
    }

    fn store(&mut self, _map: &TileMap) -> DelverResult<()> {
        if self.fail {
            return Err(delver::DelverError::Storage("disk full".to_string()));
        }
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn room_observation(position: Position) -> Observation {
    let room = TileFlags::ROOM.bits();
    let wall = TileFlags::PERIMETER.bits();
    Observation::new(
        "level-1",
        position,
        Position::origin(),
        vec![
            vec![wall, wall, wall, wall],
            vec![wall, room, room, wall],
            vec![wall, wall, wall, wall],
        ],
    )
}

#[test]
fn test_json_storage_round_trip() -> DelverResult<()> {
    let dir = tempfile::tempdir()?;
    let mut storage = JsonMapStorage::new(dir.path())?;

    let mut first = TileMap::new("level-1");
    first.set_tile(Position::new(-3, 7), TileFlags::CORRIDOR.bits());
    first.set_tile(Position::new(4, 4), (TileFlags::ROOM | TileFlags::STAIR_DOWN).bits());
    let mut second = TileMap::new("level 2");
    second.set_tile(Position::new(0, 0), TileFlags::DOOR1.bits());

    storage.store(&first)?;
    storage.store(&second)?;
    storage.store(&first)?;

    let loaded = JsonMapStorage::new(dir.path())?.get_all()?;
    assert_eq!(loaded.len(), 2);
    let level_one = loaded
        .iter()
        .find(|map| map.name() == "level-1")
        .expect("level-1 stored");
    assert_eq!(level_one.get_tile(Position::new(-3, 7)), TileFlags::CORRIDOR.bits());
    assert_eq!(
        level_one.positions_with(TileFlags::STAIR_DOWN),
        vec![Position::new(4, 4)]
    );
    assert!(loaded.iter().all(|map| !map.has_changes()));
    Ok(())
}

#[test]
fn test_coordinator_loads_stored_maps() -> DelverResult<()> {
    let dir = tempfile::tempdir()?;
    {
        let coordinator = NavigationCoordinator::new(Box::new(JsonMapStorage::new(dir.path())?))?;
        coordinator.add_agent(AgentState::new("a1", "Alice", "level-1", Position::new(1, 1)));
        coordinator.apply_observation("a1", &room_observation(Position::new(1, 1)));
    }

    let coordinator = NavigationCoordinator::new(Box::new(JsonMapStorage::new(dir.path())?))?;
    assert_eq!(coordinator.map_names(), vec!["level-1".to_string()]);
    let map = coordinator.map_snapshot("level-1").expect("map loaded");
    assert_eq!(map.len(), 12);
    assert_eq!(map.get_tile(Position::new(2, 1)), TileFlags::ROOM.bits());
    Ok(())
}

#[test]
fn test_map_stored_once_per_change() -> DelverResult<()> {
    let stores = Arc::new(AtomicUsize::new(0));
    let coordinator = NavigationCoordinator::new(Box::new(CountingStorage {
        stores: stores.clone(),
        fail: false,
    }))?;
    coordinator.add_agent(AgentState::new("a1", "Alice", "level-1", Position::new(1, 1)));

    coordinator.apply_observation("a1", &room_observation(Position::new(1, 1)));
    coordinator.apply_observation("a1", &room_observation(Position::new(2, 1)));
    assert_eq!(stores.load(Ordering::SeqCst), 1, "identical tiles are not stored again");

    let mut changed = room_observation(Position::new(2, 1));
    changed.area[1][1] = TileFlags::CORRIDOR.bits();
    coordinator.apply_observation("a1", &changed);
    assert_eq!(stores.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_failed_store_keeps_map_dirty() -> DelverResult<()> {
    let coordinator = NavigationCoordinator::new(Box::new(CountingStorage {
        stores: Arc::new(AtomicUsize::new(0)),
        fail: true,
    }))?;
    coordinator.add_agent(AgentState::new("a1", "Alice", "level-1", Position::new(1, 1)));
    coordinator.apply_observation("a1", &room_observation(Position::new(1, 1)));

    let map = coordinator.map_snapshot("level-1").expect("map created");
    assert!(map.has_changes());
    assert!(coordinator
        .messages()
        .iter()
        .any(|m| m.contains("disk full")));
    Ok(())
}
