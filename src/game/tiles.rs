//! # Tile Flags
//!
//! Interpretation of the 32-bit tile values produced by the dungeon
//! generator on the server. The layout is fixed by the server; a misread
//! bit silently breaks walkability and room logic.

use bitflags::bitflags;

/// Unexplored interior or void. Not walkable.
pub const NOTHING: u32 = 0x0000_0000;

/// Sentinel for a tile that was never observed.
pub const UNKNOWN: u32 = 0xFFFF_FFFF;

bitflags! {
    /// Feature bits of a single tile.
    ///
    /// `ROOM_ID` and `LABEL` are multi-bit fields rather than flags; use
    /// [`room_id`] and [`label`] to read them.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TileFlags: u32 {
        const BLOCKED    = 0x0000_0001;
        const ROOM       = 0x0000_0002;
        const CORRIDOR   = 0x0000_0004;
        const PERIMETER  = 0x0000_0010;
        const ENTRANCE   = 0x0000_0020;
        const ROOM_ID    = 0x0000_FFC0;
        const ARCH       = 0x0001_0000;
        const DOOR1      = 0x0002_0000;
        const DOOR2      = 0x0004_0000;
        const DOOR3      = 0x0008_0000;
        const DOOR4      = 0x0010_0000;
        const PORTCULLIS = 0x0020_0000;
        const STAIR_DOWN = 0x0040_0000;
        const STAIR_UP   = 0x0080_0000;
        const LABEL      = 0xFF00_0000;

        const DOORS = Self::DOOR1.bits() | Self::DOOR2.bits() | Self::DOOR3.bits() | Self::DOOR4.bits();
    }
}

/// Whether a tile value describes an observed tile.
pub fn is_known(value: u32) -> bool {
    value != UNKNOWN
}

/// Walkability of a raw tile value.
///
/// Unknown tiles are optimistically walkable so plans can reach into the
/// fog. `NOTHING`, `PERIMETER` and `BLOCKED` tiles are not.
pub fn is_walkable(value: u32) -> bool {
    if value == UNKNOWN {
        return true;
    }
    if value == NOTHING {
        return false;
    }
    !TileFlags::from_bits_retain(value).intersects(TileFlags::PERIMETER | TileFlags::BLOCKED)
}

/// Room identifier bits of a tile value, unshifted. Zero means the tile is
/// not inside a numbered room; the `UNKNOWN` sentinel carries no room.
pub fn room_id(value: u32) -> u32 {
    if value == UNKNOWN {
        return 0;
    }
    value & TileFlags::ROOM_ID.bits()
}

/// Debug label packed into the high byte, if it is printable ASCII.
pub fn label(value: u32) -> Option<char> {
    if value == UNKNOWN {
        return None;
    }
    let byte = (value >> 24) as u8;
    byte.is_ascii_graphic().then_some(byte as char)
}

/// Encodes a room number into the `ROOM_ID` field.
pub fn room_id_bits(room: u32) -> u32 {
    (room << 6) & TileFlags::ROOM_ID.bits()
}

/// Single character used by debug dumps of a tile.
pub fn glyph(value: u32) -> char {
    if value == UNKNOWN {
        return '?';
    }
    if value == NOTHING {
        return ' ';
    }
    let flags = TileFlags::from_bits_retain(value);
    if flags.contains(TileFlags::STAIR_DOWN) {
        '>'
    } else if flags.contains(TileFlags::STAIR_UP) {
        '<'
    } else if flags.intersects(TileFlags::DOORS | TileFlags::ARCH | TileFlags::PORTCULLIS) {
        '+'
    } else if flags.intersects(TileFlags::PERIMETER | TileFlags::BLOCKED) {
        '#'
    } else if let Some(c) = label(value) {
        c
    } else {
        '.'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walkability_of_terrain() {
        assert!(is_walkable(UNKNOWN));
        assert!(!is_walkable(NOTHING));
        assert!(!is_walkable(TileFlags::PERIMETER.bits()));
        assert!(!is_walkable(TileFlags::BLOCKED.bits()));
        assert!(!is_walkable((TileFlags::ROOM | TileFlags::BLOCKED).bits()));
        assert!(is_walkable(TileFlags::ROOM.bits()));
        assert!(is_walkable(TileFlags::CORRIDOR.bits()));
        assert!(is_walkable(TileFlags::DOOR3.bits()));
        assert!(is_walkable((TileFlags::ROOM | TileFlags::STAIR_DOWN).bits()));
        assert!(is_walkable(TileFlags::PORTCULLIS.bits()));
    }

    #[test]
    fn test_room_id_is_masked_not_shifted() {
        let value = TileFlags::ROOM.bits() | room_id_bits(5);
        assert_eq!(room_id(value), 5 << 6);
        assert_eq!(room_id(TileFlags::CORRIDOR.bits()), 0);
        assert_eq!(room_id(UNKNOWN), 0);
    }

    #[test]
    fn test_label_reads_high_byte() {
        let value = TileFlags::ROOM.bits() | ((b'A' as u32) << 24);
        assert_eq!(label(value), Some('A'));
        assert_eq!(label(TileFlags::ROOM.bits()), None);
        assert_eq!(glyph(value), 'A');
    }

    #[test]
    fn test_door_glyph() {
        assert_eq!(glyph(TileFlags::DOOR2.bits()), '+');
        assert_eq!(glyph(UNKNOWN), '?');
        assert_eq!(glyph(TileFlags::PERIMETER.bits()), '#');
    }
}
