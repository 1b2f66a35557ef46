//! Device identity resolution.
//!
//! The device-type response carries a 2-byte id. This module maps the ids
//! of common studio decks to a human-readable [`DeviceInfo`]; anything not
//! in the table resolves to a generic identity carrying the raw hex id as
//! its model string, so an unrecognized deck is still usable.

use vtr9pin_core::types::DeviceInfo;

/// One row of the known-device table.
struct KnownDevice {
    id: u16,
    manufacturer: &'static str,
    manufacturer_short: &'static str,
    model: &'static str,
}

const fn sony(id: u16, model: &'static str) -> KnownDevice {
    KnownDevice {
        id,
        manufacturer: "Sony",
        manufacturer_short: "SONY",
        model,
    }
}

// NTSC models carry a 0x2x high byte, their PAL twins 0x2x|0x01.
static KNOWN_DEVICES: &[KnownDevice] = &[
    sony(0x2024, "BVW-70"),
    sony(0x2124, "BVW-70P"),
    sony(0x2025, "BVW-75"),
    sony(0x2125, "BVW-75P"),
    sony(0x2040, "BVW-60"),
    sony(0x2140, "BVW-60P"),
    sony(0x2041, "BVW-65"),
    sony(0x2141, "BVW-65P"),
    sony(0x2046, "BVW-9000"),
    sony(0x2146, "BVW-9000P"),
    sony(0x20D0, "DVW-500"),
    sony(0x21D0, "DVW-500P"),
    sony(0x20F0, "PVW-2600"),
    sony(0x21F0, "PVW-2600P"),
    sony(0x20F1, "PVW-2800"),
    sony(0x21F1, "PVW-2800P"),
    sony(0x2301, "UVW-1600"),
    sony(0x2302, "UVW-1800"),
    sony(0xF01E, "DSR-1600"),
    sony(0xF11E, "DSR-1600P"),
    sony(0xF01F, "DSR-1800"),
    sony(0xF11F, "DSR-1800P"),
    sony(0xF020, "DSR-2000"),
    sony(0xF120, "DSR-2000P"),
    KnownDevice {
        id: 0xA088,
        manufacturer: "Odetics",
        manufacturer_short: "ODTX",
        model: "TCS90",
    },
];

/// Look up a device id in the known-device table.
pub fn lookup(id: u16) -> Option<DeviceInfo> {
    KNOWN_DEVICES.iter().find(|d| d.id == id).map(|d| DeviceInfo {
        manufacturer: d.manufacturer.into(),
        manufacturer_short: d.manufacturer_short.into(),
        model: d.model.into(),
    })
}

/// Resolve a device id to an identity, falling back to the raw hex id.
///
/// An unknown id yields the generic manufacturer with the id formatted as
/// four hex digits in `model` (e.g. `"0285"`), so logs and UIs still show
/// something distinguishing.
pub fn resolve(id: u16) -> DeviceInfo {
    lookup(id).unwrap_or_else(|| DeviceInfo {
        model: format!("{id:04X}"),
        ..DeviceInfo::default()
    })
}
