//! Destination choice.

use super::Destination;

/// Pick where to broadcast.
///
/// Preference order: the configured destination, then the first destination
/// with listeners present, then any destination at all.
pub fn choose(destinations: &[Destination], configured: Option<&str>) -> Option<Destination> {
    if let Some(id) = configured {
        if let Some(dest) = destinations.iter().find(|d| d.id == id) {
            return Some(dest.clone());
        }
        log::warn!("connection: configured destination {id} not found, falling back");
    }

    destinations
        .iter()
        .find(|d| d.occupants > 0)
        .or_else(|| destinations.first())
        .cloned()
}
