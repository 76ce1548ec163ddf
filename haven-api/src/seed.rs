//! Initial house layout loaded from YAML

use std::path::Path;

use anyhow::{ensure, Context, Result};
use haven_core::House;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
pub struct HouseLayout {
    pub houses: Vec<House>,
}

/// Parse a layout and check that house, room and bed ids are unique
pub fn parse_layout(yaml: &str) -> Result<Vec<House>> {
    let layout: HouseLayout = serde_yaml::from_str(yaml).context("Failed to parse house layout")?;

    let mut house_ids = HashSet::new();
    for house in &layout.houses {
        ensure!(house_ids.insert(house.id.as_str()), "duplicate house id {}", house.id);
        let mut room_ids = HashSet::new();
        let mut bed_ids = HashSet::new();
        for room in &house.rooms {
            ensure!(
                room_ids.insert(room.id.as_str()),
                "duplicate room id {} in {}",
                room.id,
                house.id
            );
            for bed in &room.beds {
                ensure!(
                    bed_ids.insert(bed.id.as_str()),
                    "duplicate bed id {} in {}",
                    bed.id,
                    house.id
                );
                ensure!(
                    bed.occupant_id.is_none(),
                    "bed {} in {} must start vacant",
                    bed.id,
                    house.id
                );
            }
        }
    }
    Ok(layout.houses)
}

pub fn load_layout(path: &Path) -> Result<Vec<House>> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read house layout {}", path.display()))?;
    parse_layout(&yaml)
}
