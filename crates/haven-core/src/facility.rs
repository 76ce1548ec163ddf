//! House layout edits and setup

use tracing::info;

use crate::error::{HavenError, HavenResult};
use crate::model::{House, RoomVacancy};
use crate::repository::Repository;

fn require_name(value: &str, what: &str) -> HavenResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(HavenError::Validation(format!("{} must not be empty", what)))
    } else {
        Ok(trimmed.to_string())
    }
}

pub async fn rename_room(
    repo: &Repository,
    house_id: &str,
    room_id: &str,
    name: &str,
) -> HavenResult<House> {
    let name = require_name(name, "room name")?;
    let updated = repo
        .modify::<House, _>(house_id, |house| {
            let room = house
                .rooms
                .iter_mut()
                .find(|r| r.id == room_id)
                .ok_or_else(|| HavenError::not_found("Room", room_id))?;
            room.name = name;
            Ok(())
        })
        .await?;
    info!(house_id, room_id, "Room renamed");
    Ok(updated.value)
}

pub async fn relabel_bed(
    repo: &Repository,
    house_id: &str,
    room_id: &str,
    bed_id: &str,
    label: &str,
) -> HavenResult<House> {
    let label = require_name(label, "bed label")?;
    let updated = repo
        .modify::<House, _>(house_id, |house| {
            let bed = house
                .bed_mut(Some(room_id), bed_id)
                .ok_or_else(|| HavenError::not_found("Bed", bed_id))?;
            bed.label = label;
            Ok(())
        })
        .await?;
    info!(house_id, room_id, bed_id, "Bed relabelled");
    Ok(updated.value)
}

/// Vacant beds of a house for the admission picker
pub async fn vacancies(repo: &Repository, house_id: &str) -> HavenResult<Vec<RoomVacancy>> {
    let house = repo.require::<House>(house_id).await?;
    Ok(house.value.vacancies())
}

/// Store the initial layout when no house exists yet. Returns how many houses were written.
pub async fn seed_houses(repo: &Repository, houses: &[House]) -> HavenResult<usize> {
    if !repo.list::<House>().await?.is_empty() {
        info!("Houses already present; skipping seed");
        return Ok(0);
    }
    for house in houses {
        repo.insert(house).await?;
    }
    info!("Seeded {} houses", houses.len());
    Ok(houses.len())
}
