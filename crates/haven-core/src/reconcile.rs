//! Repair pass for bed/resident links
//!
//! A bed keeps its occupant only if that resident is active and points back
//! at the bed. An active resident pointing at a vacant bed is linked into it.
//! Assignments that cannot be honoured are cleared from the resident. Running
//! the pass on a consistent store writes nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::assignment::HousePlan;
use crate::error::HavenResult;
use crate::model::{House, Resident, ResidentStatus};
use crate::repository::{Repository, Versioned};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BedRef {
    pub house_id: String,
    pub bed_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub beds_cleared: Vec<BedRef>,
    pub beds_relinked: Vec<BedRef>,
    pub assignments_cleared: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.beds_cleared.is_empty()
            && self.beds_relinked.is_empty()
            && self.assignments_cleared.is_empty()
    }
}

pub async fn reconcile(repo: &Repository) -> HavenResult<ReconcileReport> {
    let residents = repo.list::<Resident>().await?;
    let houses = repo.list::<House>().await?;
    let mut plan = HousePlan::new(houses);
    let mut report = ReconcileReport::default();

    // Active residents claiming a bed, keyed by (house, bed)
    let mut claims: BTreeMap<BedRef, Vec<String>> = BTreeMap::new();
    let mut unassign: BTreeSet<String> = BTreeSet::new();

    for Versioned { value: r, .. } in &residents {
        match (r.status, &r.assigned_house_id, &r.assigned_bed_id) {
            (ResidentStatus::Active, Some(house_id), Some(bed_id)) => {
                claims
                    .entry(BedRef {
                        house_id: house_id.clone(),
                        bed_id: bed_id.clone(),
                    })
                    .or_default()
                    .push(r.id.clone());
            }
            _ if r.is_assigned() => {
                warn!(resident_id = %r.id, status = %r.status, "Clearing assignment that cannot hold a bed");
                unassign.insert(r.id.clone());
            }
            _ => {}
        }
    }

    for (bed_ref, claimants) in &claims {
        let exists = plan
            .house(&bed_ref.house_id)
            .and_then(|h| h.find_bed(&bed_ref.bed_id))
            .is_some();
        if !exists {
            warn!(house_id = %bed_ref.house_id, bed_id = %bed_ref.bed_id, "Residents assigned to a missing bed");
            unassign.extend(claimants.iter().cloned());
        }
    }

    for house in plan.houses_mut() {
        let house_id = house.id.clone();
        for bed in house.rooms.iter_mut().flat_map(|room| room.beds.iter_mut()) {
            let bed_ref = BedRef {
                house_id: house_id.clone(),
                bed_id: bed.id.clone(),
            };
            let claimants = claims.get(&bed_ref).map(Vec::as_slice).unwrap_or(&[]);

            let keep = match &bed.occupant_id {
                Some(occupant) if claimants.contains(occupant) => Some(occupant.clone()),
                _ => claimants.first().cloned(),
            };

            if bed.occupant_id != keep {
                if let Some(stale) = &bed.occupant_id {
                    warn!(house_id = %house_id, bed_id = %bed.id, occupant_id = %stale, "Clearing stale bed occupant");
                    report.beds_cleared.push(bed_ref.clone());
                }
                if let Some(linked) = &keep {
                    warn!(house_id = %house_id, bed_id = %bed.id, resident_id = %linked, "Relinking bed to resident");
                    report.beds_relinked.push(bed_ref.clone());
                }
                bed.occupant_id = keep.clone();
            }

            unassign.extend(
                claimants
                    .iter()
                    .filter(|id| keep.as_ref() != Some(*id))
                    .cloned(),
            );
        }
    }

    for (read, working) in plan.changes() {
        repo.replace(&working, read.revision).await?;
    }

    let by_id: HashMap<&str, &Versioned<Resident>> = residents
        .iter()
        .map(|r| (r.value.id.as_str(), r))
        .collect();
    for resident_id in unassign {
        let Some(read) = by_id.get(resident_id.as_str()) else {
            continue;
        };
        let mut resident = read.value.clone();
        resident.clear_assignment();
        resident.updated_at = Utc::now();
        repo.replace(&resident, read.revision).await?;
        report.assignments_cleared.push(resident_id);
    }

    if report.is_clean() {
        info!("Reconciliation found no inconsistencies");
    } else {
        info!(
            beds_cleared = report.beds_cleared.len(),
            beds_relinked = report.beds_relinked.len(),
            assignments_cleared = report.assignments_cleared.len(),
            "Reconciliation repaired occupancy"
        );
    }
    Ok(report)
}
