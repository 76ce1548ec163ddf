//! Bed assignment operations: admit, transfer, remove-from-bed and discharge.
//!
//! Each operation reads the resident and every house together with their
//! revisions, validates against that snapshot, and commits the changed houses
//! followed by the resident, each as a compare-and-set on the revision read.
//! A failed write undoes the house writes already made. When that undo fails,
//! or a write timed out and its outcome is unknown, the caller receives
//! `AssignmentInconsistency` and the store is left for [`crate::reconcile`].
//!
//! Computing the new houses always clears the resident from every bed first,
//! so a resident left in two beds by an earlier failure ends up in one.

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{HavenError, HavenResult};
use crate::model::{DischargeRecord, House, Resident, ResidentStatus};
use crate::repository::{Repository, Versioned};
use crate::store::{Revision, StoreError};

/// Result of a transfer request
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Moved(Resident),
    /// Target is the resident's current bed; nothing was written.
    Unchanged(Resident),
}

impl TransferOutcome {
    pub fn resident(&self) -> &Resident {
        match self {
            TransferOutcome::Moved(r) | TransferOutcome::Unchanged(r) => r,
        }
    }
}

/// Working copy of every house, tracking the revision each was read at
pub(crate) struct HousePlan {
    entries: Vec<(Versioned<House>, House)>,
}

impl HousePlan {
    pub(crate) fn new(houses: Vec<Versioned<House>>) -> Self {
        let entries = houses
            .into_iter()
            .map(|versioned| {
                let working = versioned.value.clone();
                (versioned, working)
            })
            .collect();
        Self { entries }
    }

    pub(crate) fn house(&self, house_id: &str) -> Option<&House> {
        self.entries
            .iter()
            .map(|(_, working)| working)
            .find(|h| h.id == house_id)
    }

    pub(crate) fn house_mut(&mut self, house_id: &str) -> Option<&mut House> {
        self.entries
            .iter_mut()
            .map(|(_, working)| working)
            .find(|h| h.id == house_id)
    }

    pub(crate) fn houses_mut(&mut self) -> impl Iterator<Item = &mut House> {
        self.entries.iter_mut().map(|(_, working)| working)
    }

    /// Clear the resident from every bed in every house
    pub(crate) fn release_everywhere(&mut self, resident_id: &str) -> usize {
        self.entries
            .iter_mut()
            .map(|(_, working)| working.release(resident_id))
            .sum()
    }

    /// Put the resident in a vacant bed. Call after `release_everywhere`, so any
    /// occupant still present belongs to someone else.
    fn occupy(
        &mut self,
        house_id: &str,
        room_id: Option<&str>,
        bed_id: &str,
        resident_id: &str,
    ) -> HavenResult<()> {
        let house = self
            .house_mut(house_id)
            .ok_or_else(|| HavenError::not_found("House", house_id))?;
        let bed = house
            .bed_mut(room_id, bed_id)
            .ok_or_else(|| HavenError::not_found("Bed", bed_id))?;

        if let Some(occupant) = &bed.occupant_id {
            return Err(HavenError::BedOccupied {
                bed_id: bed_id.to_string(),
                occupant_id: occupant.clone(),
            });
        }
        bed.occupant_id = Some(resident_id.to_string());
        Ok(())
    }

    /// Houses whose working copy differs from what was read
    pub(crate) fn changes(self) -> Vec<(Versioned<House>, House)> {
        self.entries
            .into_iter()
            .filter(|(read, working)| &read.value != working)
            .collect()
    }
}

#[derive(Clone)]
pub struct AssignmentService {
    repo: Repository,
}

impl AssignmentService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    async fn snapshot(&self, resident_id: &str) -> HavenResult<(Versioned<Resident>, HousePlan)> {
        let resident = self.repo.require::<Resident>(resident_id).await?;
        let houses = self.repo.list::<House>().await?;
        Ok((resident, HousePlan::new(houses)))
    }

    /// Place a resident in a vacant bed and mark them active.
    ///
    /// Also serves as re-admission for alumni and discharged residents; any
    /// earlier discharge record is cleared.
    #[instrument(skip(self))]
    pub async fn admit(
        &self,
        resident_id: &str,
        house_id: &str,
        room_id: &str,
        bed_id: &str,
    ) -> HavenResult<Resident> {
        let (read, mut plan) = self.snapshot(resident_id).await?;

        let cleared = plan.release_everywhere(resident_id);
        if cleared > 0 {
            debug!("Cleared {} existing bed(s) for {}", cleared, resident_id);
        }
        plan.occupy(house_id, Some(room_id), bed_id, resident_id)?;

        let mut resident = read.value.clone();
        resident.status = ResidentStatus::Active;
        resident.assigned_house_id = Some(house_id.to_string());
        resident.assigned_bed_id = Some(bed_id.to_string());
        resident.discharge_record = None;
        resident.updated_at = Utc::now();

        let resident = self.commit(read.revision, resident, plan.changes()).await?;
        info!(
            resident_id,
            house_id, room_id, bed_id, "Resident admitted"
        );
        Ok(resident)
    }

    /// Move an active resident to another bed
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        resident_id: &str,
        house_id: &str,
        bed_id: &str,
    ) -> HavenResult<TransferOutcome> {
        let (read, mut plan) = self.snapshot(resident_id).await?;
        ensure_status(&read.value, ResidentStatus::Active, "transfer")?;

        let already_there = read.value.assigned_house_id.as_deref() == Some(house_id)
            && read.value.assigned_bed_id.as_deref() == Some(bed_id)
            && plan
                .house(house_id)
                .and_then(|h| h.find_bed(bed_id))
                .is_some_and(|(_, bed)| bed.occupant_id.as_deref() == Some(resident_id));
        if already_there {
            debug!("Transfer target is the current bed; nothing to do");
            return Ok(TransferOutcome::Unchanged(read.value));
        }

        plan.release_everywhere(resident_id);
        plan.occupy(house_id, None, bed_id, resident_id)?;

        let mut resident = read.value.clone();
        resident.assigned_house_id = Some(house_id.to_string());
        resident.assigned_bed_id = Some(bed_id.to_string());
        resident.updated_at = Utc::now();

        let resident = self.commit(read.revision, resident, plan.changes()).await?;
        info!(resident_id, house_id, bed_id, "Resident transferred");
        Ok(TransferOutcome::Moved(resident))
    }

    /// Vacate every bed held by the resident. Status is left unchanged.
    #[instrument(skip(self))]
    pub async fn remove_from_bed(&self, resident_id: &str) -> HavenResult<Resident> {
        let (read, mut plan) = self.snapshot(resident_id).await?;

        let cleared = plan.release_everywhere(resident_id);
        if cleared == 0 && !read.value.is_assigned() {
            debug!("Resident holds no bed; nothing to do");
            return Ok(read.value);
        }

        let mut resident = read.value.clone();
        resident.clear_assignment();
        resident.updated_at = Utc::now();

        let resident = self.commit(read.revision, resident, plan.changes()).await?;
        info!(resident_id, cleared, "Resident removed from bed");
        Ok(resident)
    }

    /// End an active stay. Successful completion makes the resident alumni.
    #[instrument(skip(self, record), fields(discharge_type = ?record.kind))]
    pub async fn discharge(
        &self,
        resident_id: &str,
        record: DischargeRecord,
    ) -> HavenResult<Resident> {
        let (read, mut plan) = self.snapshot(resident_id).await?;
        ensure_status(&read.value, ResidentStatus::Active, "discharge")?;

        plan.release_everywhere(resident_id);

        let mut resident = read.value.clone();
        resident.status = record.kind.resulting_status();
        resident.clear_assignment();
        resident.discharge_record = Some(record);
        resident.updated_at = Utc::now();

        let resident = self.commit(read.revision, resident, plan.changes()).await?;
        info!(resident_id, status = %resident.status, "Resident discharged");
        Ok(resident)
    }

    async fn commit(
        &self,
        resident_revision: Revision,
        resident: Resident,
        changes: Vec<(Versioned<House>, House)>,
    ) -> HavenResult<Resident> {
        let mut written: Vec<(House, Revision)> = Vec::with_capacity(changes.len());

        for (read, working) in changes {
            match self.repo.replace(&working, read.revision).await {
                Ok(revision) => {
                    debug!("Wrote house {} at revision {}", working.id, revision);
                    written.push((read.value, revision));
                }
                Err(err) => return Err(self.abort(&resident.id, written, err).await),
            }
        }

        match self.repo.replace(&resident, resident_revision).await {
            Ok(_) => Ok(resident),
            Err(err) => Err(self.abort(&resident.id, written, err).await),
        }
    }

    /// Undo house writes after a failed commit step
    async fn abort(
        &self,
        resident_id: &str,
        written: Vec<(House, Revision)>,
        cause: StoreError,
    ) -> HavenError {
        if matches!(cause, StoreError::Timeout { .. }) {
            error!(
                resident_id,
                cause = %cause,
                "Assignment write timed out with unknown outcome"
            );
            return HavenError::AssignmentInconsistency {
                resident_id: resident_id.to_string(),
                detail: format!("{}; outcome unknown, reconciliation required", cause),
            };
        }

        for (house, revision) in written.into_iter().rev() {
            if let Err(undo) = self.repo.replace(&house, revision).await {
                error!(
                    resident_id,
                    house_id = %house.id,
                    cause = %cause,
                    undo_error = %undo,
                    "Failed to restore house after aborted assignment"
                );
                return HavenError::AssignmentInconsistency {
                    resident_id: resident_id.to_string(),
                    detail: format!("{}; restoring house {} failed: {}", cause, house.id, undo),
                };
            }
        }

        warn!(resident_id, cause = %cause, "Assignment aborted and rolled back");
        cause.into()
    }
}

pub(crate) fn ensure_status(
    resident: &Resident,
    expected: ResidentStatus,
    operation: &'static str,
) -> HavenResult<()> {
    if resident.status == expected {
        Ok(())
    } else {
        Err(HavenError::InvalidTransition {
            resident_id: resident.id.clone(),
            status: resident.status,
            operation,
        })
    }
}
