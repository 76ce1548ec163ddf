//! Resident record upkeep outside of bed assignment: drug tests, notes,
//! credentials and removal.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::error::{HavenError, HavenResult};
use crate::model::{DrugTestLog, House, Resident, TestKind, TestResult};
use crate::repository::{Repository, Versioned};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDrugTest {
    #[serde(rename = "type")]
    pub kind: TestKind,
    pub result: TestResult,
    #[serde(default)]
    pub notes: String,
}

pub async fn log_drug_test(
    repo: &Repository,
    resident_id: &str,
    test: NewDrugTest,
    performed_by: &str,
) -> HavenResult<DrugTestLog> {
    let log = DrugTestLog {
        id: format!("ua-{}", uuid::Uuid::new_v4()),
        date: Utc::now(),
        result: test.result,
        kind: test.kind,
        notes: test.notes,
        performed_by: performed_by.to_string(),
    };

    let appended = log.clone();
    repo.modify::<Resident, _>(resident_id, move |resident| {
        resident.drug_test_logs.push(appended);
        resident.updated_at = Utc::now();
        Ok(())
    })
    .await?;

    info!(resident_id, result = ?log.result, "Drug test logged");
    Ok(log)
}

pub async fn set_notes(
    repo: &Repository,
    resident_id: &str,
    notes: Option<String>,
) -> HavenResult<Resident> {
    let notes = notes.filter(|n| !n.trim().is_empty());
    let updated = repo
        .modify::<Resident, _>(resident_id, move |resident| {
            resident.notes = notes;
            resident.updated_at = Utc::now();
            Ok(())
        })
        .await?;
    Ok(updated.value)
}

pub async fn set_password_hash(
    repo: &Repository,
    resident_id: &str,
    password_hash: String,
) -> HavenResult<()> {
    repo.modify::<Resident, _>(resident_id, move |resident| {
        resident.password_hash = Some(password_hash);
        resident.updated_at = Utc::now();
        Ok(())
    })
    .await?;
    info!(resident_id, "Resident password updated");
    Ok(())
}

/// Case-insensitive lookup by the email given at intake
pub async fn find_by_email(repo: &Repository, email: &str) -> HavenResult<Option<Versioned<Resident>>> {
    let email = email.trim().to_lowercase();
    let residents = repo.list::<Resident>().await?;
    Ok(residents
        .into_iter()
        .find(|r| r.value.intake.personal.email.trim().to_lowercase() == email))
}

/// Delete a resident record. Refused while the resident holds any bed.
pub async fn delete_resident(repo: &Repository, resident_id: &str) -> HavenResult<()> {
    let resident = repo.require::<Resident>(resident_id).await?;
    let houses = repo.list::<House>().await?;
    let holds_bed = resident.value.is_assigned()
        || houses.iter().any(|h| {
            h.value
                .beds()
                .any(|(_, bed)| bed.occupant_id.as_deref() == Some(resident_id))
        });
    if holds_bed {
        return Err(HavenError::Validation(format!(
            "resident {} still occupies a bed; remove them from it first",
            resident_id
        )));
    }

    repo.remove::<Resident>(resident_id, Some(resident.revision))
        .await?;
    info!(resident_id, "Resident deleted");
    Ok(())
}
