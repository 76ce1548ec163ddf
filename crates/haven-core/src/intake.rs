//! Intake applications
//!
//! A submitted application becomes a `pending` resident. Nothing reaches the
//! store unless the form passes validation.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::HavenResult;
use crate::model::{House, Resident, ResidentStatus};
use crate::repository::Repository;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntakeError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Agreement not accepted: {0}")]
    AgreementMissing(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("An application already exists for {0}")]
    DuplicateEmail(String),

    #[error("Unknown house: {0}")]
    UnknownHouse(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub age: Option<u32>,
    pub phone: String,
    pub email: String,
    pub dl_number: String,
    pub dl_state: String,
    pub dl_expiration: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub dose: String,
    pub doctor: String,
    pub contact: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicalInfo {
    pub doctor_name: String,
    pub doctor_phone: String,
    pub doctor_address: String,
    pub allergies: String,
    pub medications: Vec<Medication>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryChecks {
    pub has_overdosed: bool,
    pub overdose_count: String,
    pub overdose_dates: String,
    pub has_attempted_suicide: bool,
    pub suicide_count: String,
    pub suicide_dates: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegalInfo {
    pub has_felony: bool,
    pub felony_explanation: String,
    pub is_sex_offender: bool,
    pub has_assault_charges: bool,
    pub assault_explanation: String,
    /// DUI, drug, mental health or veteran court
    pub is_specialized_court: bool,
    pub specialized_court_name: String,
    pub on_parole_probation: bool,
    pub parole_explanation: String,
    pub parole_officer_name: String,
    pub parole_officer_phone: String,
    pub has_pending_charges: bool,
    pub pending_charges_explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Agreements {
    pub community: bool,
    pub community_signature: String,
    pub liability: bool,
    pub covid: bool,
    pub property: bool,
    pub final_signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntakeForm {
    pub target_house_id: String,
    pub personal: PersonalInfo,
    pub emergency_contact: EmergencyContact,
    pub medical: MedicalInfo,
    pub history: HistoryChecks,
    pub legal: LegalInfo,
    pub agreements: Agreements,
    pub comments: String,
    pub sober_date: Option<NaiveDate>,
    pub submission_date: Option<NaiveDate>,
}

/// Whole years between `dob` and `today`
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

fn require(value: &str, field: &'static str) -> Result<(), IntakeError> {
    if value.trim().is_empty() {
        Err(IntakeError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Field-level checks that need no store access
pub fn validate(form: &IntakeForm) -> Result<(), IntakeError> {
    require(&form.target_house_id, "targetHouseId")?;
    require(&form.personal.first_name, "firstName")?;
    require(&form.personal.last_name, "lastName")?;
    if form.personal.dob.is_none() {
        return Err(IntakeError::MissingField("dob"));
    }
    require(&form.personal.phone, "phone")?;
    require(&form.personal.email, "email")?;
    if !EMAIL_RE.is_match(form.personal.email.trim()) {
        return Err(IntakeError::InvalidEmail(form.personal.email.clone()));
    }
    require(&form.emergency_contact.name, "emergencyName")?;
    require(&form.emergency_contact.phone, "emergencyPhone")?;

    let agreements = &form.agreements;
    if !agreements.community {
        return Err(IntakeError::AgreementMissing("community"));
    }
    require(&agreements.community_signature, "signatureCommunity")?;
    if !agreements.liability {
        return Err(IntakeError::AgreementMissing("liability"));
    }
    if !agreements.covid {
        return Err(IntakeError::AgreementMissing("covid"));
    }
    if !agreements.property {
        return Err(IntakeError::AgreementMissing("property"));
    }
    require(&agreements.final_signature, "signatureFinal")?;
    Ok(())
}

/// Validate and store an application as a pending resident
pub async fn submit(repo: &Repository, mut form: IntakeForm, now: DateTime<Utc>) -> HavenResult<Resident> {
    validate(&form)?;

    if repo.get::<House>(&form.target_house_id).await?.is_none() {
        return Err(IntakeError::UnknownHouse(form.target_house_id).into());
    }

    let email = form.personal.email.trim().to_lowercase();
    let residents = repo.list::<Resident>().await?;
    if residents
        .iter()
        .any(|r| r.value.intake.personal.email.trim().to_lowercase() == email)
    {
        return Err(IntakeError::DuplicateEmail(email).into());
    }

    let today = now.date_naive();
    form.personal.email = form.personal.email.trim().to_string();
    form.personal.age = form.personal.dob.and_then(|dob| age_on(dob, today));
    form.submission_date = Some(today);

    let resident = Resident {
        id: format!("c-{}", uuid::Uuid::new_v4()),
        status: ResidentStatus::Pending,
        intake: form,
        assigned_house_id: None,
        assigned_bed_id: None,
        check_in_logs: Vec::new(),
        drug_test_logs: Vec::new(),
        discharge_record: None,
        notes: None,
        password_hash: None,
        created_at: now,
        updated_at: now,
    };
    repo.insert(&resident).await?;

    info!(
        resident_id = %resident.id,
        target_house_id = %resident.intake.target_house_id,
        "Intake application submitted"
    );
    Ok(resident)
}
