//! Request payloads and search filters for the REST endpoints.
//!
//! These mirror what the backend accepts; field validation happens in
//! [`crate::validation`] before a payload is submitted.

use crate::{AdopterId, AnimalId, AnimalStage, EntryType, ExitType, ResourceId, Sex};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Payload to register a new animal intake.
/// The backend assigns the registry code and starts the animal in the
/// sanitary stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnimalEntry {
    pub race_id: String,
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    pub origin_city_code: String,
}

/// Payload to update an animal record. All fields optional; only set
/// fields are changed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateAnimal {
    pub name: Option<String>,
    pub chip_code: Option<String>,
    pub breed_id: Option<i64>,
    pub sex: Option<Sex>,
    pub birth_date: Option<NaiveDate>,
    pub stage: Option<AnimalStage>,
    pub adoptability_index: Option<i16>,
    pub sterilized: Option<bool>,
    pub notes: Option<String>,
    pub img_id: Option<ResourceId>,
}

/// Payload to record an animal leaving the shelter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalExitRequest {
    pub exit_date: NaiveDate,
    pub exit_type: ExitType,
    /// Required when the exit is an adoption.
    pub adopter_id: Option<AdopterId>,
    pub notes: Option<String>,
}

/// Filters for the animal search endpoint. Flattened into query
/// parameters alongside the page window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimalSearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_city_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_date_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<AnimalStage>,
    /// Only animals still in the shelter (no exit recorded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,
    /// Substring match on name, code or chip code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Payload to register a new adopter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAdopter {
    pub fiscal_code: String,
    pub name: String,
    pub surname: String,
    pub birth_date: NaiveDate,
    pub birth_city_code: String,
    pub residence_city_code: String,
    pub phone: String,
    pub document_number: Option<String>,
}

/// Payload to update an adopter record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateAdopter {
    pub residence_city_code: Option<String>,
    pub phone: Option<String>,
    pub document_number: Option<String>,
}

/// Filters for the adopter search endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdopterSearchQuery {
    /// Substring match on name, surname or fiscal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Payload to register a veterinarian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVeterinarian {
    pub business_name: String,
    pub fiscal_code: String,
    pub vat_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Payload to update a veterinarian record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateVeterinarian {
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Filters for the veterinarian search endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VetSearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Payload to add a breed under a race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBreed {
    pub race_id: String,
    pub name: String,
}

/// Payload to define a document kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocKind {
    pub name: String,
    pub uploadable: bool,
}

/// Phase two of a document attach: associate an uploaded resource with an
/// animal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnimalDocument {
    pub kind_id: i64,
    pub title: String,
    pub resource_id: ResourceId,
}

/// Payload to record an adoption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptionRequest {
    pub animal_id: AnimalId,
    pub adopter_id: AdopterId,
    pub adoption_date: NaiveDate,
}

/// Date window for the CSV entry/exit reports.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_city_code: Option<String>,
}
