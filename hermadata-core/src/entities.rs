//! Core entity structures

use crate::{
    AdopterId, AnimalId, AnimalStage, DocumentId, EntryType, ExitType, ResourceId, Sex, Timestamp,
    VetId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Animal - full shelter record.
/// Tracks the animal from intake through exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub animal_id: AnimalId,
    /// Registry code assigned at intake (year + progressive number).
    pub code: String,
    /// Microchip code, `###.###.###.###.###`. Unique across the registry.
    pub chip_code: Option<String>,
    pub name: Option<String>,
    pub race_id: String,
    pub breed_id: Option<i64>,
    pub sex: Option<Sex>,
    pub birth_date: Option<NaiveDate>,
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    /// ISTAT code of the city the animal was found in or surrendered from.
    pub origin_city_code: String,
    pub stage: AnimalStage,
    /// 0-10 scale set by the staff; None until evaluated.
    pub adoptability_index: Option<i16>,
    pub sterilized: bool,
    pub notes: Option<String>,
    pub exit_date: Option<NaiveDate>,
    pub exit_type: Option<ExitType>,
    /// Profile image resource, if one has been uploaded.
    pub img_id: Option<ResourceId>,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

/// Row shape returned by the animal search endpoint.
/// A display-oriented subset of [`Animal`] with resolved lookup names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalSearchResult {
    pub animal_id: AnimalId,
    pub code: String,
    pub chip_code: Option<String>,
    pub name: Option<String>,
    pub race_id: String,
    pub race_name: String,
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    pub origin_city_code: String,
    pub origin_city_name: String,
    pub stage: AnimalStage,
    pub adoptability_index: Option<i16>,
    pub exit_date: Option<NaiveDate>,
}

/// Adopter - person eligible to adopt animals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adopter {
    pub adopter_id: AdopterId,
    /// Italian fiscal code, 16 characters. Unique across the registry.
    pub fiscal_code: String,
    pub name: String,
    pub surname: String,
    pub birth_date: NaiveDate,
    pub birth_city_code: String,
    pub residence_city_code: String,
    pub phone: String,
    pub document_number: Option<String>,
    pub created_at: Timestamp,
}

/// Veterinarian - external professional the shelter works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Veterinarian {
    pub vet_id: VetId,
    pub business_name: String,
    pub fiscal_code: String,
    pub vat_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Race - top-level species grouping (dog, cat, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    /// Short mnemonic code, e.g. `C` for dogs.
    pub race_id: String,
    pub name: String,
}

/// Breed within a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breed {
    pub breed_id: i64,
    pub race_id: String,
    pub name: String,
}

/// Italian province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    /// Two-letter province code, e.g. `MI`.
    pub code: String,
    pub name: String,
}

/// City (comune) within a province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// ISTAT city code.
    pub code: String,
    pub name: String,
    pub province_code: String,
}

/// Kind of document that can be attached to an animal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocKind {
    pub kind_id: i64,
    /// Machine-readable code for kinds the system creates itself
    /// (e.g. the adoption form); user-defined kinds have none.
    pub code: Option<String>,
    pub name: String,
    /// Whether staff can attach uploads of this kind manually.
    pub uploadable: bool,
}

/// Document attached to an animal record.
///
/// Created in two phases: the raw file upload yields a resource id, then
/// this association record is written referencing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalDocument {
    pub document_id: DocumentId,
    pub animal_id: AnimalId,
    pub kind_id: i64,
    pub title: String,
    pub resource_id: ResourceId,
    pub created_at: Timestamp,
}

/// Recorded adoption linking an animal to an adopter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adoption {
    pub adoption_id: i64,
    pub animal_id: AnimalId,
    pub adopter_id: AdopterId,
    pub adoption_date: NaiveDate,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_animal_serde_round_trip() {
        let animal = Animal {
            animal_id: 7,
            code: "24C001".to_string(),
            chip_code: Some("380.260.100.233.811".to_string()),
            name: Some("Rex".to_string()),
            race_id: "C".to_string(),
            breed_id: None,
            sex: Some(Sex::Male),
            birth_date: None,
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            entry_type: EntryType::Rescue,
            origin_city_code: "015146".to_string(),
            stage: AnimalStage::Sanitary,
            adoptability_index: None,
            sterilized: false,
            notes: None,
            exit_date: None,
            exit_type: None,
            img_id: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_string(&animal).unwrap();
        let back: Animal = serde_json::from_str(&json).unwrap();
        assert_eq!(animal, back);
    }

    #[test]
    fn test_animal_rejects_malformed_payload() {
        // entry_date missing entirely
        let raw = r#"{"animal_id": 1, "code": "24C001", "race_id": "C"}"#;
        assert!(serde_json::from_str::<Animal>(raw).is_err());
    }
}
