//! Hermadata Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types and field validation - no I/O.

pub mod entities;
pub mod enums;
pub mod pagination;
pub mod requests;
pub mod validation;

pub use entities::{
    Adopter, Adoption, Animal, AnimalDocument, AnimalSearchResult, Breed, City, DocKind, Province,
    Race, Veterinarian,
};
pub use enums::{AnimalStage, EntryType, ExitType, Sex, SortOrder};
pub use pagination::{PageRequest, Paginated};
pub use requests::{
    AdoptionRequest, AdopterSearchQuery, AnimalExitRequest, AnimalSearchQuery, NewAdopter,
    NewAnimalDocument, NewAnimalEntry, NewBreed, NewDocKind, NewVeterinarian, ReportQuery,
    UpdateAdopter, UpdateAnimal, UpdateVeterinarian, VetSearchQuery,
};
pub use validation::{validate_chip_code, validate_fiscal_code, ValidationError};

use chrono::{DateTime, Utc};

/// Numeric identifier assigned by the backend to animals.
pub type AnimalId = i64;

/// Numeric identifier assigned by the backend to adopters.
pub type AdopterId = i64;

/// Numeric identifier assigned by the backend to veterinarians.
pub type VetId = i64;

/// Numeric identifier assigned by the backend to animal documents.
pub type DocumentId = i64;

/// Opaque numeric id returned by the raw-file upload endpoint.
/// Phase two of a document attach references this id.
pub type ResourceId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
