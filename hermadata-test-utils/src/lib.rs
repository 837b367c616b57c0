//! Hermadata Test Utilities
//!
//! Centralized test infrastructure for the Hermadata workspace:
//! - Entity fixtures for common scenarios
//! - A scriptable mock fetcher for coordinator tests
//! - Proptest generators for keys and registry codes
//! - Tracing setup for test output

// Re-export core types for convenience
pub use hermadata_core::{
    Adopter, Animal, AnimalDocument, AnimalStage, Breed, City, DocKind, EntryType, ExitType,
    Paginated, Province, Race, Sex, Veterinarian,
};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use hermadata_cache::{CacheKey, DataError, DatasetFetcher};
use proptest::prelude::*;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

// ============================================================================
// MOCK FETCHER
// ============================================================================

/// Scriptable [`DatasetFetcher`]: responses are served in enqueue order and
/// every call is counted, so tests can assert exactly how many network
/// calls the coordinator made.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<VecDeque<Result<Value, DataError>>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, response: Result<Value, DataError>) {
        self.responses
            .lock()
            .expect("mock fetcher lock poisoned")
            .push_back(response);
    }

    pub fn enqueue_ok(&self, value: Value) {
        self.enqueue(Ok(value));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetFetcher for MockFetcher {
    async fn fetch(&self, key: &CacheKey) -> Result<Value, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("mock fetcher lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(DataError::Network(format!(
                    "no scripted response left for {}",
                    key
                )))
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn sample_animal(animal_id: i64) -> Animal {
    Animal {
        animal_id,
        code: format!("24C{:03}", animal_id),
        chip_code: None,
        name: Some("Rex".to_string()),
        race_id: "C".to_string(),
        breed_id: None,
        sex: Some(Sex::Male),
        birth_date: None,
        entry_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date"),
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
    }
}

pub fn sample_adopter(adopter_id: i64) -> Adopter {
    Adopter {
        adopter_id,
        fiscal_code: "RSSMRA80A01F205X".to_string(),
        name: "Mario".to_string(),
        surname: "Rossi".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1980, 1, 1).expect("valid date"),
        birth_city_code: "015146".to_string(),
        residence_city_code: "015146".to_string(),
        phone: "3331234567".to_string(),
        document_number: None,
        created_at: Utc::now(),
    }
}

pub fn sample_vet(vet_id: i64) -> Veterinarian {
    Veterinarian {
        vet_id,
        business_name: "Clinica Veterinaria Nord".to_string(),
        fiscal_code: "VRDLGI75B02F205Y".to_string(),
        vat_number: "01234567890".to_string(),
        phone: None,
        email: Some("info@clinicanord.it".to_string()),
    }
}

pub fn sample_races() -> Vec<Race> {
    vec![
        Race {
            race_id: "C".to_string(),
            name: "Cane".to_string(),
        },
        Race {
            race_id: "G".to_string(),
            name: "Gatto".to_string(),
        },
    ]
}

pub fn sample_document(document_id: i64, animal_id: i64) -> AnimalDocument {
    AnimalDocument {
        document_id,
        animal_id,
        kind_id: 1,
        title: "Libretto sanitario".to_string(),
        resource_id: 900 + document_id,
        created_at: Utc::now(),
    }
}

/// A one-page result window around the given items.
pub fn page_of<T>(items: Vec<T>) -> Paginated<T> {
    Paginated {
        total: items.len() as i64,
        items,
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Well-formed chip codes, `###.###.###.###.###`.
pub fn arb_chip_code() -> impl Strategy<Value = String> {
    proptest::collection::vec(0u16..=999, 5).prop_map(|groups| {
        groups
            .iter()
            .map(|g| format!("{:03}", g))
            .collect::<Vec<_>>()
            .join(".")
    })
}

/// Cache keys over a small name alphabet with integer parameters.
pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
    let names = prop_oneof![
        Just("animal"),
        Just("animal-search"),
        Just("adopter"),
        Just("races"),
    ];
    (names, proptest::collection::vec(0i64..1000, 0..3)).prop_map(|(name, params)| {
        let mut key = CacheKey::of(name);
        for param in params {
            key = key.with(param);
        }
        key
    })
}

// ============================================================================
// TRACING
// ============================================================================

static TRACING_INIT: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process.
/// Controlled by `RUST_LOG`; silent by default.
pub fn init_test_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermadata_core::{validate_chip_code, validate_fiscal_code};

    #[test]
    fn test_fixtures_pass_their_own_validators() {
        assert!(validate_fiscal_code(&sample_adopter(1).fiscal_code).is_ok());
        assert!(validate_fiscal_code(&sample_vet(1).fiscal_code).is_ok());
    }

    #[tokio::test]
    async fn test_mock_fetcher_serves_in_enqueue_order_and_counts() {
        let fetcher = MockFetcher::new();
        fetcher.enqueue_ok(serde_json::json!(1));
        fetcher.enqueue(Err(DataError::Network("down".to_string())));

        let key = CacheKey::of("races");
        assert_eq!(fetcher.fetch(&key).await.unwrap(), serde_json::json!(1));
        assert!(fetcher.fetch(&key).await.is_err());
        // exhausted scripts surface as network errors, not panics
        assert!(matches!(
            fetcher.fetch(&key).await,
            Err(DataError::Network(_))
        ));
        assert_eq!(fetcher.calls(), 3);
    }

    proptest! {
        #[test]
        fn prop_generated_chip_codes_are_well_formed(code in arb_chip_code()) {
            prop_assert!(validate_chip_code(&code).is_ok());
        }
    }
}
