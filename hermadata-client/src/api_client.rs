//! REST client for the Hermadata backend.

use crate::config::ClientConfig;
use hermadata_cache::DataError;
use hermadata_core::{
    Adopter, AdopterSearchQuery, Adoption, AdoptionRequest, Animal, AnimalDocument,
    AnimalExitRequest, AnimalId, AnimalSearchQuery, AnimalSearchResult, Breed, City, DocKind,
    NewAdopter, NewAnimalDocument, NewAnimalEntry, NewBreed, NewDocKind, NewVeterinarian,
    PageRequest, Paginated, Province, Race, ReportQuery, ResourceId, UpdateAdopter, UpdateAnimal,
    UpdateVeterinarian, Veterinarian, VetId, VetSearchQuery,
};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ApiError {
    /// Transport failure: no response was received.
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response without structured content.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    /// Structured rejection with a machine-readable code, e.g. `ECC` for a
    /// duplicate chip code pointing at the conflicting record.
    #[error("conflict {code}")]
    Conflict { code: String, content: Option<Value> },
    /// 401/403-class response. Also fires the client's auth-failure hook.
    #[error("authentication failure (HTTP {status})")]
    Auth { status: u16 },
    /// 2xx body that fails schema parsing: a client/server contract
    /// defect, not a bad request.
    #[error("response validation failed: {0}")]
    Validation(String),
    #[error("config error: {0}")]
    Config(String),
}

impl ApiError {
    /// For an `ECC` duplicate-chip-code conflict, the id of the animal
    /// already holding the chip code.
    pub fn conflicting_animal(&self) -> Option<AnimalId> {
        match self {
            ApiError::Conflict { code, content } if code == "ECC" => content
                .as_ref()
                .and_then(|c| c.get("animal_id"))
                .and_then(Value::as_i64),
            _ => None,
        }
    }
}

impl From<ApiError> for DataError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(message) => DataError::Network(message),
            ApiError::Http { status, message } => DataError::Http { status, message },
            ApiError::Conflict { code, content } => DataError::Conflict { code, content },
            ApiError::Auth { status } => DataError::Auth { status },
            ApiError::Validation(message) => DataError::Validation(message),
            ApiError::Config(message) => DataError::Network(message),
        }
    }
}

/// Shared bearer-token slot. The [`RestClient`] reads it on every request;
/// the auth gate writes it on login/logout.
#[derive(Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write().expect("token lock poisoned") = Some(token.into());
    }

    pub fn clear(&self) {
        *self.inner.write().expect("token lock poisoned") = None;
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().expect("token lock poisoned").clone()
    }

    pub fn is_present(&self) -> bool {
        self.inner.read().expect("token lock poisoned").is_some()
    }
}

type AuthFailureHook = Arc<dyn Fn(u16) + Send + Sync>;

/// Structured error body the backend attaches to rejected requests.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    token: TokenStore,
    on_auth_failure: Arc<RwLock<Option<AuthFailureHook>>>,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: TokenStore::new(),
            on_auth_failure: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.token
    }

    /// Register the single callback invoked on any 401/403 response.
    /// Registering again replaces the previous callback.
    pub fn on_auth_failure(&self, hook: impl Fn(u16) + Send + Sync + 'static) {
        *self
            .on_auth_failure
            .write()
            .expect("auth hook lock poisoned") = Some(Arc::new(hook));
    }

    // ------------------------------------------------------------------
    // Animals
    // ------------------------------------------------------------------

    pub async fn search_animals(
        &self,
        query: &AnimalSearchQuery,
        page: &PageRequest,
    ) -> Result<Paginated<AnimalSearchResult>, ApiError> {
        let request = self.client.get(self.url("/animals")).query(query).query(page);
        self.send(request).await
    }

    pub async fn get_animal(&self, animal_id: AnimalId) -> Result<Animal, ApiError> {
        let request = self.client.get(self.url(&format!("/animals/{}", animal_id)));
        self.send(request).await
    }

    pub async fn create_animal_entry(&self, entry: &NewAnimalEntry) -> Result<Animal, ApiError> {
        let request = self.client.post(self.url("/animals")).json(entry);
        self.send(request).await
    }

    pub async fn update_animal(
        &self,
        animal_id: AnimalId,
        update: &UpdateAnimal,
    ) -> Result<Animal, ApiError> {
        let request = self
            .client
            .put(self.url(&format!("/animals/{}", animal_id)))
            .json(update);
        self.send(request).await
    }

    pub async fn exit_animal(
        &self,
        animal_id: AnimalId,
        exit: &AnimalExitRequest,
    ) -> Result<Animal, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/animals/{}/exit", animal_id)))
            .json(exit);
        self.send(request).await
    }

    /// CSV export of intakes in the query window.
    pub async fn animal_entries_report(&self, query: &ReportQuery) -> Result<Vec<u8>, ApiError> {
        self.get_bytes("/animals/reports/entries", query).await
    }

    /// CSV export of exits in the query window.
    pub async fn animal_exits_report(&self, query: &ReportQuery) -> Result<Vec<u8>, ApiError> {
        self.get_bytes("/animals/reports/exits", query).await
    }

    // ------------------------------------------------------------------
    // Documents (two-phase attach)
    // ------------------------------------------------------------------

    /// Phase one: upload the raw file, receiving an opaque resource id.
    ///
    /// A failed phase two leaves the uploaded file orphaned; it is not
    /// retried or garbage-collected here.
    pub async fn upload_resource(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<ResourceId, ApiError> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let form = Form::new().part("file", part);
        let request = self.client.post(self.url("/resources")).multipart(form);
        self.send(request).await
    }

    /// Phase two: associate an uploaded resource with an animal record.
    pub async fn create_animal_document(
        &self,
        animal_id: AnimalId,
        document: &NewAnimalDocument,
    ) -> Result<AnimalDocument, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/animals/{}/documents", animal_id)))
            .json(document);
        self.send(request).await
    }

    pub async fn list_animal_documents(
        &self,
        animal_id: AnimalId,
    ) -> Result<Vec<AnimalDocument>, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/animals/{}/documents", animal_id)));
        self.send(request).await
    }

    // ------------------------------------------------------------------
    // Adopters and adoptions
    // ------------------------------------------------------------------

    pub async fn search_adopters(
        &self,
        query: &AdopterSearchQuery,
        page: &PageRequest,
    ) -> Result<Paginated<Adopter>, ApiError> {
        let request = self.client.get(self.url("/adopters")).query(query).query(page);
        self.send(request).await
    }

    pub async fn get_adopter(&self, adopter_id: i64) -> Result<Adopter, ApiError> {
        let request = self.client.get(self.url(&format!("/adopters/{}", adopter_id)));
        self.send(request).await
    }

    pub async fn create_adopter(&self, adopter: &NewAdopter) -> Result<Adopter, ApiError> {
        let request = self.client.post(self.url("/adopters")).json(adopter);
        self.send(request).await
    }

    pub async fn update_adopter(
        &self,
        adopter_id: i64,
        update: &UpdateAdopter,
    ) -> Result<Adopter, ApiError> {
        let request = self
            .client
            .put(self.url(&format!("/adopters/{}", adopter_id)))
            .json(update);
        self.send(request).await
    }

    pub async fn create_adoption(&self, adoption: &AdoptionRequest) -> Result<Adoption, ApiError> {
        let request = self.client.post(self.url("/adoptions")).json(adoption);
        self.send(request).await
    }

    // ------------------------------------------------------------------
    // Veterinarians
    // ------------------------------------------------------------------

    pub async fn search_vets(
        &self,
        query: &VetSearchQuery,
        page: &PageRequest,
    ) -> Result<Paginated<Veterinarian>, ApiError> {
        let request = self
            .client
            .get(self.url("/veterinarians"))
            .query(query)
            .query(page);
        self.send(request).await
    }

    pub async fn create_vet(&self, vet: &NewVeterinarian) -> Result<Veterinarian, ApiError> {
        let request = self.client.post(self.url("/veterinarians")).json(vet);
        self.send(request).await
    }

    pub async fn update_vet(
        &self,
        vet_id: VetId,
        update: &UpdateVeterinarian,
    ) -> Result<Veterinarian, ApiError> {
        let request = self
            .client
            .put(self.url(&format!("/veterinarians/{}", vet_id)))
            .json(update);
        self.send(request).await
    }

    // ------------------------------------------------------------------
    // Lookup lists
    // ------------------------------------------------------------------

    pub async fn list_races(&self) -> Result<Vec<Race>, ApiError> {
        self.send(self.client.get(self.url("/races"))).await
    }

    pub async fn list_breeds(&self, race_id: &str) -> Result<Vec<Breed>, ApiError> {
        let request = self.client.get(self.url(&format!("/races/{}/breeds", race_id)));
        self.send(request).await
    }

    pub async fn create_breed(&self, breed: &NewBreed) -> Result<Breed, ApiError> {
        self.send(self.client.post(self.url("/breeds")).json(breed))
            .await
    }

    pub async fn list_provinces(&self) -> Result<Vec<Province>, ApiError> {
        self.send(self.client.get(self.url("/provinces"))).await
    }

    pub async fn list_cities(&self, province_code: &str) -> Result<Vec<City>, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/provinces/{}/cities", province_code)));
        self.send(request).await
    }

    pub async fn list_doc_kinds(&self) -> Result<Vec<DocKind>, ApiError> {
        self.send(self.client.get(self.url("/document-kinds"))).await
    }

    pub async fn create_doc_kind(&self, kind: &NewDocKind) -> Result<DocKind, ApiError> {
        self.send(self.client.post(self.url("/document-kinds")).json(kind))
            .await
    }

    // ------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builder for a JSON POST, for callers that drive `send` themselves
    /// (the auth gate's login).
    pub(crate) fn post_json_builder<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).json(body)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.get() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        self.parse_response(response).await
    }

    async fn get_bytes<Q: serde::Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<Vec<u8>, ApiError> {
        let request = self.client.get(self.url(path)).query(query);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            Ok(bytes.to_vec())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(self.reject(status.as_u16(), &body))
        }
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            serde_json::from_str::<T>(&text).map_err(|err| ApiError::Validation(err.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(self.reject(status.as_u16(), &body))
        }
    }

    /// Classify a non-2xx response and fire the auth hook when applicable.
    fn reject(&self, status: u16, body: &str) -> ApiError {
        let err = classify_error(status, body);
        if let ApiError::Auth { status } = err {
            warn!(status, "authentication failure reported by backend");
            self.notify_auth_failure(status);
        }
        err
    }

    pub(crate) fn notify_auth_failure(&self, status: u16) {
        let hook = self
            .on_auth_failure
            .read()
            .expect("auth hook lock poisoned")
            .clone();
        if let Some(hook) = hook {
            hook(status);
        }
    }
}

/// Map a non-2xx response to the error taxonomy.
///
/// 401/403 take precedence over any body; a decodable `{code, content}`
/// body is a structured conflict; everything else is a generic HTTP error.
fn classify_error(status: u16, body: &str) -> ApiError {
    if status == 401 || status == 403 {
        return ApiError::Auth { status };
    }
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return ApiError::Conflict {
            code: parsed.code,
            content: parsed.content,
        };
    }
    ApiError::Http {
        status,
        message: body.chars().take(200).collect(),
    }
}
