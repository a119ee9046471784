//! Inspection records: the latest damage annotation for each vehicle.
//!
//! Records live as an array under `damages` in the `vehicleDamages`
//! collection. Saving overwrites the vehicle's current record in place; the
//! current record is resolved at read time as the one created last.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{BackendError, PersistenceBackend};
use crate::codec::EncodedAnnotation;

pub const COLLECTION: &str = "vehicleDamages";
pub const RECORDS_KEY: &str = "damages";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] BackendError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionRecord {
    pub id: String,
    pub vehicle_id: String,
    /// Written as an explicit `null` when absent; the key is always present.
    pub work_order_id: Option<String>,
    pub image: EncodedAnnotation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InspectionRecord {
    fn new(vehicle_id: &str, work_order_id: Option<&str>, image: EncodedAnnotation) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            vehicle_id: vehicle_id.to_string(),
            work_order_id: work_order_id.map(str::to_string),
            image,
            created_at: now,
            updated_at: now,
        }
    }
}

pub struct InspectionRecordStore {
    backend: Arc<dyn PersistenceBackend>,
}

impl InspectionRecordStore {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }

    /// Store `encoded` as the vehicle's current annotation.
    ///
    /// Overwrites the current record when the vehicle already has one,
    /// keeping its `id` and `created_at`.
    pub async fn save(
        &self,
        vehicle_id: &str,
        work_order_id: Option<&str>,
        encoded: &str,
    ) -> StoreResult<InspectionRecord> {
        let (vehicle_id, image) = validate(vehicle_id, encoded)?;
        let work_order_id = normalize_work_order(work_order_id);
        let candidate = InspectionRecord::new(&vehicle_id, work_order_id.as_deref(), image);

        let target = vehicle_id.clone();
        let document = self
            .backend
            .update(
                COLLECTION,
                Box::new(move |doc| {
                    let (mut records, unparsed) = split_records(&doc);
                    match current_index(&records, &target) {
                        Some(i) => {
                            let existing = &mut records[i];
                            existing.image = candidate.image;
                            existing.work_order_id = candidate.work_order_id;
                            existing.updated_at = candidate.updated_at;
                        }
                        None => records.push(candidate),
                    }
                    with_records(doc, &records, unparsed)
                }),
            )
            .await?;
        ensure_object(&document)?;

        let records = records_of(&document);
        let saved = current_index(&records, &vehicle_id)
            .map(|i| records[i].clone())
            .ok_or_else(|| {
                BackendError::Unavailable("saved record missing from written collection".into())
            })?;
        info!(vehicle_id = %saved.vehicle_id, record_id = %saved.id, "Inspection saved");
        Ok(saved)
    }

    /// The most recently created record for the vehicle, if any.
    pub async fn get_current(&self, vehicle_id: &str) -> StoreResult<Option<InspectionRecord>> {
        let vehicle_id = vehicle_key(vehicle_id);
        let records = records_of(&self.backend.read(COLLECTION).await?);
        let current = current_index(&records, vehicle_id).map(|i| records[i].clone());
        debug!(vehicle_id, found = current.is_some(), "Current inspection lookup");
        Ok(current)
    }

    /// Every record for the vehicle, newest first.
    pub async fn get_history(&self, vehicle_id: &str) -> StoreResult<Vec<InspectionRecord>> {
        let vehicle_id = vehicle_key(vehicle_id);
        let records = records_of(&self.backend.read(COLLECTION).await?);
        let mut history: Vec<(usize, InspectionRecord)> = records
            .into_iter()
            .enumerate()
            .filter(|(_, r)| r.vehicle_id == vehicle_id)
            .collect();
        history.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(history.into_iter().map(|(_, r)| r).collect())
    }

    /// Append a new record without touching existing ones.
    #[deprecated(note = "`save` overwrites the current record and is the supported write path")]
    pub async fn append_history(
        &self,
        vehicle_id: &str,
        work_order_id: Option<&str>,
        encoded: &str,
    ) -> StoreResult<InspectionRecord> {
        let (vehicle_id, image) = validate(vehicle_id, encoded)?;
        let work_order_id = normalize_work_order(work_order_id);
        let record = InspectionRecord::new(&vehicle_id, work_order_id.as_deref(), image);

        let appended = record.clone();
        let document = self
            .backend
            .update(
                COLLECTION,
                Box::new(move |doc| {
                    let (mut records, unparsed) = split_records(&doc);
                    records.push(appended);
                    with_records(doc, &records, unparsed)
                }),
            )
            .await?;
        ensure_object(&document)?;
        info!(vehicle_id = %record.vehicle_id, record_id = %record.id, "Inspection appended");
        Ok(record)
    }
}

/// Vehicle ids are matched and stored without surrounding whitespace.
fn vehicle_key(vehicle_id: &str) -> &str {
    vehicle_id.trim()
}

fn validate(vehicle_id: &str, encoded: &str) -> StoreResult<(String, EncodedAnnotation)> {
    let vehicle_id = vehicle_key(vehicle_id);
    if vehicle_id.is_empty() {
        return Err(StoreError::InvalidInput("vehicle id is required".into()));
    }
    if encoded.trim().is_empty() {
        return Err(StoreError::InvalidInput("annotation image is empty".into()));
    }
    let image = EncodedAnnotation::parse(encoded)
        .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
    Ok((vehicle_id.to_string(), image))
}

fn normalize_work_order(work_order_id: Option<&str>) -> Option<String> {
    work_order_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Records in `doc`; a missing or malformed array reads as empty and
/// individual records that fail to parse are skipped.
fn records_of(doc: &Value) -> Vec<InspectionRecord> {
    split_records(doc).0
}

/// Parsed records plus the raw entries that did not parse, so writes can
/// carry the latter through untouched.
fn split_records(doc: &Value) -> (Vec<InspectionRecord>, Vec<Value>) {
    let mut records = Vec::new();
    let mut unparsed = Vec::new();
    let items = doc.get(RECORDS_KEY).and_then(Value::as_array);
    for item in items.into_iter().flatten() {
        match serde_json::from_value(item.clone()) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(error = %e, "Skipping malformed inspection record");
                unparsed.push(item.clone());
            }
        }
    }
    (records, unparsed)
}

/// Write `records` back into `doc`. A document that is not a JSON object is
/// returned unchanged; `ensure_object` turns that into an error afterwards.
fn with_records(doc: Value, records: &[InspectionRecord], unparsed: Vec<Value>) -> Value {
    let Value::Object(mut map) = doc else {
        return doc;
    };
    let mut items = unparsed;
    items.extend(records.iter().filter_map(|r| serde_json::to_value(r).ok()));
    map.insert(RECORDS_KEY.to_string(), Value::Array(items));
    Value::Object(map)
}

fn ensure_object(document: &Value) -> StoreResult<()> {
    if document.is_object() {
        return Ok(());
    }
    error!(collection = COLLECTION, "Refusing to write into a non-object collection document");
    Err(BackendError::Corrupt(format!("collection {COLLECTION} is not a JSON object")).into())
}

/// Index of the latest-created record for the vehicle; ties go to the later entry.
fn current_index(records: &[InspectionRecord], vehicle_id: &str) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.vehicle_id == vehicle_id)
        .max_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ia.cmp(ib)))
        .map(|(i, _)| i)
}
