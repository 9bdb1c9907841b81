//! Firestore REST client for the shared guest collection.
//!
//! Documents use the camelCase field names shared with the mobile clients
//! (`phoneNumber`, `hasLanyard`, ...) and the guest id as document id.
//! Change notifications come from a background poller that diffs
//! successive snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::{ChangeBatch, RemoteStore, Subscription};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::{GuestId, GuestRecord};
use crate::util::compact_text;

const PAGE_SIZE: usize = 300;
const HTTP_TIMEOUT_SECS: u64 = 15;
/// Firestore rejects commits with more writes than this.
const MAX_COMMIT_WRITES: usize = 500;

/// Guest collection stored in Cloud Firestore (or its emulator).
#[derive(Clone)]
pub struct FirestoreCollection {
    client: reqwest::Client,
    target: Arc<Target>,
}

#[derive(Debug)]
struct Target {
    endpoint: String,
    documents_root: String,
    collection: String,
    api_key: Option<String>,
    auth_token: Option<String>,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl FirestoreCollection {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        config.validate()?;

        let target = Target {
            endpoint: config.endpoint(),
            documents_root: format!(
                "projects/{}/databases/{}/documents",
                config.project_id(),
                config.database()
            ),
            collection: config.collection(),
            api_key: config.api_key.clone(),
            auth_token: config.auth_token.clone(),
            poll_interval: config.poll_interval(),
        };
        tracing::debug!(
            "Firestore collection {}/{} at {}",
            target.documents_root,
            target.collection,
            target.endpoint
        );

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()?,
            target: Arc::new(target),
        })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/v1/{}/{}",
            self.target.endpoint, self.target.documents_root, self.target.collection
        )
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/v1/{}:commit",
            self.target.endpoint, self.target.documents_root
        )
    }

    fn document_name(&self, id: &GuestId) -> Result<String> {
        if id.is_blank() || id.as_str().contains('/') {
            return Err(Error::InvalidInput(format!(
                "'{id}' cannot be used as a document id"
            )));
        }
        Ok(format!(
            "{}/{}/{}",
            self.target.documents_root,
            self.target.collection,
            id.as_str()
        ))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match self.target.api_key.as_deref() {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        };
        match self.target.auth_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Page through every document in the collection.
    async fn list_documents(&self) -> Result<Vec<GuestRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.collection_url())
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let response = self.authorize(request).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::RemoteUnavailable(parse_api_error(status, &body)));
            }

            let page = response.json::<ListDocumentsResponse>().await?;
            records.extend(page.documents.iter().filter_map(decode_document));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(records)
    }

    /// Apply writes through a single atomic commit.
    async fn commit(&self, writes: Vec<Value>) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let count = writes.len();
        if count > MAX_COMMIT_WRITES {
            return Err(Error::BatchCommitFailed(format!(
                "{count} writes exceed the Firestore limit of {MAX_COMMIT_WRITES} per commit"
            )));
        }

        let response = self
            .authorize(self.client.post(self.commit_url()))
            .json(&json!({ "writes": writes }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BatchCommitFailed(parse_api_error(status, &body)));
        }

        tracing::debug!("Committed {count} writes to Firestore");
        Ok(())
    }

    async fn poll_changes(
        self,
        initial: Vec<GuestRecord>,
        sender: mpsc::UnboundedSender<ChangeBatch>,
    ) {
        let mut known = index_snapshot(initial);
        let mut ticker = tokio::time::interval(self.target.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if sender.is_closed() {
                break;
            }

            match self.list_documents().await {
                Ok(snapshot) => {
                    let changed = diff_snapshot(&mut known, snapshot);
                    if !changed.is_empty() && sender.send(Ok(changed)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::warn!("Polling guest collection failed, retrying: {error}");
                }
            }
        }
        tracing::debug!("Firestore poller stopped");
    }
}

impl RemoteStore for FirestoreCollection {
    async fn fetch_all(&self) -> Result<Vec<GuestRecord>> {
        self.list_documents().await
    }

    async fn batch_upsert(&self, records: &[GuestRecord]) -> Result<()> {
        let writes = records
            .iter()
            .map(|record| {
                let name = self.document_name(&record.id)?;
                Ok(json!({
                    "update": {
                        "name": name,
                        "fields": encode_fields(record),
                    }
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        self.commit(writes).await
    }

    async fn batch_delete(&self, ids: &[GuestId]) -> Result<()> {
        let writes = ids
            .iter()
            .map(|id| {
                let name = self.document_name(id)?;
                Ok(json!({ "delete": name }))
            })
            .collect::<Result<Vec<_>>>()?;
        self.commit(writes).await
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let initial = self.list_documents().await?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(Ok(initial.clone()));

        let poller = tokio::spawn(self.clone().poll_changes(initial, sender));
        tracing::info!(
            "Listening for guest changes every {:?}",
            self.target.poll_interval
        );
        Ok(Subscription::new(receiver, move || poller.abort()))
    }
}

fn index_snapshot(records: Vec<GuestRecord>) -> HashMap<GuestId, GuestRecord> {
    records
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect()
}

/// Records that are new or differ from `known`; `known` becomes `snapshot`.
fn diff_snapshot(
    known: &mut HashMap<GuestId, GuestRecord>,
    snapshot: Vec<GuestRecord>,
) -> Vec<GuestRecord> {
    let changed = snapshot
        .iter()
        .filter(|record| {
            !known
                .get(&record.id)
                .is_some_and(|previous| previous.fields_match(record))
        })
        .cloned()
        .collect();
    *known = index_snapshot(snapshot);
    changed
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn optional_string_value(value: Option<&String>) -> Value {
    value.map_or_else(|| json!({ "nullValue": null }), |value| string_value(value))
}

fn boolean_value(value: bool) -> Value {
    json!({ "booleanValue": value })
}

fn encode_fields(record: &GuestRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("name".into(), string_value(&record.name));
    fields.insert("email".into(), string_value(&record.email));
    fields.insert("phoneNumber".into(), string_value(&record.phone_number));
    fields.insert("companyName".into(), string_value(&record.company_name));
    fields.insert("attending".into(), boolean_value(record.attending));
    fields.insert("hasLanyard".into(), boolean_value(record.has_lanyard));
    fields.insert("hasGift".into(), boolean_value(record.has_gift));
    fields.insert("hasFoodCoupon".into(), boolean_value(record.has_food_coupon));
    fields.insert(
        "remarks".into(),
        optional_string_value(record.remarks.as_ref()),
    );
    fields.insert(
        "paymentMode".into(),
        optional_string_value(record.payment_mode.as_ref()),
    );
    fields.insert(
        "amount".into(),
        optional_string_value(record.amount.as_ref()),
    );
    fields.insert(
        "category".into(),
        optional_string_value(record.category.as_ref()),
    );
    fields.insert("deleted".into(), boolean_value(record.deleted));
    fields
}

/// Text content of a field; numbers written by other clients are stringified.
fn read_string(fields: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    let value = fields.get(key)?;
    if let Some(text) = value.get("stringValue").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    if let Some(integer) = value.get("integerValue").and_then(Value::as_str) {
        return Some(integer.to_string());
    }
    value
        .get("doubleValue")
        .and_then(Value::as_f64)
        .map(|double| double.to_string())
}

fn read_bool(fields: &BTreeMap<String, Value>, key: &str) -> bool {
    fields
        .get(key)
        .and_then(|value| value.get("booleanValue"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn decode_document(document: &Document) -> Option<GuestRecord> {
    let id = document.name.rsplit('/').next()?.trim();
    if id.is_empty() {
        return None;
    }
    let fields = &document.fields;

    Some(GuestRecord {
        id: GuestId::from_raw(id),
        name: read_string(fields, "name").unwrap_or_else(|| id.to_string()),
        email: read_string(fields, "email").unwrap_or_default(),
        phone_number: read_string(fields, "phoneNumber").unwrap_or_default(),
        company_name: read_string(fields, "companyName").unwrap_or_default(),
        attending: read_bool(fields, "attending"),
        has_lanyard: read_bool(fields, "hasLanyard"),
        has_gift: read_bool(fields, "hasGift"),
        has_food_coupon: read_bool(fields, "hasFoodCoupon"),
        remarks: read_string(fields, "remarks"),
        payment_mode: read_string(fields, "paymentMode"),
        amount: read_string(fields, "amount"),
        category: read_string(fields, "category"),
        deleted: read_bool(fields, "deleted"),
    })
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(error) = envelope.error {
            if let Some(message) = error.message.or(error.status) {
                return format!("{} ({})", message.trim(), status.as_u16());
            }
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
