use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use ulid::Ulid;

use crate::model::*;
use crate::schema;
use crate::store::{Document, FieldValue};

pub const KEY_APARTMENTS: &str = "Homeday.apartments.v2";
pub const KEY_RESERVATIONS: &str = "Homeday.reservations.v1";
pub const KEY_CHARGES: &str = "Homeday.charges.v1";

/// Name given to an imported apartment that has none.
pub const DEFAULT_APARTMENT_NAME: &str = "Apartment";

#[derive(Debug)]
pub enum LegacyError {
    Io(io::Error),
    Json { key: &'static str, source: serde_json::Error },
    Shape { key: &'static str, expected: &'static str },
}

impl fmt::Display for LegacyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyError::Io(e) => write!(f, "legacy storage I/O error: {e}"),
            LegacyError::Json { key, source } => write!(f, "legacy record {key} is not valid JSON: {source}"),
            LegacyError::Shape { key, expected } => write!(f, "legacy record {key} is not {expected}"),
        }
    }
}

impl std::error::Error for LegacyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LegacyError::Io(e) => Some(e),
            LegacyError::Json { source, .. } => Some(source),
            LegacyError::Shape { .. } => None,
        }
    }
}

impl From<io::Error> for LegacyError {
    fn from(e: io::Error) -> Self {
        LegacyError::Io(e)
    }
}

/// Key/value storage holding the old on-device app's string blobs: an
/// apartment array, plus reservations and charges keyed by the old apartment
/// id. Read once, by the migration.
#[async_trait]
pub trait LegacyStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, LegacyError>;
}

// ── Backends ─────────────────────────────────────────────────────

/// One JSON object file mapping each key to its blob. A blob may be stored
/// as a string (as the old app did) or inline as JSON.
pub struct JsonFileLegacyStore {
    path: PathBuf,
}

impl JsonFileLegacyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LegacyStore for JsonFileLegacyStore {
    async fn read(&self, key: &str) -> Result<Option<String>, LegacyError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: Value = serde_json::from_str(&raw).map_err(|source| LegacyError::Json {
            key: "legacy file",
            source,
        })?;
        Ok(match file.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(inline) => Some(inline.to_string()),
        })
    }
}

#[derive(Default)]
pub struct MemoryLegacyStore {
    entries: HashMap<String, String>,
}

impl MemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, blob: impl Into<String>) -> Self {
        self.entries.insert(key.to_string(), blob.into());
        self
    }
}

#[async_trait]
impl LegacyStore for MemoryLegacyStore {
    async fn read(&self, key: &str) -> Result<Option<String>, LegacyError> {
        Ok(self.entries.get(key).cloned())
    }
}

// ── Parsing ──────────────────────────────────────────────────────

/// One old apartment with its records, ready to be written under a new id.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyApartment {
    pub legacy_id: Option<String>,
    pub draft: ApartmentDraft,
    pub reservations: Vec<ReservationDraft>,
    pub expenses: Vec<ExpenseDraft>,
}

async fn read_json(store: &dyn LegacyStore, key: &'static str) -> Result<Option<Value>, LegacyError> {
    let Some(raw) = store.read(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| LegacyError::Json { key, source })
}

fn id_key(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Treat a JSON object as a store document so the usual field coercion applies.
fn as_document(v: &Value) -> Option<Document> {
    let obj = v.as_object()?;
    Some(Document {
        id: Ulid::nil(),
        fields: obj.iter().map(|(k, v)| (k.clone(), FieldValue::from(v))).collect(),
    })
}

fn records_by_apartment(value: Option<Value>, key: &'static str) -> Result<HashMap<String, Vec<Value>>, LegacyError> {
    let Some(value) = value else {
        return Ok(HashMap::new());
    };
    let Value::Object(map) = value else {
        return Err(LegacyError::Shape { key, expected: "an object" });
    };
    Ok(map
        .into_iter()
        .map(|(id, list)| match list {
            Value::Array(items) => (id, items),
            _ => (id, Vec::new()),
        })
        .collect())
}

fn reservation_draft(v: &Value) -> Option<ReservationDraft> {
    let r = schema::reservation_from_doc(Ulid::nil(), &as_document(v)?)?;
    Some(ReservationDraft {
        start: r.range.start,
        end: r.range.end,
        status: r.status,
        guest_name: r.guest_name,
        phone: r.phone,
        cin: r.cin,
        // Numeric strings are not prices.
        price_per_day: v.get("pricePerDay").and_then(Value::as_f64).filter(|p| p.is_finite()),
        notes: r.notes,
    })
}

fn expense_draft(v: &Value) -> Option<ExpenseDraft> {
    let e = schema::expense_from_doc(Ulid::nil(), &as_document(v)?)?;
    Some(ExpenseDraft {
        day: e.day,
        amount: e.amount,
        note: e.note,
    })
}

/// Read all three blobs. Missing blobs read as empty. Records without a
/// usable day are dropped with a warning.
pub async fn load(store: &dyn LegacyStore) -> Result<Vec<LegacyApartment>, LegacyError> {
    let apartments = match read_json(store, KEY_APARTMENTS).await? {
        None => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(LegacyError::Shape {
                key: KEY_APARTMENTS,
                expected: "an array",
            });
        }
    };
    let mut reservations = records_by_apartment(read_json(store, KEY_RESERVATIONS).await?, KEY_RESERVATIONS)?;
    let mut charges = records_by_apartment(read_json(store, KEY_CHARGES).await?, KEY_CHARGES)?;

    let mut out = Vec::with_capacity(apartments.len());
    for apt in &apartments {
        let legacy_id = apt.get("id").and_then(id_key);
        let name = apt
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_APARTMENT_NAME);
        // Only real numbers count as a price here; numeric strings do not.
        let price_per_day = apt
            .get("pricePerDay")
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite());

        let own_reservations = legacy_id
            .as_ref()
            .and_then(|id| reservations.remove(id))
            .unwrap_or_default();
        let own_charges = legacy_id
            .as_ref()
            .and_then(|id| charges.remove(id))
            .unwrap_or_default();

        let res: Vec<ReservationDraft> = own_reservations.iter().filter_map(reservation_draft).collect();
        let exp: Vec<ExpenseDraft> = own_charges.iter().filter_map(expense_draft).collect();
        let dropped = own_reservations.len() - res.len() + own_charges.len() - exp.len();
        if dropped > 0 {
            warn!("legacy apartment {name}: dropped {dropped} unreadable records");
        }

        out.push(LegacyApartment {
            legacy_id,
            draft: ApartmentDraft {
                name: name.to_string(),
                price_per_day,
            },
            reservations: res,
            expenses: exp,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> Day {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn empty_storage_loads_nothing() {
        let loaded = load(&MemoryLegacyStore::new()).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn records_follow_their_apartment() {
        let store = MemoryLegacyStore::new()
            .with(
                KEY_APARTMENTS,
                r#"[{"id":"a1","name":"Sea view","pricePerDay":80},{"id":7,"name":"","pricePerDay":"90"}]"#,
            )
            .with(
                KEY_RESERVATIONS,
                r#"{"a1":[{"start":"2024-03-10T00:00:00.000Z","end":"2024-03-12T00:00:00.000Z","status":"occupied","guestName":"Ana"},{"start":"bad"}],
                    "7":[{"start":1709251200000,"end":1709337600000}]}"#,
            )
            .with(KEY_CHARGES, r#"{"a1":[{"date":"2024-03-05","amount":"25","note":"gas"}]}"#);

        let loaded = load(&store).await.unwrap();
        assert_eq!(loaded.len(), 2);

        let first = &loaded[0];
        assert_eq!(first.legacy_id.as_deref(), Some("a1"));
        assert_eq!(first.draft.name, "Sea view");
        assert_eq!(first.draft.price_per_day, Some(80.0));
        // The entry without usable days is dropped
        assert_eq!(first.reservations.len(), 1);
        let r = &first.reservations[0];
        assert_eq!((r.start, r.end), (d(2024, 3, 10), d(2024, 3, 12)));
        assert_eq!(r.status, ReservationStatus::Occupied);
        assert_eq!(r.guest_name, "Ana");
        assert_eq!(first.expenses.len(), 1);
        assert_eq!(first.expenses[0].amount, 25.0);

        let second = &loaded[1];
        assert_eq!(second.legacy_id.as_deref(), Some("7"));
        assert_eq!(second.draft.name, DEFAULT_APARTMENT_NAME);
        assert_eq!(second.draft.price_per_day, None);
        assert_eq!(second.reservations.len(), 1);
        assert_eq!(second.reservations[0].status, ReservationStatus::Reserved);
        assert_eq!(second.reservations[0].start, d(2024, 3, 1));
        assert!(second.expenses.is_empty());
    }

    #[tokio::test]
    async fn only_numeric_prices_are_imported() {
        let store = MemoryLegacyStore::new()
            .with(KEY_APARTMENTS, r#"[{"id":"1","name":"Loft","pricePerDay":"55"}]"#)
            .with(
                KEY_RESERVATIONS,
                r#"{"1":[{"start":"2024-03-01","end":"2024-03-02","pricePerDay":"60"},
                         {"start":"2024-03-05","end":"2024-03-06","pricePerDay":70}]}"#,
            );

        let loaded = load(&store).await.unwrap();
        let loft = &loaded[0];
        assert_eq!(loft.draft.price_per_day, None);
        let prices: Vec<Option<f64>> = loft.reservations.iter().map(|r| r.price_per_day).collect();
        assert_eq!(prices, vec![None, Some(70.0)]);
    }

    #[tokio::test]
    async fn apartments_blob_must_be_an_array() {
        let store = MemoryLegacyStore::new().with(KEY_APARTMENTS, r#"{"a":1}"#);
        assert!(matches!(load(&store).await, Err(LegacyError::Shape { .. })));

        let store = MemoryLegacyStore::new().with(KEY_APARTMENTS, "not json");
        assert!(matches!(load(&store).await, Err(LegacyError::Json { .. })));
    }

    #[tokio::test]
    async fn json_file_backend() {
        let dir = std::env::temp_dir().join("homeday_test_legacy");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("legacy.json");
        std::fs::write(
            &path,
            r#"{"Homeday.apartments.v2":"[{\"id\":\"x\",\"name\":\"Loft\"}]","Homeday.charges.v1":{"x":[]}}"#,
        )
        .unwrap();

        let store = JsonFileLegacyStore::new(&path);
        assert_eq!(
            store.read(KEY_APARTMENTS).await.unwrap().as_deref(),
            Some(r#"[{"id":"x","name":"Loft"}]"#)
        );
        assert_eq!(store.read(KEY_CHARGES).await.unwrap().as_deref(), Some(r#"{"x":[]}"#));
        assert_eq!(store.read(KEY_RESERVATIONS).await.unwrap(), None);

        let missing = JsonFileLegacyStore::new(dir.join("nope.json"));
        assert_eq!(missing.read(KEY_APARTMENTS).await.unwrap(), None);
    }
}
