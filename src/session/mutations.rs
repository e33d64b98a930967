use std::future::Future;

use tracing::{debug, info, warn};

use crate::calendar::now_ms;
use crate::model::*;
use crate::observability;
use crate::schema;
use crate::store::{CollectionPath, Fields, StoreError};

use super::validate::*;
use super::{Session, SessionError, ValidationError};

impl Session {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn ensure_apartment(&self, id: DocId) -> Result<(), SessionError> {
        if self.state.apartments().iter().any(|a| a.id == id) {
            Ok(())
        } else {
            Err(SessionError::UnknownApartment(id))
        }
    }

    fn check(&self, op: &'static str, result: Result<(), ValidationError>) -> Result<(), SessionError> {
        result.map_err(|e| {
            metrics::counter!(observability::VALIDATION_FAILURES_TOTAL, "op" => op).increment(1);
            debug!("{op} rejected: {e}");
            SessionError::Validation(e)
        })
    }

    /// Await a store call, counting and logging a rejection.
    async fn remote<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, SessionError> {
        call.await.map_err(|e| {
            metrics::counter!(observability::REMOTE_FAILURES_TOTAL, "op" => op).increment(1);
            warn!("{op} failed for {}: {e}", self.user);
            SessionError::Remote(e)
        })
    }

    async fn patch(&self, op: &'static str, path: CollectionPath, id: DocId, fields: Fields) -> Result<(), SessionError> {
        if fields.is_empty() {
            return Ok(());
        }
        self.remote(op, self.store.update(&path, id, fields)).await
    }

    // ── Apartments ───────────────────────────────────────────────

    pub async fn create_apartment(&self, draft: ApartmentDraft) -> Result<DocId, SessionError> {
        self.ensure_open()?;
        self.check("create_apartment", validate_apartment_draft(&draft))?;
        let path = CollectionPath::apartments(&self.user);
        let fields = schema::apartment_fields(&draft, now_ms());
        let id = self.remote("create_apartment", self.store.add(&path, fields)).await?;
        info!("created apartment {id} ({})", draft.name.trim());
        Ok(id)
    }

    pub async fn update_apartment(&self, id: DocId, patch: ApartmentPatch) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.check("update_apartment", validate_apartment_patch(&patch))?;
        let path = CollectionPath::apartments(&self.user);
        self.patch("update_apartment", path, id, schema::apartment_patch_fields(&patch))
            .await
    }

    /// Delete an apartment with its reservations and expenses. Children go
    /// first, so a failure part way leaves the apartment in place.
    pub async fn delete_apartment(&self, id: DocId) -> Result<(), SessionError> {
        self.ensure_open()?;
        let op = "delete_apartment";

        let reservations = CollectionPath::reservations(&self.user, id);
        let docs = self.remote(op, self.store.get_all(&reservations)).await?;
        for doc in &docs {
            self.remote(op, self.store.delete(&reservations, doc.id)).await?;
        }
        let expenses = CollectionPath::expenses(&self.user, id);
        let charges = self.remote(op, self.store.get_all(&expenses)).await?;
        for doc in &charges {
            self.remote(op, self.store.delete(&expenses, doc.id)).await?;
        }

        let apartments = CollectionPath::apartments(&self.user);
        self.remote(op, self.store.delete(&apartments, id)).await?;
        info!(
            "deleted apartment {id} with {} reservations and {} expenses",
            docs.len(),
            charges.len()
        );
        Ok(())
    }

    // ── Reservations ─────────────────────────────────────────────

    pub async fn create_reservation(&self, apartment: DocId, draft: ReservationDraft) -> Result<DocId, SessionError> {
        self.ensure_open()?;
        self.check("create_reservation", validate_reservation_draft(&draft))?;
        self.ensure_apartment(apartment)?;
        let path = CollectionPath::reservations(&self.user, apartment);
        let fields = schema::reservation_fields(&draft, now_ms());
        let id = self.remote("create_reservation", self.store.add(&path, fields)).await?;
        debug!("created reservation {id} in {apartment}: {} .. {}", draft.start, draft.end);
        Ok(id)
    }

    /// Partial update. When only one end moves, the other is taken from the
    /// mirrored reservation for the range check.
    pub async fn update_reservation(
        &self,
        apartment: DocId,
        id: DocId,
        patch: ReservationPatch,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        let current = self.reservation(apartment, id);
        self.check("update_reservation", validate_reservation_patch(&patch, current.as_ref()))?;
        let path = CollectionPath::reservations(&self.user, apartment);
        self.patch("update_reservation", path, id, schema::reservation_patch_fields(&patch))
            .await
    }

    pub async fn delete_reservation(&self, apartment: DocId, id: DocId) -> Result<(), SessionError> {
        self.ensure_open()?;
        let path = CollectionPath::reservations(&self.user, apartment);
        self.remote("delete_reservation", self.store.delete(&path, id)).await
    }

    // ── Expenses ─────────────────────────────────────────────────

    pub async fn create_expense(&self, apartment: DocId, draft: ExpenseDraft) -> Result<DocId, SessionError> {
        self.ensure_open()?;
        self.check("create_expense", validate_expense_draft(&draft))?;
        self.ensure_apartment(apartment)?;
        let path = CollectionPath::expenses(&self.user, apartment);
        let fields = schema::expense_fields(&draft, now_ms());
        let id = self.remote("create_expense", self.store.add(&path, fields)).await?;
        debug!("created expense {id} in {apartment}: {} on {}", draft.amount, draft.day);
        Ok(id)
    }

    pub async fn update_expense(&self, apartment: DocId, id: DocId, patch: ExpensePatch) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.check("update_expense", validate_expense_patch(&patch))?;
        let path = CollectionPath::expenses(&self.user, apartment);
        self.patch("update_expense", path, id, schema::expense_patch_fields(&patch))
            .await
    }

    pub async fn delete_expense(&self, apartment: DocId, id: DocId) -> Result<(), SessionError> {
        self.ensure_open()?;
        let path = CollectionPath::expenses(&self.user, apartment);
        self.remote("delete_expense", self.store.delete(&path, id)).await
    }
}
