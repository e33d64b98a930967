use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use ulid::Ulid;

use homeday::accounts::AccountManager;
use homeday::legacy::{KEY_APARTMENTS, KEY_CHARGES, KEY_RESERVATIONS, MemoryLegacyStore};
use homeday::locale::Lang;
use homeday::migration::{MigrationOutcome, Migrator};
use homeday::model::*;
use homeday::session::Session;
use homeday::store::{CollectionPath, DocumentStore, MemoryStore};

// ── Test infrastructure ──────────────────────────────────────

fn d(y: i32, m: u32, day: u32) -> Day {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn fresh_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("homeday_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn legacy_fixture() -> MemoryLegacyStore {
    MemoryLegacyStore::new()
        .with(
            KEY_APARTMENTS,
            r#"[{"id":"1","name":"Garden","pricePerDay":60},{"id":"2","name":"Roof"}]"#,
        )
        .with(
            KEY_RESERVATIONS,
            r#"{"1":[{"start":"2024-03-10","end":"2024-03-15","status":"occupied","guestName":"Lina","pricePerDay":100}],
                "2":[{"start":"2024-03-01","end":"2024-03-05"},{"start":"2024-03-03","end":"2024-03-04","status":"occupied"}]}"#,
        )
        .with(KEY_CHARGES, r#"{"1":[{"date":"2024-03-12","amount":150,"note":"cleaning"}]}"#)
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn migrated_account_resolves_and_aggregates() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let migrator = Migrator::new(store.clone(), Arc::new(legacy_fixture()), "owner");
    assert_eq!(
        migrator.migrate_if_empty().await,
        MigrationOutcome::Imported {
            apartments: 2,
            reservations: 3,
            expenses: 1
        }
    );
    assert_eq!(migrator.migrate_if_empty().await, MigrationOutcome::AlreadyDone);

    let session = Session::open(store, "owner", Lang::En);
    let apartments = session.apartments();
    assert_eq!(apartments.len(), 2);
    let garden = apartments.iter().find(|a| a.name == "Garden").unwrap().id;
    let roof = apartments.iter().find(|a| a.name == "Roof").unwrap().id;

    let march = session.month_stats(garden, d(2024, 3, 1));
    assert_eq!(march.billed_nights, 6);
    assert_eq!(march.revenue, 600.0);
    assert_eq!(march.expenses, 150.0);
    assert_eq!(march.net, 450.0);
    assert_eq!(session.resolve_cell(garden, d(2024, 3, 12)).label, "Lina");

    assert_eq!(session.resolve_cell(roof, d(2024, 3, 3)).status, CellStatus::Occupied);
    assert_eq!(session.resolve_cell(roof, d(2024, 3, 1)).status, CellStatus::Reserved);
    assert_eq!(session.resolve_cell(roof, d(2024, 3, 6)), DayCell::free());

    let totals = session.project_totals(d(2024, 3, 1));
    // Garden 6 occupied; Roof 3 reserved + 2 occupied
    assert_eq!(totals.occupied, 8);
    assert_eq!(totals.reserved, 3);
    assert!((totals.occupancy_rate - 11.0 / 62.0).abs() < 1e-12);
}

#[tokio::test]
async fn account_survives_restart() {
    let dir = fresh_dir();
    let apartment;
    {
        let accounts = AccountManager::new(dir.clone(), 1000);
        let store = accounts.get_or_open("owner").unwrap();
        let migrator = Migrator::new(store.clone(), Arc::new(MemoryLegacyStore::new()), "owner");
        assert_eq!(migrator.migrate_if_empty().await, MigrationOutcome::Seeded);

        let session = Session::open(store, "owner", Lang::En);
        apartment = session.apartments()[0].id;
        session
            .create_reservation(apartment, {
                let mut r = ReservationDraft::new(d(2024, 5, 1), d(2024, 5, 3), ReservationStatus::Occupied);
                r.price_per_day = Some(45.0);
                r
            })
            .await
            .unwrap();
        session.close();
    }

    let accounts = AccountManager::new(dir, 1000);
    let store = accounts.get_or_open("owner").unwrap();
    // Already has apartments: the migration writes nothing this time
    let migrator = Migrator::new(store.clone(), Arc::new(legacy_fixture()), "owner");
    assert_eq!(migrator.migrate_if_empty().await, MigrationOutcome::RemoteNotEmpty);

    let session = Session::open(store.clone(), "owner", Lang::En);
    let names: Vec<String> = session.apartments().iter().map(|a| a.name.clone()).collect();
    assert_eq!(names, vec!["Apt 1", "Apt 2"]);
    assert_eq!(session.reservations(apartment).len(), 1);
    assert_eq!(session.month_stats(apartment, d(2024, 5, 1)).revenue, 135.0);
    assert_eq!(store.document_count(&CollectionPath::apartments("owner")), 2);
}

#[tokio::test]
async fn two_sessions_see_each_others_writes() {
    let store = Arc::new(MemoryStore::new());
    let phone = Session::open(store.clone(), "owner", Lang::En);
    let tablet = Session::open(store.clone(), "owner", Lang::Ar);

    let apt = phone
        .create_apartment(ApartmentDraft {
            name: "Shared".into(),
            price_per_day: None,
        })
        .await
        .unwrap();
    assert_eq!(tablet.apartments().len(), 1);

    let mut changes = tablet.changes();
    tablet
        .create_reservation(apt, ReservationDraft::new(d(2024, 6, 1), d(2024, 6, 2), ReservationStatus::Reserved))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), changes.changed())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(phone.resolve_cell(apt, d(2024, 6, 1)).label, "Reserved");
    assert_eq!(tablet.resolve_cell(apt, d(2024, 6, 1)).label, "محجوز");

    phone.delete_apartment(apt).await.unwrap();
    assert!(tablet.apartments().is_empty());
    assert!(tablet.reservations(apt).is_empty());
    assert_eq!(tablet.subscription_count(), 1);
    assert_eq!(phone.subscription_count(), 1);
}

#[tokio::test]
async fn users_do_not_share_collections() {
    let store = Arc::new(MemoryStore::new());
    let alice = Session::open(store.clone(), "alice", Lang::En);
    let bob = Session::open(store.clone(), "bob", Lang::En);
    alice
        .create_apartment(ApartmentDraft {
            name: "Private".into(),
            price_per_day: None,
        })
        .await
        .unwrap();
    assert_eq!(alice.apartments().len(), 1);
    assert!(bob.apartments().is_empty());
}
