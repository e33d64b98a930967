use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{Duration as Days, NaiveDate};
use ulid::Ulid;

use homeday::calendar::build_range;
use homeday::locale::Lang;
use homeday::model::*;
use homeday::session::Session;
use homeday::store::{DocumentStore, MemoryStore};

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn base_day() -> Day {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn stay(i: usize) -> ReservationDraft {
    let start = base_day() + Days::days((i % 360) as i64);
    let status = if i % 3 == 0 {
        ReservationStatus::Occupied
    } else {
        ReservationStatus::Reserved
    };
    let mut draft = ReservationDraft::new(start, start + Days::days((i % 7) as i64), status);
    draft.price_per_day = Some(50.0 + (i % 5) as f64 * 10.0);
    draft
}

async fn setup(session: &Session, n: usize) -> Vec<DocId> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let id = session
            .create_apartment(ApartmentDraft {
                name: format!("Apt {i}"),
                price_per_day: Some(60.0),
            })
            .await
            .unwrap();
        ids.push(id);
    }
    println!("  created {} apartments", ids.len());
    ids
}

async fn phase1_sequential(session: &Session, apartment: DocId) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        session.create_reservation(apartment, stay(i)).await.unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} reservations in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency (snapshot delivery included)", &mut latencies);
}

async fn phase2_concurrent(session: Arc<Session>, apartments: &[DocId]) {
    let n_per_task = 200;
    let start = Instant::now();

    let mut handles = Vec::new();
    for (t, &apt) in apartments.iter().enumerate() {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..n_per_task {
                session.create_reservation(apt, stay(t * n_per_task + i)).await.unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = apartments.len() * n_per_task;
    println!(
        "  {} tasks × {n_per_task} = {total} reservations in {:.2}s = {:.0} ops/sec",
        apartments.len(),
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load(session: Arc<Session>, apartment: DocId) {
    let stop = Arc::new(AtomicBool::new(false));
    let writer = {
        let session = session.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut i = 0;
            while !stop.load(Ordering::Relaxed) {
                session.create_reservation(apartment, stay(i)).await.unwrap();
                i += 1;
            }
            i
        })
    };

    let range = build_range(base_day(), true);
    let mut rows = Vec::new();
    let mut totals = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        let t = Instant::now();
        let row = session.resolve_row(apartment, &range.days);
        rows.push(t.elapsed());
        std::hint::black_box(row);

        let t = Instant::now();
        let month = session.project_totals(base_day() + Days::days(45));
        totals.push(t.elapsed());
        std::hint::black_box(month);
        tokio::task::yield_now().await;
    }

    stop.store(true, Ordering::Relaxed);
    let writes = writer.await.unwrap_or(0);
    println!("  {writes} concurrent writes, {} reservations mirrored", session.reservations(apartment).len());
    print_latency(&format!("resolve_row ({} days)", range.days.len()), &mut rows);
    print_latency("project_totals", &mut totals);
}

async fn phase4_subscription_churn(store: Arc<MemoryStore>) {
    let session = Session::open(store.clone(), format!("churn_{}", Ulid::new()), Lang::En);
    let rounds = 500;
    let start = Instant::now();
    for i in 0..rounds {
        let id = session
            .create_apartment(ApartmentDraft {
                name: format!("Churn {i}"),
                price_per_day: None,
            })
            .await
            .unwrap();
        session.delete_apartment(id).await.unwrap();
    }
    let elapsed = start.elapsed();
    println!(
        "  {rounds} add/remove rounds in {:.2}s, {} subscriptions left, {} store listeners",
        elapsed.as_secs_f64(),
        session.subscription_count(),
        store.total_listeners()
    );
    session.close();
}

#[tokio::main]
async fn main() {
    let durable = std::env::var("HOMEDAY_BENCH_WAL").is_ok();
    let store = if durable {
        let dir = std::env::temp_dir().join(format!("homeday_bench_{}", Ulid::new()));
        std::fs::create_dir_all(&dir).unwrap();
        Arc::new(MemoryStore::open(dir.join("bench.wal")).unwrap())
    } else {
        Arc::new(MemoryStore::new())
    };

    println!("=== homeday stress benchmark ===");
    println!("store: {}\n", if store.is_durable() { "WAL" } else { "volatile" });

    // Each phase uses its own user to avoid interference
    let shared: Arc<dyn DocumentStore> = store.clone();

    println!("[setup]");
    let session = Session::open(shared.clone(), "bench_seq", Lang::En);
    let apartments = setup(&session, 1).await;

    println!("\n[phase 1] sequential write throughput");
    phase1_sequential(&session, apartments[0]).await;

    println!("\n[phase 2] concurrent write throughput");
    let concurrent = Session::open(shared.clone(), "bench_conc", Lang::En);
    let apartments = setup(&concurrent, 10).await;
    phase2_concurrent(concurrent, &apartments).await;

    println!("\n[phase 3] read latency under write load");
    let loaded = Session::open(shared, "bench_read", Lang::En);
    let apartments = setup(&loaded, 5).await;
    phase3_read_under_load(loaded, apartments[0]).await;

    println!("\n[phase 4] subscription churn");
    phase4_subscription_churn(store).await;

    println!("\n=== benchmark complete ===");
}
