use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ulid::Ulid;

use spotbook::error::ServiceError;
use spotbook::model::{Actor, Ms, Role};
use spotbook::seed;
use spotbook::service::BookingService;
use spotbook::store::{Database, Pool};
use spotbook::txn::TransactionFactory;

const HOUR: Ms = 3_600_000; // 1 hour in ms
const POOL_SIZE: usize = 32;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

struct Bench {
    db: Database,
    pool: Arc<Pool>,
    service: Arc<BookingService>,
    actors: Vec<Actor>,
    admin: Actor,
    spots: Vec<Ulid>,
}

async fn setup() -> Bench {
    let dir = std::env::temp_dir().join(format!("spotbook_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();

    let db = Database::open(&dir).unwrap();
    seed::seed_users(&db).await.unwrap();
    seed::seed_spots(&db, 10).await.unwrap();

    let (actors, admin, spots) = db
        .read(|t| {
            let actors: Vec<Actor> = t
                .users()
                .filter(|u| u.role == Role::Standard)
                .map(|u| u.actor())
                .collect();
            let admin = t
                .users()
                .find(|u| u.role == Role::Admin)
                .map(|u| u.actor())
                .unwrap();
            let spots: Vec<Ulid> = t.spots().map(|s| s.id).collect();
            (actors, admin, spots)
        })
        .await;

    println!("  seeded {} users, {} spots", actors.len() + 2, spots.len());

    let pool = Arc::new(Pool::new(db.clone(), POOL_SIZE));
    let factory = TransactionFactory::new(pool.clone());
    let service = Arc::new(BookingService::new(db.clone(), factory));

    Bench { db, pool, service, actors, admin, spots }
}

async fn phase1_sequential(b: &Bench) {
    let n = 2000;
    let actor = b.actors[0];
    let spot = b.spots[0];

    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let s = (i as i64) * HOUR;
        let t = Instant::now();
        b.service.create(&actor, spot, s, s + HOUR).await.unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("create latency", &mut latencies);
}

async fn phase2_concurrent(b: &Bench) {
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();

    for i in 0..n_tasks {
        let service = b.service.clone();
        let actor = b.actors[i % b.actors.len()];
        let spot = b.spots[i % b.spots.len()];

        handles.push(tokio::spawn(async move {
            // Window base keeps each task clear of phase 1's rows.
            for j in 0..n_per_task {
                let s = ((10_000 + j) as i64) * HOUR;
                service.create(&actor, spot, s, s + HOUR).await.unwrap();
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load(b: &Bench) {
    // Writer tasks: continuously add bookings in the background
    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for w in 0..5usize {
        let service = b.service.clone();
        let actor = b.actors[w % b.actors.len()];
        let spot = b.spots[w % b.spots.len()];
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let mut i = 0i64;
            while !stop.load(Ordering::Relaxed) {
                let s = (w as i64 * 100_000 + 50_000 + i) * HOUR;
                let _ = service.create(&actor, spot, s, s + HOUR).await;
                i += 1;
            }
        }));
    }

    // Reader tasks: admin listings while the writers churn
    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let service = b.service.clone();
        let admin = b.admin;
        reader_handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                service.find_all(&admin, 50, 0).await.unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("find_all latency", &mut all_latencies);
}

async fn phase4_contention_storm(b: &Bench) {
    let n_tasks = 50;
    let spot = b.spots[9];
    let base = 1_000_000 * HOUR;

    let wins = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();

    for i in 0..n_tasks {
        let service = b.service.clone();
        let actor = b.actors[i % b.actors.len()];
        let wins = wins.clone();
        let conflicts = conflicts.clone();
        handles.push(tokio::spawn(async move {
            match service.create(&actor, spot, base, base + HOUR).await {
                Ok(_) => {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
                Err(ServiceError::Conflict) => {
                    conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    println!(
        "  {n_tasks} racing creates for one window: {} won, {} conflicted in {:.2}s",
        wins.load(Ordering::Relaxed),
        conflicts.load(Ordering::Relaxed),
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    println!("=== spotbook stress benchmark ===\n");

    println!("[setup]");
    let b = setup().await;

    println!("\n[phase 1] sequential create throughput");
    phase1_sequential(&b).await;

    println!("\n[phase 2] concurrent create throughput");
    phase2_concurrent(&b).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(&b).await;

    println!("\n[phase 4] contention storm");
    phase4_contention_storm(&b).await;

    let total = b.db.read(|t| t.booking_count()).await;
    println!("\n  bookings stored: {total}, pool idle: {}", b.pool.available());
    println!("=== benchmark complete ===");
}
