//! Walk through the console pages against an in-memory store

use wardview::prelude::*;
use wardview::telemetry::init_tracing;

fn seed(store: &InMemoryDocumentStore) {
    for (id, date, status) in [
        ("a1", "2024-08-12", "Present"),
        ("a2", "2025-06-03", "Present"),
        ("a3", "2025-06-10", "Absent"),
        ("a4", "2025-07-01", "yes"),
    ] {
        store.insert("attendance", id, json!({"date": date, "status": status}));
    }

    store.insert(
        "alerts",
        "d1",
        json!({
            "date": {"seconds": 1748962200, "nanoseconds": 0},
            "area": "Market",
            "location": {"latitude": 19.07, "longitude": 72.87},
            "locationDescription": "Behind the vegetable stalls",
        }),
    );
    store.insert(
        "alerts",
        "d2",
        json!({
            "date": {"seconds": 1751356800, "nanoseconds": 0},
            "area": "Riverside",
            "status": "Resolved",
            "location": {"latitude": 19.11, "longitude": 72.91},
        }),
    );

    store.insert("collectors", "c1", json!({"fullName": "Ravi Kumar", "area": "North"}));
    store.insert("collectors", "c2", json!({"fullName": "Meena Joshi", "area": "South"}));
    store.insert(
        "garbage_requests",
        "r1",
        json!({"pickupDate": "2025-06-05", "address": "12 Lake Rd"}),
    );

    store.insert("feedback", "f1", json!({"totalRating": 4}));
    store.insert("feedback", "f2", json!({"totalRating": 5}));
    store.insert("users", "u1", json!({"name": "Kiran", "area": "North Ward"}));
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    println!("🚮 wardview console walkthrough\n");

    let store = InMemoryDocumentStore::new();
    seed(&store);
    let console = Console::new(Arc::new(store), ConsoleConfig::default_config());

    // Attendance
    let attendance = console.attendance()?;
    attendance.load().await?;
    let summary = attendance.summary();
    println!("📅 Attendance: {}% present ({} of {})", summary.presence_rate, summary.present, summary.total);
    for month in &summary.months {
        println!("   {:<16} {:>5}%  ({}/{})", month.month, month.rate, month.present, month.total);
    }

    // Dumps
    let dumps = console.dumps()?;
    dumps.load().await?;
    println!("\n🗺️  Dump hotspots:");
    for bucket in dumps.hotspots() {
        println!("   {:<12} {}", bucket.key, bucket.count);
    }
    dumps.resolve("d1").await?;
    let map = dumps.map_view();
    println!(
        "   map centre ({:.4}, {:.4}) zoom {} with {} markers, {} pending",
        map.center.latitude,
        map.center.longitude,
        map.zoom,
        map.markers.len(),
        map.markers.iter().filter(|m| m.pending).count()
    );

    // Pickup requests
    let pickups = console.pickups()?;
    pickups.load().await?;
    println!("\n🚛 Service areas: {:?}", pickups.collector_areas().await?);
    let north = pickups.collectors_in("North").await?;
    if let Some(collector) = north.first() {
        pickups.assign("r1", collector, "North").await?;
    }
    for request in pickups.filtered(StatusFilter::Assigned) {
        println!(
            "   {} → {}",
            request.id,
            request.get_str("assignedCollectorName").unwrap_or("-")
        );
    }

    // Rejected before any remote call
    match dumps.set_status("d1", "   ").await {
        Err(e) => println!("\n⚠️  {} ({})", e.user_message(), e.error_code()),
        Ok(()) => println!("\n⚠️  blank status was accepted"),
    }

    // Dashboard
    let dashboard = console.dashboard()?;
    let totals = dashboard.load().await?;
    println!(
        "\n📊 {} users, {} collectors, {} attendance entries, average rating {}",
        totals.users, totals.collectors, totals.attendance_entries, totals.average_rating
    );

    Ok(())
}
