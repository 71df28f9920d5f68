use clap::Parser;
use fake::faker::company::en::CatchPhrase;
use fake::Fake;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;

use sojourn::{
    domain::{
        CreateBookingRequest, CreateListingRequest, CreateUserRequest, ConfirmOutcome, UserRole,
    },
    error::AppError,
    service::ServiceContext,
};

#[derive(Parser)]
#[command(name = "seed", about = "Populate the database with sample data")]
struct Args {
    /// Database to seed; falls back to DATABASE_URL, then sqlite:sojourn.db
    #[arg(long)]
    database_url: Option<String>,

    /// Number of users to create (listings and bookings scale with this)
    #[arg(long, default_value_t = 10)]
    total: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite:sojourn.db".to_string());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let ctx = ServiceContext::new(db_pool.clone());
    let mut rng = rand::thread_rng();

    // Users: the first one is an admin, the rest are regular hosts/guests.
    println!("👥 Creating {} users...", args.total);
    let mut users = Vec::with_capacity(args.total);
    for i in 0..args.total {
        let role = if i == 0 { UserRole::Admin } else { UserRole::Regular };
        let username = format!("traveler{:03}", i);
        let user = ctx
            .user_repo
            .create(CreateUserRequest {
                email: format!("{}@example.com", username),
                username,
                role,
            })
            .await?;
        users.push(user);
    }
    println!("  ✅ Created {} users (1 admin)", users.len());

    // Listings: two per user, priced uniformly in 100.00..=1000.99.
    println!("🏠 Creating {} listings...", args.total * 2);
    let mut listings = Vec::with_capacity(args.total * 2);
    for _ in 0..args.total * 2 {
        let host = &users[rng.gen_range(0..users.len())];
        let name: String = CatchPhrase().fake();
        let price_minor: i64 = rng.gen_range(10_000..=100_099);
        let listing = ctx
            .listing_repo
            .create(CreateListingRequest {
                host_id: host.id,
                name,
                description: "A lovely place to stay.".to_string(),
                price_per_night: Decimal::new(price_minor, 2),
            })
            .await?;
        listings.push(listing);
    }
    println!("  ✅ Created {} listings", listings.len());

    // Pending bookings: start within 15 days, 1 to 5 nights.
    println!("📅 Creating {} bookings...", args.total * 2);
    let today = chrono::Utc::now().date_naive();
    let mut bookings = Vec::with_capacity(args.total * 2);
    for _ in 0..args.total * 2 {
        let customer = &users[rng.gen_range(0..users.len())];
        let listing = &listings[rng.gen_range(0..listings.len())];
        let start = today + chrono::Duration::days(rng.gen_range(0..15));
        let end = start + chrono::Duration::days(rng.gen_range(1..=5));
        let booking = ctx
            .booking_service
            .create_booking(CreateBookingRequest {
                customer_id: customer.id,
                listing_id: listing.id,
                start_date: start,
                end_date: end,
            })
            .await?;
        bookings.push(booking);
    }
    println!("  ✅ Created {} pending bookings", bookings.len());

    // Confirm roughly a third through the ledger. Overlap losers stay
    // pending, which is exactly what production traffic produces.
    let mut confirmed = 0;
    let mut overlap_losers = 0;
    for booking in bookings.iter().take(bookings.len() / 3) {
        match ctx.booking_service.confirm_booking(booking.id).await {
            Ok(ConfirmOutcome::Confirmed(_)) => confirmed += 1,
            Ok(ConfirmOutcome::AlreadyConfirmed(_)) => {}
            Err(AppError::Overlap) => overlap_losers += 1,
            Err(e) => return Err(e.into()),
        }
    }
    println!(
        "  ✅ Confirmed {} bookings ({} lost the overlap race)",
        confirmed, overlap_losers
    );

    // Cancel a few of the remaining pending ones. No flow drives
    // cancellation yet, so this writes the status directly.
    let mut cancelled = 0;
    for booking in bookings.iter().rev().take(bookings.len() / 10) {
        let result = sqlx::query("UPDATE bookings SET status = 'CNC' WHERE id = ? AND status = 'PND'")
            .bind(booking.id.to_string())
            .execute(&db_pool)
            .await?;
        cancelled += result.rows_affected();
    }
    println!("  ✅ Cancelled {} bookings", cancelled);

    println!("\n✨ Database seeding complete!");
    println!("\n📝 Summary:");
    println!("  Users:    {} (admin: {})", users.len(), users[0].email);
    println!("  Listings: {}", listings.len());
    println!(
        "  Bookings: {} ({} confirmed, {} cancelled, rest pending)",
        bookings.len(),
        confirmed,
        cancelled
    );

    Ok(())
}
