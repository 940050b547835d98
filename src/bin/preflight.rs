use market_ledger::infra::telemetry::init_tracing;
use market_ledger::storage::schema;
use market_ledger::{Config, MarketStore, PgMarketStore};
use sqlx::postgres::PgPoolOptions;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--apply-schema]\n\
         \n\
         Requires env vars:\n\
           DATABASE_URL\n\
         Optional:\n\
           BIND_ADDR, DB_MAX_CONNECTIONS, SESSION_HEADER, LINK_MODE, DAILY_REWARD, SPINS_PER_DAY\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let apply_schema = args.iter().any(|a| a == "--apply-schema");

    // Force-read config (nice error messages if missing)
    let config = Config::from_env()?;
    println!("> Preflight:");
    println!("  BIND_ADDR={}", config.bind_addr);
    println!("  SESSION_HEADER={}", config.session_header);
    println!("  LINK_MODE={}", config.link_issuer.mode());
    println!("  DAILY_REWARD={}", config.daily_reward);
    println!("  SPINS_PER_DAY={}", config.spins_per_day);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to DATABASE_URL: {}", e))?;
    let store = PgMarketStore::new(pool.clone());
    store.ping().await?;
    println!("  Database reachable.");

    if apply_schema {
        schema::ensure_schema(&pool).await?;
        println!("  Schema applied.");
    }

    let missing = schema::missing_tables(&pool).await?;
    if missing.is_empty() {
        println!("  All {} tables present.", schema::TABLES.len());
    } else {
        eprintln!("  Missing tables: {}", missing.join(", "));
        eprintln!("  Run with --apply-schema, or start api_server (it applies the schema on boot).");
        std::process::exit(1);
    }

    println!("> Preflight OK.");
    Ok(())
}
