use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::auth::roles;

pub type DbPool = Pool<SqliteConnectionManager>;

pub const MIGRATIONS: &str = include_str!("schema.sql");

pub fn init_pool(database_url: &str) -> DbPool {
    let manager = SqliteConnectionManager::file(database_url).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(())
    });
    Pool::builder()
        .max_size(8)
        .build(manager)
        .expect("Failed to create DB pool")
}

pub fn run_migrations(pool: &DbPool) {
    let conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.execute_batch(MIGRATIONS)
        .expect("Failed to run migrations");
    log::info!("Database migrations complete");
}

const DEFAULT_SETTINGS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "app.name",
        "Application name",
        "ThesisFlow",
        "Shown in the header and page titles",
        "text",
    ),
    (
        "audit.retention_days",
        "Audit retention (days)",
        "365",
        "Audit entries older than this are deleted at startup",
        "number",
    ),
];

/// Seed default settings and the initial admin account if the database is empty.
pub fn seed(pool: &DbPool, admin_password_hash: &str) {
    let conn = pool.get().expect("Failed to get DB connection for seeding");

    for (i, (name, label, value, description, setting_type)) in DEFAULT_SETTINGS.iter().enumerate() {
        conn.execute(
            "INSERT INTO settings (name, label, value, description, setting_type, sort_order) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(name) DO NOTHING",
            params![name, label, value, description, setting_type, i as i64],
        )
        .expect("Failed to seed settings");
    }

    let user_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap_or(0);
    if user_count > 0 {
        log::info!("Database already seeded ({user_count} users), skipping admin seed");
        return;
    }

    conn.execute(
        "INSERT INTO users (username, password, email, display_name, role) \
         VALUES ('admin', ?1, 'admin@localhost', 'Administrator', ?2)",
        params![admin_password_hash, roles::ADMIN],
    )
    .expect("Failed to seed admin user");
    log::info!("Seeded initial admin account");
}
