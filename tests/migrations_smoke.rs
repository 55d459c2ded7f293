use sqlx::Row;

fn configured_database_url() -> Option<String> {
    // Load .env so DATABASE_URL / POSTGRES_* from .env are available.
    dotenvy::dotenv().ok();

    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            return Some(url);
        }
    }

    // Without an explicit opt-in there is no database to smoke-test against.
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
    if password.is_empty() {
        return None;
    }

    let server = std::env::var("POSTGRES_SERVER").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "examly".into());
    let db = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "examly_db".into());

    Some(format!("postgresql://{user}:{password}@{server}:{port}/{db}"))
}

#[tokio::test]
async fn migrations_apply_and_tables_exist() -> anyhow::Result<()> {
    let Some(database_url) = configured_database_url() else {
        eprintln!("skipping migrations smoke test: no database configured");
        return Ok(());
    };

    let pool =
        sqlx::postgres::PgPoolOptions::new().max_connections(1).connect(&database_url).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new("migrations")).await?;
    migrator.run(&pool).await?;

    let tables = [
        "users",
        "questions",
        "question_options",
        "exams",
        "exam_questions",
        "exam_attempts",
        "attempt_questions",
        "attempt_options",
    ];

    for table in tables {
        let row = sqlx::query("SELECT to_regclass($1)::text").bind(table).fetch_one(&pool).await?;
        let regclass: Option<String> = row.try_get(0)?;
        assert!(regclass.is_some(), "expected table {table} to exist after migrations");
    }

    Ok(())
}
