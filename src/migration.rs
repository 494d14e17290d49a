//! Database bootstrap: create the database when missing, then every table idempotently.
//! Statements run in dependency order (users before doctors before requests).

use crate::error::AppError;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(150) NOT NULL CONSTRAINT users_username_key UNIQUE,
        email VARCHAR(254) NOT NULL DEFAULT '',
        password_hash TEXT,
        is_staff BOOLEAN NOT NULL DEFAULT FALSE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_profiles (
        user_id BIGINT PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
        full_name VARCHAR(255),
        position VARCHAR(100),
        area VARCHAR(100),
        phone_number VARCHAR(20),
        location VARCHAR(200),
        last_login_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS doctors (
        user_id BIGINT PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
        full_name VARCHAR(255),
        specialty VARCHAR(100),
        medical_license VARCHAR(50) CONSTRAINT doctors_medical_license_key UNIQUE,
        phone_number VARCHAR(20)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auth_tokens (
        user_id BIGINT PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
        digest VARCHAR(64) NOT NULL CONSTRAINT auth_tokens_digest_key UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(200) NOT NULL,
        asset_id VARCHAR(50) NOT NULL CONSTRAINT assets_asset_id_key UNIQUE,
        asset_type VARCHAR(20) NOT NULL DEFAULT 'computer',
        description TEXT,
        status VARCHAR(50) NOT NULL DEFAULT 'Activo',
        connectivity BOOLEAN NOT NULL DEFAULT TRUE,
        antivirus_enabled BOOLEAN NOT NULL DEFAULT TRUE,
        purchase_date DATE,
        warranty_expiry_date DATE,
        contract_number VARCHAR(100),
        location VARCHAR(200),
        ip_address VARCHAR(45),
        mac_address VARCHAR(17),
        assigned_to VARCHAR(100)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS exam_categories (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL CONSTRAINT exam_categories_name_key UNIQUE,
        "order" INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS exam_items (
        id BIGSERIAL PRIMARY KEY,
        category_id BIGINT NOT NULL REFERENCES exam_categories (id) ON DELETE CASCADE,
        name VARCHAR(255) NOT NULL,
        code VARCHAR(20) NOT NULL CONSTRAINT exam_items_code_key UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS imaging_requests (
        id BIGSERIAL PRIMARY KEY,
        patient_name VARCHAR(255) NOT NULL,
        patient_rut VARCHAR(20) NOT NULL,
        patient_phone VARCHAR(20),
        patient_prevencion VARCHAR(100),
        request_date DATE NOT NULL DEFAULT CURRENT_DATE,
        doctor_id BIGINT REFERENCES doctors (user_id) ON DELETE SET NULL,
        diagnosis TEXT,
        observations TEXT,
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS imaging_request_exams (
        request_id BIGINT NOT NULL REFERENCES imaging_requests (id) ON DELETE CASCADE,
        exam_item_id BIGINT NOT NULL REFERENCES exam_items (id) ON DELETE CASCADE,
        PRIMARY KEY (request_id, exam_item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS imaging_request_history (
        history_id BIGSERIAL PRIMARY KEY,
        request_id BIGINT NOT NULL,
        history_type CHAR(1) NOT NULL,
        history_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        history_user_id BIGINT,
        snapshot JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS imaging_requests_doctor_idx ON imaging_requests (doctor_id)",
    "CREATE INDEX IF NOT EXISTS exam_items_category_idx ON exam_items (category_id)",
    "CREATE INDEX IF NOT EXISTS imaging_request_history_request_idx ON imaging_request_history (request_id)",
];

/// Create every table, constraint and index. Safe to run repeatedly.
pub async fn apply_migrations(pool: &PgPool) -> Result<(), AppError> {
    for ddl in SCHEMA {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::info!(statements = SCHEMA.len(), "schema up to date");
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "created database");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
