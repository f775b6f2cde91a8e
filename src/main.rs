use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use tasktrack_api::config::{
    DEFAULT_LISTEN, DEFAULT_MAX_BODY_BYTES, DEFAULT_POMODORO_MINUTES, DEFAULT_TOKEN_TTL_SECS,
};
use tasktrack_api::{ApiConfig, AppState, ServerError};
use tasktrack_db::Database;
use tracing_subscriber::EnvFilter;

/// Tasktrack - task, project and time tracking server
#[derive(Parser, Debug)]
#[command(name = "tasktrack")]
#[command(version)]
#[command(about = "Task, project and time tracking server", long_about = None)]
struct Args {
    /// Path to the database directory
    #[arg(long, env = "TASKTRACK_DB_PATH")]
    db: Option<PathBuf>,

    /// Keep everything in memory; nothing is persisted. Overrides --db
    #[arg(long)]
    memory: bool,

    /// Address to listen on
    #[arg(long, env = "TASKTRACK_LISTEN", default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,

    /// Secret used to sign access tokens (at least 16 bytes)
    #[arg(long, env = "TASKTRACK_JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "TASKTRACK_TOKEN_TTL", default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    token_ttl: u64,

    /// Minutes a pomodoro timer must run to count as completed
    #[arg(long, env = "TASKTRACK_POMODORO_MINUTES", default_value_t = DEFAULT_POMODORO_MINUTES)]
    pomodoro_minutes: u32,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

impl Args {
    fn config(&self) -> ApiConfig {
        ApiConfig {
            listen: self.listen,
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_secs: self.token_ttl,
            pomodoro_minutes: self.pomodoro_minutes,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Initialize logging from `RUST_LOG`, defaulting to `info`.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let args = Args::parse();
    if let Err(e) = run(&args).await {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

/// Open the store selected by the arguments and apply the schema.
async fn open_database(args: &Args) -> Result<Database, ServerError> {
    let db = if args.memory {
        Database::connect_memory().await?
    } else {
        let path = args.db.clone().unwrap_or_else(Database::default_path);
        Database::connect(&path).await?
    };
    db.init().await?;
    Ok(db)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn run(args: &Args) -> Result<(), ServerError> {
    let config = args.config();
    config.validate()?;

    let db = open_database(args).await?;
    let listener = tasktrack_api::bind(config.listen).await?;
    let state = AppState::new(db, config);
    tasktrack_api::serve(listener, state, shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const SECRET: &str = "0123456789abcdef0123";

    fn clear_env() {
        for key in [
            "TASKTRACK_DB_PATH",
            "TASKTRACK_LISTEN",
            "TASKTRACK_JWT_SECRET",
            "TASKTRACK_TOKEN_TTL",
            "TASKTRACK_POMODORO_MINUTES",
        ] {
            // SAFETY: env-mutating tests are serialized with #[serial]
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_args_defaults() {
        clear_env();
        let args = Args::try_parse_from(["tasktrack", "--jwt-secret", SECRET]).unwrap();
        assert!(args.db.is_none());
        assert!(!args.memory);
        assert_eq!(args.listen.to_string(), DEFAULT_LISTEN);
        assert_eq!(args.token_ttl, DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(args.pomodoro_minutes, DEFAULT_POMODORO_MINUTES);
        assert_eq!(args.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    #[serial]
    fn test_args_require_secret() {
        clear_env();
        assert!(Args::try_parse_from(["tasktrack"]).is_err());
    }

    #[test]
    #[serial]
    fn test_args_from_env() {
        clear_env();
        // SAFETY: env-mutating tests are serialized with #[serial]
        unsafe {
            env::set_var("TASKTRACK_JWT_SECRET", SECRET);
            env::set_var("TASKTRACK_LISTEN", "0.0.0.0:9000");
            env::set_var("TASKTRACK_POMODORO_MINUTES", "50");
            env::set_var("TASKTRACK_DB_PATH", "/tmp/tasktrack-env-db");
        }

        let args = Args::try_parse_from(["tasktrack"]).unwrap();
        assert_eq!(args.jwt_secret, SECRET);
        assert_eq!(args.listen.to_string(), "0.0.0.0:9000");
        assert_eq!(args.pomodoro_minutes, 50);
        assert_eq!(args.db, Some(PathBuf::from("/tmp/tasktrack-env-db")));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_flag_overrides_env() {
        clear_env();
        // SAFETY: env-mutating tests are serialized with #[serial]
        unsafe { env::set_var("TASKTRACK_TOKEN_TTL", "60") };

        let args = Args::try_parse_from([
            "tasktrack",
            "--jwt-secret",
            SECRET,
            "--token-ttl",
            "120",
        ])
        .unwrap();
        assert_eq!(args.token_ttl, 120);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_from_args() {
        clear_env();
        let args = Args::try_parse_from([
            "tasktrack",
            "--jwt-secret",
            SECRET,
            "--listen",
            "127.0.0.1:0",
            "--max-body-bytes",
            "1024",
        ])
        .unwrap();

        let config = args.config();
        assert_eq!(config.listen.port(), 0);
        assert_eq!(config.max_body_bytes, 1024);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    #[serial]
    async fn test_open_memory_database() {
        clear_env();
        let args = Args::try_parse_from(["tasktrack", "--jwt-secret", SECRET, "--memory"]).unwrap();

        let db = open_database(&args).await.unwrap();
        assert!(db.path().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_open_database_at_path() {
        clear_env();
        let temp_dir = env::temp_dir().join(format!(
            "tasktrack-main-test-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let args = Args::try_parse_from([
            "tasktrack",
            "--jwt-secret",
            SECRET,
            "--db",
            temp_dir.to_str().unwrap(),
        ])
        .unwrap();

        let db = open_database(&args).await.unwrap();
        assert_eq!(db.path(), Some(temp_dir.as_path()));

        drop(db);
        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[tokio::test]
    #[serial]
    async fn test_run_rejects_short_secret() {
        clear_env();
        let args = Args::try_parse_from(["tasktrack", "--jwt-secret", "short", "--memory"]).unwrap();

        let err = run(&args).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
