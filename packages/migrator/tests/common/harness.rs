//! Test harness for migration tests.
//!
//! In-memory tests build a [`TestDependencies`] around a fixture catalog and
//! call [`run_migration`] / [`run_step`]. MySQL tests use [`TestHarness`]:
//! one shared MySQL container, and a fresh table prefix per test so tests
//! never see each other's catalog.

use anyhow::{Context, Result};
use catalog_migrator::data_migrations::v3_0_0::RadicalMart300;
use catalog_migrator::db::MySqlDatabase;
use catalog_migrator::engine::{MigrationRunner, MigrationStep, RunReport, StepSummary};
use catalog_migrator::kernel::{BaseProgress, MigrationDeps, TestDependencies};
use sqlx::mysql::MySqlPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mysql::Mysql;
use tokio::sync::OnceCell;

use super::fixtures::{LEGACY_ROWS, LEGACY_SCHEMA};

/// Route engine logs to the test writer.
/// Run tests with: RUST_LOG=catalog_migrator=debug cargo test -- --nocapture
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// In-memory runs
// =============================================================================

/// Run the full 3.0.0 migration once.
pub async fn run_migration(test: &TestDependencies) -> catalog_migrator::Result<RunReport> {
    init_tracing();
    MigrationRunner::for_migration(&RadicalMart300)
        .run(&test.deps())
        .await
}

/// Run a single step.
pub async fn run_step(
    step: &dyn MigrationStep,
    test: &TestDependencies,
) -> catalog_migrator::Result<StepSummary> {
    init_tracing();
    step.run(&test.deps()).await
}

// =============================================================================
// MySQL
// =============================================================================

/// Shared MySQL container, started on first use.
struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _mysql: ContainerAsync<Mysql>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

static NEXT_PREFIX: AtomicUsize = AtomicUsize::new(1);

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        init_tracing();

        let mysql = Mysql::default()
            .start()
            .await
            .context("Failed to start MySQL container")?;

        let host = mysql.get_host().await?;
        let port = mysql.get_host_port_ipv4(3306).await?;
        let db_url = format!("mysql://root@{}:{}/test", host, port);

        Ok(Self {
            db_url,
            _mysql: mysql,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// MySQL-backed harness with a private table prefix.
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     ctx.install_legacy_catalog().await.unwrap();
///     // ... run steps against ctx.deps(...)
/// }
/// ```
pub struct TestHarness {
    pub db: Arc<MySqlDatabase>,
    /// Raw pool for assertions
    pub pool: MySqlPool,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;
        let prefix = format!("t{}_", NEXT_PREFIX.fetch_add(1, Ordering::SeqCst));

        let db = MySqlDatabase::connect(&infra.db_url, &prefix)
            .await
            .context("Failed to connect migrator to test database")?;
        let pool = MySqlPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;

        Ok(Self {
            db: Arc::new(db),
            pool,
        })
    }

    /// Table name with the placeholder replaced.
    pub fn table(&self, name: &str) -> String {
        name.replace("#__", self.db.prefix())
    }

    /// Create the 2.x tables under this harness' prefix and seed them.
    pub async fn install_legacy_catalog(&self) -> Result<()> {
        for statement in LEGACY_SCHEMA.iter().chain(LEGACY_ROWS) {
            sqlx::query(&self.table(statement))
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to install fixture: {}", statement))?;
        }
        Ok(())
    }

    pub fn deps(&self, progress: Arc<dyn BaseProgress>) -> MigrationDeps {
        MigrationDeps::new(self.db.clone(), progress).with_page_size(2)
    }
}
