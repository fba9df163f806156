//! Shared PostgreSQL and plan fixtures for nutricoach integration tests.
//!
//! The server is either an external instance named by
//! `NUTRICOACH_TEST_PG_URL` or a testcontainers Postgres started once per
//! test binary. Every [`TestDb`] is a fresh, migrated database inside it.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use nutricoach_db::models::{PlanStatus, PlanWithMeals};
use nutricoach_db::pool;
use nutricoach_db::queries::foods::{self, NewFood};
use nutricoach_db::queries::guidelines::{self, NewGuideline};
use nutricoach_db::queries::meals::{self, NewMeal};
use nutricoach_db::queries::plans::{self, MacroTotals, NewPlan};

struct SharedPg {
    base_url: String,
    /// Keeps the container alive; `None` for an external server.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("NUTRICOACH_TEST_PG_URL") {
        return SharedPg {
            base_url: url.trim_end_matches('/').to_owned(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

async fn maintenance_pool() -> PgPool {
    let shared = SHARED_PG.get_or_init(init_shared_pg).await;
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&format!("{}/postgres", shared.base_url))
        .await
        .expect("failed to connect to maintenance database")
}

/// A uniquely named, migrated database. Call [`TestDb::cleanup`] at the end of
/// the test.
pub struct TestDb {
    pub pool: PgPool,
    pub name: String,
    /// Connection URL of the database, for tests that spawn the binary.
    pub url: String,
}

impl TestDb {
    /// Create a fresh database and apply the embedded migrations.
    pub async fn create() -> Self {
        let maint = maintenance_pool().await;
        let name = format!("nutricoach_test_{}", Uuid::new_v4().simple());
        maint
            .execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .unwrap_or_else(|e| panic!("failed to create temp database {name}: {e}"));
        maint.close().await;

        let base_url = &SHARED_PG.get().expect("shared pg initialized").base_url;
        let url = format!("{base_url}/{name}");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .unwrap_or_else(|e| panic!("failed to connect to temp database {name}: {e}"));

        pool::run_migrations(&pool)
            .await
            .expect("migrations should succeed");

        Self { pool, name, url }
    }

    /// Close the pool and drop the database.
    pub async fn cleanup(self) {
        self.pool.close().await;

        let maint = maintenance_pool().await;
        let terminate = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = '{}' AND pid <> pg_backend_pid()",
            self.name
        );
        let _ = maint.execute(terminate.as_str()).await;
        let _ = maint
            .execute(format!("DROP DATABASE IF EXISTS {}", self.name).as_str())
            .await;
        maint.close().await;
    }
}

/// Insert the reference plan used across tests:
///
/// ```text
/// Café da Manhã   -> Pão integral 2 fatia, Ovo mexido 2 unidade
/// Almoço          -> Arroz branco 120 g, Feijão carioca 80 g, Frango grelhado 150 g
/// Lanche Tarde    -> Iogurte natural 170 g, Banana prata 1 unidade
/// ```
///
/// plus one guideline. Returns the fully joined plan.
pub async fn seed_plan(pool: &PgPool, patient_id: Uuid, status: PlanStatus) -> PlanWithMeals {
    let mut tx = pool.begin().await.expect("begin");
    let plan = plans::insert_plan(
        &mut *tx,
        &NewPlan {
            patient_id,
            name: "Plano Base".into(),
            status,
            totals: MacroTotals {
                calories: Some(1850.0),
                protein: Some(130.0),
                carbs: Some(200.0),
                fats: Some(55.0),
            },
            notes: None,
        },
    )
    .await
    .expect("insert plan");

    let layout: [(&str, &str, Option<&str>, &[(&str, f64, &str)]); 3] = [
        (
            "Café da Manhã",
            "breakfast",
            Some("07:00"),
            &[("Pão integral", 2.0, "fatia"), ("Ovo mexido", 2.0, "unidade")],
        ),
        (
            "Almoço",
            "lunch",
            Some("12:30"),
            &[
                ("Arroz branco", 120.0, "g"),
                ("Feijão carioca", 80.0, "g"),
                ("Frango grelhado", 150.0, "g"),
            ],
        ),
        (
            "Lanche Tarde",
            "snack",
            None,
            &[("Iogurte natural", 170.0, "g"), ("Banana prata", 1.0, "unidade")],
        ),
    ];

    for (order, (name, kind, time, items)) in layout.iter().enumerate() {
        let meal = meals::insert_meal(
            &mut *tx,
            &NewMeal {
                plan_id: plan.id,
                meal_name: (*name).into(),
                meal_type: Some((*kind).into()),
                meal_order: order as i32,
                suggested_time: time.map(str::to_owned),
                instructions: Some(format!("Instruções para {name}")),
                ..NewMeal::default()
            },
        )
        .await
        .expect("insert meal");

        for (item_order, (food, quantity, unit)) in items.iter().enumerate() {
            foods::insert_food(
                &mut *tx,
                &NewFood {
                    meal_id: meal.id,
                    food_name: (*food).into(),
                    quantity: *quantity,
                    unit: (*unit).into(),
                    item_order: item_order as i32,
                    ..NewFood::default()
                },
            )
            .await
            .expect("insert food");
        }
    }

    guidelines::insert_guideline(
        &mut *tx,
        &NewGuideline {
            plan_id: plan.id,
            guideline_type: "hydration".into(),
            title: "Água".into(),
            content: "Beber 35 ml por kg de peso ao dia".into(),
            priority: 1,
        },
    )
    .await
    .expect("insert guideline");

    tx.commit().await.expect("commit");

    let mut conn = pool.acquire().await.expect("acquire");
    plans::get_plan_with_meals(&mut conn, plan.id)
        .await
        .expect("load plan")
        .expect("plan exists")
}
