use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

/// Sample applications shipped with the demo dataset, one per workflow stage.
const SEED_APPLICATIONS: &[SeedApplicationContract] = &[
    SeedApplicationContract {
        id: "app-seed-fra-001",
        application_number: "eVisa-FRA-26-00001",
        status: "ISSUED",
        expects_visa: true,
        expects_payment: true,
        description: "France, visa issued and paid",
    },
    SeedApplicationContract {
        id: "app-seed-usa-002",
        application_number: "eVisa-USA-26-00002",
        status: "UNDER_REVIEW",
        expects_visa: false,
        expects_payment: true,
        description: "United States, specific visa awaiting review",
    },
    SeedApplicationContract {
        id: "app-seed-bel-003",
        application_number: "eVisa-BEL-26-00003",
        status: "DRAFT",
        expects_visa: false,
        expects_payment: false,
        description: "Belgium, draft not yet submitted",
    },
];

const SEED_ADMIN_ID: &str = "user-admin-001";
const SEED_VISA_IDS: &[&str] = &["visa-seed-fra-001"];
const SEED_PAYMENT_IDS: &[&str] = &["pay-seed-fra-001", "pay-seed-usa-002"];
const SEED_AUDIT_IDS: &[&str] = &["audit-seed-fra-001", "audit-seed-usa-002"];

/// Demo dataset: the default administrator plus three applications.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let applications_seeded = SEED_APPLICATIONS
            .iter()
            .map(|seed| SeededApplication {
                application_number: seed.application_number,
                status: seed.status,
                description: seed.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { applications_seeded })
    }

    /// Checks every seeded row is present and the counters have caught up with them.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let admin_exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admin_users WHERE id = ?1)")
                .bind(SEED_ADMIN_ID)
                .fetch_one(pool)
                .await?;
        checks.push(("admin-user", admin_exists == 1));

        for seed in SEED_APPLICATIONS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM applications WHERE id = ?1 AND application_number = ?2 AND status = ?3)",
            )
            .bind(seed.id)
            .bind(seed.application_number)
            .bind(seed.status)
            .fetch_one(pool)
            .await?;
            checks.push((seed.application_number, present == 1));

            let visa_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM visas WHERE application_id = ?1")
                    .bind(seed.id)
                    .fetch_one(pool)
                    .await?;
            checks.push((seed.visa_label(), visa_count == i64::from(seed.expects_visa)));

            let payment_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM payments WHERE application_id = ?1")
                    .bind(seed.id)
                    .fetch_one(pool)
                    .await?;
            checks.push((seed.payment_label(), payment_count == i64::from(seed.expects_payment)));
        }

        let audit_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM audit_logs WHERE id IN {}",
            sql_array_from_ids(SEED_AUDIT_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("audit-logs", audit_count == SEED_AUDIT_IDS.len() as i64));

        let application_counter: i64 = sqlx::query_scalar(
            "SELECT value FROM sequence_counter WHERE name = 'application'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("application-counter", application_counter >= SEED_APPLICATIONS.len() as i64));

        let visa_counter: i64 =
            sqlx::query_scalar("SELECT value FROM sequence_counter WHERE name = 'visa'")
                .fetch_one(pool)
                .await?;
        checks.push(("visa-counter", visa_counter >= SEED_VISA_IDS.len() as i64));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows. Counters are left where they are.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let application_ids = SEED_APPLICATIONS.iter().map(|seed| seed.id).collect::<Vec<_>>();
        let quoted_applications = sql_array_from_ids(&application_ids);

        sqlx::query(&format!("DELETE FROM audit_logs WHERE id IN {}", sql_array_from_ids(SEED_AUDIT_IDS)))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM payments WHERE id IN {}", sql_array_from_ids(SEED_PAYMENT_IDS)))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM visas WHERE id IN {}", sql_array_from_ids(SEED_VISA_IDS)))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM applications WHERE id IN {quoted_applications}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM admin_users WHERE id = ?1")
            .bind(SEED_ADMIN_ID)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedApplicationContract {
    id: &'static str,
    application_number: &'static str,
    status: &'static str,
    expects_visa: bool,
    expects_payment: bool,
    description: &'static str,
}

impl SeedApplicationContract {
    fn visa_label(&self) -> &'static str {
        match self.id {
            "app-seed-fra-001" => "visa-fra",
            "app-seed-usa-002" => "visa-usa",
            _ => "visa-bel",
        }
    }

    fn payment_label(&self) -> &'static str {
        match self.id {
            "app-seed-fra-001" => "payment-fra",
            "app-seed-usa-002" => "payment-usa",
            _ => "payment-bel",
        }
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub applications_seeded: Vec<SeededApplication>,
}

#[derive(Debug)]
pub struct SeededApplication {
    pub application_number: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
