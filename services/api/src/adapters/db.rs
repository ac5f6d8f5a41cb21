//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Compound writes (redeeming an invitation, consuming an OTP, saving a profile)
//! run inside a single transaction so that the derived course set and the
//! single-use guarantees hold under concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use lms_core::domain::{
    AccountCredentials, NewAccount, NewProfile,
};
use lms_core::ports::OtpConsumption;
use lms_core::{
    Account, AccountId, AuthSession, Cohort, CohortId, Course, CourseBundle, CourseId,
    DatabaseService, Invitation, NewCohort, NewCourse, NewSpecialization, OtpCode, PortError,
    PortResult, Specialization, SpecializationId, UserProfile,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps driver errors onto the port vocabulary. Unique violations become
/// `Conflict`, dangling references become `NotFound`.
fn port_error(err: sqlx::Error) -> PortError {
    match &err {
        sqlx::Error::RowNotFound => PortError::NotFound("Row not found".to_string()),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            PortError::Conflict(db_err.message().to_string())
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            PortError::NotFound(db_err.message().to_string())
        }
        _ => PortError::Unexpected(err.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CohortRecord {
    id: i64,
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}
impl CohortRecord {
    fn to_domain(self) -> Cohort {
        Cohort {
            id: self.id,
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(FromRow)]
struct SpecializationRecord {
    id: i64,
    name: String,
    cohort_id: i64,
}
impl SpecializationRecord {
    fn to_domain(self) -> Specialization {
        Specialization {
            id: self.id,
            name: self.name,
            cohort_id: self.cohort_id,
        }
    }
}

#[derive(FromRow)]
struct CourseRecord {
    id: i64,
    title: String,
    description: String,
    provider: String,
    status: String,
    due_date: NaiveDate,
    materials: Json<Vec<serde_json::Value>>,
    cohort_id: i64,
    specialization_id: i64,
}
impl CourseRecord {
    fn to_domain(self) -> PortResult<Course> {
        Ok(Course {
            id: self.id,
            title: self.title,
            description: self.description,
            provider: self
                .provider
                .parse()
                .map_err(|e| PortError::Unexpected(format!("course {}: {}", self.id, e)))?,
            status: self
                .status
                .parse()
                .map_err(|e| PortError::Unexpected(format!("course {}: {}", self.id, e)))?,
            due_date: self.due_date,
            materials: self.materials.0,
            cohort_id: self.cohort_id,
            specialization_id: self.specialization_id,
        })
    }
}

const COURSE_COLUMNS: &str = "id, title, description, provider, status, due_date, materials, \
                              cohort_id, specialization_id";

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    username: String,
    email: String,
    is_active: bool,
    is_staff: bool,
}
impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.id,
            username: self.username,
            email: self.email,
            is_active: self.is_active,
            is_staff: self.is_staff,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
    is_active: bool,
}

#[derive(FromRow)]
struct ProfileRecord {
    account_id: Uuid,
    name: String,
    surname: String,
    email: String,
    preferred_name: Option<String>,
    physical_address: String,
    cohort_id: Option<i64>,
    specialization_id: Option<i64>,
}
impl ProfileRecord {
    fn to_domain(self, registered_courses: Vec<i64>) -> UserProfile {
        UserProfile {
            account_id: self.account_id,
            name: self.name,
            surname: self.surname,
            email: self.email,
            preferred_name: self.preferred_name,
            physical_address: self.physical_address,
            cohort_id: self.cohort_id,
            specialization_id: self.specialization_id,
            registered_courses: registered_courses.into_iter().collect(),
        }
    }
}

#[derive(FromRow)]
struct InvitationRecord {
    email: String,
    token: String,
    expires_at: DateTime<Utc>,
}
impl InvitationRecord {
    fn to_domain(self) -> Invitation {
        Invitation {
            email: self.email,
            token: self.token,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct OtpRecord {
    id: Uuid,
    email: String,
    code: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_used: bool,
}
impl OtpRecord {
    fn to_domain(self) -> OtpCode {
        OtpCode {
            id: self.id,
            email: self.email,
            code: self.code,
            created_at: self.created_at,
            expires_at: self.expires_at,
            is_used: self.is_used,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    account_id: Uuid,
    expires_at: DateTime<Utc>,
}

//=========================================================================================
// Connection-Level Helpers (usable inside a transaction)
//=========================================================================================

/// Rewrites the derived course set of one profile from its current pair.
///
/// Holds a share lock on the profile's specialization row until the caller
/// commits. `create_course` takes the same row `FOR UPDATE`, so a course insert
/// and a derivation on the same pair never run past each other under
/// READ COMMITTED.
async fn derive_courses(conn: &mut PgConnection, account_id: AccountId) -> PortResult<()> {
    sqlx::query(
        r#"
        SELECT s.id
        FROM user_profiles p
        JOIN specializations s ON s.id = p.specialization_id
        WHERE p.account_id = $1
        FOR SHARE OF s
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(port_error)?;

    sqlx::query("DELETE FROM profile_registered_courses WHERE account_id = $1")
        .bind(account_id)
        .execute(&mut *conn)
        .await
        .map_err(port_error)?;
    sqlx::query(
        r#"
        INSERT INTO profile_registered_courses (account_id, course_id)
        SELECT p.account_id, c.id
        FROM user_profiles p
        JOIN courses c
          ON c.cohort_id = p.cohort_id AND c.specialization_id = p.specialization_id
        WHERE p.account_id = $1
        "#,
    )
    .bind(account_id)
    .execute(&mut *conn)
    .await
    .map_err(port_error)?;
    Ok(())
}

async fn load_profile(conn: &mut PgConnection, account_id: AccountId) -> PortResult<UserProfile> {
    let record = sqlx::query_as::<_, ProfileRecord>(
        r#"
        SELECT account_id, name, surname, email, preferred_name, physical_address,
               cohort_id, specialization_id
        FROM user_profiles
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(port_error)?
    .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", account_id)))?;

    let course_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT course_id FROM profile_registered_courses WHERE account_id = $1 ORDER BY course_id",
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(port_error)?;

    Ok(record.to_domain(course_ids))
}

async fn insert_profile(conn: &mut PgConnection, profile: NewProfile) -> PortResult<UserProfile> {
    sqlx::query(
        r#"
        INSERT INTO user_profiles
            (account_id, name, surname, email, preferred_name, physical_address,
             cohort_id, specialization_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(profile.account_id)
    .bind(&profile.name)
    .bind(&profile.surname)
    .bind(&profile.email)
    .bind(&profile.preferred_name)
    .bind(&profile.physical_address)
    .bind(profile.cohort_id)
    .bind(profile.specialization_id)
    .execute(&mut *conn)
    .await
    .map_err(port_error)?;

    derive_courses(conn, profile.account_id).await?;
    load_profile(conn, profile.account_id).await
}

async fn insert_account(conn: &mut PgConnection, account: NewAccount) -> PortResult<Account> {
    let record = sqlx::query_as::<_, AccountRecord>(
        r#"
        INSERT INTO accounts (id, username, email, hashed_password, is_active, is_staff)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, username, email, is_active, is_staff
        "#,
    )
    .bind(account.id)
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.hashed_password)
    .bind(account.is_active)
    .bind(account.is_staff)
    .fetch_one(&mut *conn)
    .await
    .map_err(port_error)?;
    Ok(record.to_domain())
}

async fn bundle_course_ids(
    conn: &mut PgConnection,
    cohort_id: CohortId,
    specialization_id: SpecializationId,
) -> PortResult<Vec<i64>> {
    sqlx::query_scalar(
        r#"
        SELECT course_id FROM course_bundle_items
        WHERE cohort_id = $1 AND specialization_id = $2
        ORDER BY course_id
        "#,
    )
    .bind(cohort_id)
    .bind(specialization_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(port_error)
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Catalog ---

    async fn create_cohort(&self, cohort: NewCohort) -> PortResult<Cohort> {
        let record = sqlx::query_as::<_, CohortRecord>(
            r#"
            INSERT INTO cohorts (name, start_date, end_date)
            VALUES ($1, $2, $3)
            RETURNING id, name, start_date, end_date
            "#,
        )
        .bind(&cohort.name)
        .bind(cohort.start_date)
        .bind(cohort.end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn get_cohort(&self, cohort_id: CohortId) -> PortResult<Cohort> {
        sqlx::query_as::<_, CohortRecord>(
            "SELECT id, name, start_date, end_date FROM cohorts WHERE id = $1",
        )
        .bind(cohort_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(CohortRecord::to_domain)
        .ok_or_else(|| PortError::NotFound(format!("Cohort {} not found", cohort_id)))
    }

    async fn delete_cohort(&self, cohort_id: CohortId) -> PortResult<()> {
        // Specializations, courses, bundles and derived rows cascade; profile
        // references are nulled by their ON DELETE SET NULL foreign keys.
        let deleted = sqlx::query("DELETE FROM cohorts WHERE id = $1")
            .bind(cohort_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?
            .rows_affected();
        if deleted == 0 {
            return Err(PortError::NotFound(format!("Cohort {} not found", cohort_id)));
        }
        Ok(())
    }

    async fn create_specialization(
        &self,
        specialization: NewSpecialization,
    ) -> PortResult<Specialization> {
        let record = sqlx::query_as::<_, SpecializationRecord>(
            r#"
            INSERT INTO specializations (name, cohort_id)
            VALUES ($1, $2)
            RETURNING id, name, cohort_id
            "#,
        )
        .bind(&specialization.name)
        .bind(specialization.cohort_id)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn get_specialization(
        &self,
        specialization_id: SpecializationId,
    ) -> PortResult<Specialization> {
        sqlx::query_as::<_, SpecializationRecord>(
            "SELECT id, name, cohort_id FROM specializations WHERE id = $1",
        )
        .bind(specialization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(SpecializationRecord::to_domain)
        .ok_or_else(|| {
            PortError::NotFound(format!("Specialization {} not found", specialization_id))
        })
    }

    async fn create_course(&self, course: NewCourse) -> PortResult<Course> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        // Waits for in-flight derivations on this pair; see `derive_courses`.
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM specializations WHERE id = $1 FOR UPDATE")
                .bind(course.specialization_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(port_error)?;
        if locked.is_none() {
            return Err(PortError::NotFound(format!(
                "Specialization {} not found",
                course.specialization_id
            )));
        }

        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            r#"
            INSERT INTO courses
                (title, description, provider, status, due_date, materials,
                 cohort_id, specialization_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.provider.as_str())
        .bind(course.status.as_str())
        .bind(course.due_date)
        .bind(Json(&course.materials))
        .bind(course.cohort_id)
        .bind(course.specialization_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(port_error)?;

        sqlx::query(
            r#"
            INSERT INTO profile_registered_courses (account_id, course_id)
            SELECT account_id, $1
            FROM user_profiles
            WHERE cohort_id = $2 AND specialization_id = $3
            "#,
        )
        .bind(record.id)
        .bind(record.cohort_id)
        .bind(record.specialization_id)
        .execute(&mut *tx)
        .await
        .map_err(port_error)?;

        tx.commit().await.map_err(port_error)?;
        record.to_domain()
    }

    async fn courses_for_pair(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> PortResult<Vec<Course>> {
        sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses \
             WHERE cohort_id = $1 AND specialization_id = $2 ORDER BY id"
        ))
        .bind(cohort_id)
        .bind(specialization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?
        .into_iter()
        .map(CourseRecord::to_domain)
        .collect()
    }

    async fn get_courses(&self, course_ids: &[CourseId]) -> PortResult<Vec<Course>> {
        sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(course_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?
        .into_iter()
        .map(CourseRecord::to_domain)
        .collect()
    }

    // --- Course Bundles ---

    async fn replace_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
        course_ids: &[CourseId],
    ) -> PortResult<CourseBundle> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        sqlx::query(
            r#"
            INSERT INTO course_bundles (cohort_id, specialization_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(cohort_id)
        .bind(specialization_id)
        .execute(&mut *tx)
        .await
        .map_err(port_error)?;

        sqlx::query(
            "DELETE FROM course_bundle_items WHERE cohort_id = $1 AND specialization_id = $2",
        )
        .bind(cohort_id)
        .bind(specialization_id)
        .execute(&mut *tx)
        .await
        .map_err(port_error)?;

        sqlx::query(
            r#"
            INSERT INTO course_bundle_items (cohort_id, specialization_id, course_id)
            SELECT $1, $2, id FROM courses WHERE id = ANY($3)
            "#,
        )
        .bind(cohort_id)
        .bind(specialization_id)
        .bind(course_ids.to_vec())
        .execute(&mut *tx)
        .await
        .map_err(port_error)?;

        let ids = bundle_course_ids(&mut tx, cohort_id, specialization_id).await?;
        tx.commit().await.map_err(port_error)?;

        Ok(CourseBundle {
            cohort_id,
            specialization_id,
            course_ids: ids.into_iter().collect(),
        })
    }

    async fn get_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> PortResult<CourseBundle> {
        let mut conn = self.pool.acquire().await.map_err(port_error)?;
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT cohort_id FROM course_bundles WHERE cohort_id = $1 AND specialization_id = $2",
        )
        .bind(cohort_id)
        .bind(specialization_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(port_error)?;
        if exists.is_none() {
            return Err(PortError::NotFound(format!(
                "No course bundle for cohort {} / specialization {}",
                cohort_id, specialization_id
            )));
        }

        let ids = bundle_course_ids(&mut conn, cohort_id, specialization_id).await?;
        Ok(CourseBundle {
            cohort_id,
            specialization_id,
            course_ids: ids.into_iter().collect(),
        })
    }

    // --- Accounts ---

    async fn create_account(&self, account: NewAccount) -> PortResult<Account> {
        let mut conn = self.pool.acquire().await.map_err(port_error)?;
        insert_account(&mut conn, account).await
    }

    async fn get_account(&self, account_id: AccountId) -> PortResult<Account> {
        sqlx::query_as::<_, AccountRecord>(
            "SELECT id, username, email, is_active, is_staff FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(AccountRecord::to_domain)
        .ok_or_else(|| PortError::NotFound(format!("Account {} not found", account_id)))
    }

    async fn get_account_by_email(&self, email: &str) -> PortResult<Account> {
        sqlx::query_as::<_, AccountRecord>(
            "SELECT id, username, email, is_active, is_staff FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(AccountRecord::to_domain)
        .ok_or_else(|| PortError::NotFound(format!("Account {} not found", email)))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password, is_active FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .ok_or_else(|| PortError::NotFound(format!("Account {} not found", email)))?;

        Ok(AccountCredentials {
            account_id: record.id,
            email: record.email,
            hashed_password: record.hashed_password,
            is_active: record.is_active,
        })
    }

    // --- Profiles ---

    async fn get_profile(&self, account_id: AccountId) -> PortResult<UserProfile> {
        let mut conn = self.pool.acquire().await.map_err(port_error)?;
        load_profile(&mut conn, account_id).await
    }

    async fn create_profile(&self, profile: NewProfile) -> PortResult<UserProfile> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;
        let profile = insert_profile(&mut tx, profile).await?;
        tx.commit().await.map_err(port_error)?;
        Ok(profile)
    }

    async fn save_profile(&self, profile: &UserProfile) -> PortResult<UserProfile> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE user_profiles
            SET name = $2, surname = $3, preferred_name = $4, physical_address = $5,
                cohort_id = $6, specialization_id = $7
            WHERE account_id = $1
            "#,
        )
        .bind(profile.account_id)
        .bind(&profile.name)
        .bind(&profile.surname)
        .bind(&profile.preferred_name)
        .bind(&profile.physical_address)
        .bind(profile.cohort_id)
        .bind(profile.specialization_id)
        .execute(&mut *tx)
        .await
        .map_err(port_error)?
        .rows_affected();
        if updated == 0 {
            return Err(PortError::NotFound(format!(
                "Profile {} not found",
                profile.account_id
            )));
        }

        derive_courses(&mut tx, profile.account_id).await?;
        let saved = load_profile(&mut tx, profile.account_id).await?;
        tx.commit().await.map_err(port_error)?;
        Ok(saved)
    }

    // --- Invitations ---

    async fn upsert_invitation(&self, invitation: &Invitation) -> PortResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invitations (email, token, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email)
            DO UPDATE SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&invitation.email)
        .bind(&invitation.token)
        .bind(invitation.expires_at)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(())
    }

    async fn find_invitation_by_token(&self, token: &str) -> PortResult<Invitation> {
        sqlx::query_as::<_, InvitationRecord>(
            "SELECT email, token, expires_at FROM invitations WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(InvitationRecord::to_domain)
        .ok_or_else(|| PortError::NotFound("Invitation not found".to_string()))
    }

    async fn find_invitation_by_email(&self, email: &str) -> PortResult<Invitation> {
        sqlx::query_as::<_, InvitationRecord>(
            "SELECT email, token, expires_at FROM invitations WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(InvitationRecord::to_domain)
        .ok_or_else(|| PortError::NotFound("Invitation not found".to_string()))
    }

    async fn find_invitation(&self, token: &str, email: &str) -> PortResult<Invitation> {
        sqlx::query_as::<_, InvitationRecord>(
            "SELECT email, token, expires_at FROM invitations WHERE token = $1 AND email = $2",
        )
        .bind(token)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(InvitationRecord::to_domain)
        .ok_or_else(|| PortError::NotFound("Invitation not found".to_string()))
    }

    async fn delete_invitation(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM invitations WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn redeem_invitation(
        &self,
        token: &str,
        account: NewAccount,
        profile: NewProfile,
    ) -> PortResult<Account> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        // The row lock taken by DELETE serializes concurrent redemptions; the
        // loser sees zero affected rows once the winner commits.
        let consumed = sqlx::query("DELETE FROM invitations WHERE token = $1 AND email = $2")
            .bind(token)
            .bind(&account.email)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?
            .rows_affected();
        if consumed == 0 {
            return Err(PortError::NotFound("Invitation not found".to_string()));
        }

        let account = insert_account(&mut tx, account).await?;
        insert_profile(&mut tx, profile).await?;
        tx.commit().await.map_err(port_error)?;
        Ok(account)
    }

    // --- OTP Codes ---

    async fn create_otp(&self, otp: &OtpCode) -> PortResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (id, email, code, created_at, expires_at, is_used)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(otp.id)
        .bind(&otp.email)
        .bind(&otp.code)
        .bind(otp.created_at)
        .bind(otp.expires_at)
        .bind(otp.is_used)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(())
    }

    async fn find_unused_otp(&self, email: &str, code: &str) -> PortResult<OtpCode> {
        sqlx::query_as::<_, OtpRecord>(
            r#"
            SELECT id, email, code, created_at, expires_at, is_used
            FROM otp_codes
            WHERE email = $1 AND code = $2 AND NOT is_used
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(OtpRecord::to_domain)
        .ok_or_else(|| PortError::NotFound("OTP not found".to_string()))
    }

    async fn delete_otp(&self, otp_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM otp_codes WHERE id = $1")
            .bind(otp_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn consume_otp(&self, otp: &OtpCode) -> PortResult<OtpConsumption> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        let burnt = sqlx::query("UPDATE otp_codes SET is_used = TRUE WHERE id = $1 AND NOT is_used")
            .bind(otp.id)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?
            .rows_affected();
        if burnt == 0 {
            return Err(PortError::NotFound("OTP not found".to_string()));
        }

        let activated = sqlx::query_as::<_, AccountRecord>(
            r#"
            UPDATE accounts SET is_active = TRUE
            WHERE email = $1
            RETURNING id, username, email, is_active, is_staff
            "#,
        )
        .bind(&otp.email)
        .fetch_optional(&mut *tx)
        .await
        .map_err(port_error)?;

        let outcome = match activated {
            Some(record) => {
                sqlx::query("DELETE FROM otp_codes WHERE id = $1")
                    .bind(otp.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(port_error)?;
                OtpConsumption::Activated(record.to_domain())
            }
            // The code stays burnt even though nobody could be activated.
            None => OtpConsumption::AccountMissing,
        };

        tx.commit().await.map_err(port_error)?;
        Ok(outcome)
    }

    // --- Auth Sessions ---

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, account_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.account_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn get_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, account_id, expires_at FROM auth_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .ok_or_else(|| PortError::NotFound("Session not found".to_string()))?;

        Ok(AuthSession {
            id: record.id,
            account_id: record.account_id,
            expires_at: record.expires_at,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }
}
