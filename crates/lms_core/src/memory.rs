//! crates/lms_core/src/memory.rs
//!
//! An in-memory `DatabaseService`.
//!
//! Intended for tests/dev. All tables sit behind one lock, so every trait
//! method is a single atomic unit.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Account, AccountCredentials, AccountId, AuthSession, Cohort, CohortId, Course,
    CourseBundle, CourseId, Invitation, NewAccount, NewCohort, NewCourse, NewProfile,
    NewSpecialization, OtpCode, Specialization, SpecializationId, UserProfile,
};
use crate::enrollment::registered_courses;
use crate::ports::{DatabaseService, OtpConsumption, PortError, PortResult};

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    hashed_password: String,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    cohorts: BTreeMap<CohortId, Cohort>,
    specializations: BTreeMap<SpecializationId, Specialization>,
    courses: BTreeMap<CourseId, Course>,
    bundles: BTreeMap<(CohortId, SpecializationId), BTreeSet<CourseId>>,
    accounts: HashMap<AccountId, StoredAccount>,
    profiles: HashMap<AccountId, UserProfile>,
    /// Keyed by email: at most one invitation per address.
    invitations: HashMap<String, Invitation>,
    otps: HashMap<Uuid, OtpCode>,
    sessions: HashMap<String, AuthSession>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn derive(&self, profile: &mut UserProfile) {
        profile.registered_courses = registered_courses(
            profile.cohort_id,
            profile.specialization_id,
            self.courses.values(),
        );
    }

    /// Re-derives every profile matching `filter`.
    fn rederive_where(&mut self, filter: impl Fn(&UserProfile) -> bool) {
        let ids: Vec<AccountId> = self
            .profiles
            .values()
            .filter(|p| filter(p))
            .map(|p| p.account_id)
            .collect();
        for id in ids {
            if let Some(mut profile) = self.profiles.remove(&id) {
                self.derive(&mut profile);
                self.profiles.insert(id, profile);
            }
        }
    }

    fn account_by_email(&self, email: &str) -> Option<&StoredAccount> {
        self.accounts.values().find(|a| a.account.email == email)
    }

    fn check_profile_uniqueness(&self, profile: &UserProfile) -> PortResult<()> {
        for other in self.profiles.values() {
            if other.account_id == profile.account_id {
                continue;
            }
            if other.email == profile.email {
                return Err(PortError::Conflict(format!(
                    "profile email {} already in use",
                    profile.email
                )));
            }
            if profile.preferred_name.is_some() && other.preferred_name == profile.preferred_name {
                return Err(PortError::Conflict("preferred name already in use".to_string()));
            }
        }
        Ok(())
    }

    fn insert_profile(&mut self, new: NewProfile) -> PortResult<UserProfile> {
        if !self.accounts.contains_key(&new.account_id) {
            return Err(PortError::NotFound(format!("Account {} not found", new.account_id)));
        }
        if self.profiles.contains_key(&new.account_id) {
            return Err(PortError::Conflict(format!(
                "account {} already has a profile",
                new.account_id
            )));
        }
        let mut profile = UserProfile {
            account_id: new.account_id,
            name: new.name,
            surname: new.surname,
            email: new.email,
            preferred_name: new.preferred_name,
            physical_address: new.physical_address,
            cohort_id: new.cohort_id,
            specialization_id: new.specialization_id,
            registered_courses: BTreeSet::new(),
        };
        self.check_profile_uniqueness(&profile)?;
        self.derive(&mut profile);
        self.profiles.insert(profile.account_id, profile.clone());
        Ok(profile)
    }

    fn insert_account(&mut self, new: NewAccount) -> PortResult<Account> {
        if self.account_by_email(&new.email).is_some()
            || self.accounts.values().any(|a| a.account.username == new.username)
        {
            return Err(PortError::Conflict(format!("account {} already exists", new.email)));
        }
        let account = Account {
            id: new.id,
            username: new.username,
            email: new.email,
            is_active: new.is_active,
            is_staff: new.is_staff,
        };
        self.accounts.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                hashed_password: new.hashed_password,
            },
        );
        Ok(account)
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> PortResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| PortError::Unexpected("lock poisoned".to_string()))
    }

    fn write(&self) -> PortResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| PortError::Unexpected("lock poisoned".to_string()))
    }

    /// Number of stored invitations; lets tests observe consumption.
    pub fn invitation_count(&self) -> usize {
        self.read().map(|t| t.invitations.len()).unwrap_or(0)
    }

    /// Number of stored OTP records.
    pub fn otp_count(&self) -> usize {
        self.read().map(|t| t.otps.len()).unwrap_or(0)
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_cohort(&self, cohort: NewCohort) -> PortResult<Cohort> {
        let mut t = self.write()?;
        if t.cohorts.values().any(|c| c.name == cohort.name) {
            return Err(PortError::Conflict(format!("cohort {} already exists", cohort.name)));
        }
        let id = t.next_id();
        let cohort = Cohort {
            id,
            name: cohort.name,
            start_date: cohort.start_date,
            end_date: cohort.end_date,
        };
        t.cohorts.insert(id, cohort.clone());
        Ok(cohort)
    }

    async fn get_cohort(&self, cohort_id: CohortId) -> PortResult<Cohort> {
        self.read()?
            .cohorts
            .get(&cohort_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Cohort {} not found", cohort_id)))
    }

    async fn delete_cohort(&self, cohort_id: CohortId) -> PortResult<()> {
        let mut t = self.write()?;
        if t.cohorts.remove(&cohort_id).is_none() {
            return Err(PortError::NotFound(format!("Cohort {} not found", cohort_id)));
        }
        let removed_specs: BTreeSet<SpecializationId> = t
            .specializations
            .values()
            .filter(|s| s.cohort_id == cohort_id)
            .map(|s| s.id)
            .collect();
        t.specializations.retain(|_, s| s.cohort_id != cohort_id);
        t.courses.retain(|_, c| {
            c.cohort_id != cohort_id && !removed_specs.contains(&c.specialization_id)
        });
        t.bundles
            .retain(|(c, s), _| *c != cohort_id && !removed_specs.contains(s));
        let live_courses: BTreeSet<CourseId> = t.courses.keys().copied().collect();
        for ids in t.bundles.values_mut() {
            ids.retain(|id| live_courses.contains(id));
        }

        for profile in t.profiles.values_mut() {
            if profile.cohort_id == Some(cohort_id) {
                profile.cohort_id = None;
            }
            if profile
                .specialization_id
                .is_some_and(|s| removed_specs.contains(&s))
            {
                profile.specialization_id = None;
            }
        }
        t.rederive_where(|_| true);
        Ok(())
    }

    async fn create_specialization(
        &self,
        specialization: NewSpecialization,
    ) -> PortResult<Specialization> {
        let mut t = self.write()?;
        if !t.cohorts.contains_key(&specialization.cohort_id) {
            return Err(PortError::NotFound(format!(
                "Cohort {} not found",
                specialization.cohort_id
            )));
        }
        if t.specializations.values().any(|s| s.name == specialization.name) {
            return Err(PortError::Conflict(format!(
                "specialization {} already exists",
                specialization.name
            )));
        }
        let id = t.next_id();
        let specialization = Specialization {
            id,
            name: specialization.name,
            cohort_id: specialization.cohort_id,
        };
        t.specializations.insert(id, specialization.clone());
        Ok(specialization)
    }

    async fn get_specialization(
        &self,
        specialization_id: SpecializationId,
    ) -> PortResult<Specialization> {
        self.read()?
            .specializations
            .get(&specialization_id)
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("Specialization {} not found", specialization_id))
            })
    }

    async fn create_course(&self, course: NewCourse) -> PortResult<Course> {
        let mut t = self.write()?;
        if !t.cohorts.contains_key(&course.cohort_id) {
            return Err(PortError::NotFound(format!("Cohort {} not found", course.cohort_id)));
        }
        if !t.specializations.contains_key(&course.specialization_id) {
            return Err(PortError::NotFound(format!(
                "Specialization {} not found",
                course.specialization_id
            )));
        }
        let id = t.next_id();
        let course = Course {
            id,
            title: course.title,
            description: course.description,
            provider: course.provider,
            status: course.status,
            due_date: course.due_date,
            materials: course.materials,
            cohort_id: course.cohort_id,
            specialization_id: course.specialization_id,
        };
        t.courses.insert(id, course.clone());
        let (cohort_id, specialization_id) = (course.cohort_id, course.specialization_id);
        t.rederive_where(|p| {
            p.cohort_id == Some(cohort_id) && p.specialization_id == Some(specialization_id)
        });
        Ok(course)
    }

    async fn courses_for_pair(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> PortResult<Vec<Course>> {
        Ok(self
            .read()?
            .courses
            .values()
            .filter(|c| c.cohort_id == cohort_id && c.specialization_id == specialization_id)
            .cloned()
            .collect())
    }

    async fn get_courses(&self, course_ids: &[CourseId]) -> PortResult<Vec<Course>> {
        let t = self.read()?;
        let wanted: BTreeSet<CourseId> = course_ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| t.courses.get(&id).cloned())
            .collect())
    }

    async fn replace_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
        course_ids: &[CourseId],
    ) -> PortResult<CourseBundle> {
        let mut t = self.write()?;
        if !t.cohorts.contains_key(&cohort_id) {
            return Err(PortError::NotFound(format!("Cohort {} not found", cohort_id)));
        }
        if !t.specializations.contains_key(&specialization_id) {
            return Err(PortError::NotFound(format!(
                "Specialization {} not found",
                specialization_id
            )));
        }
        let ids: BTreeSet<CourseId> = course_ids
            .iter()
            .copied()
            .filter(|id| t.courses.contains_key(id))
            .collect();
        t.bundles.insert((cohort_id, specialization_id), ids.clone());
        Ok(CourseBundle {
            cohort_id,
            specialization_id,
            course_ids: ids,
        })
    }

    async fn get_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> PortResult<CourseBundle> {
        let t = self.read()?;
        let ids = t
            .bundles
            .get(&(cohort_id, specialization_id))
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!(
                    "No course bundle for cohort {} / specialization {}",
                    cohort_id, specialization_id
                ))
            })?;
        Ok(CourseBundle {
            cohort_id,
            specialization_id,
            course_ids: ids,
        })
    }

    async fn create_account(&self, account: NewAccount) -> PortResult<Account> {
        self.write()?.insert_account(account)
    }

    async fn get_account(&self, account_id: AccountId) -> PortResult<Account> {
        self.read()?
            .accounts
            .get(&account_id)
            .map(|a| a.account.clone())
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", account_id)))
    }

    async fn get_account_by_email(&self, email: &str) -> PortResult<Account> {
        self.read()?
            .account_by_email(email)
            .map(|a| a.account.clone())
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", email)))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        self.read()?
            .account_by_email(email)
            .map(|a| AccountCredentials {
                account_id: a.account.id,
                email: a.account.email.clone(),
                hashed_password: a.hashed_password.clone(),
                is_active: a.account.is_active,
            })
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", email)))
    }

    async fn get_profile(&self, account_id: AccountId) -> PortResult<UserProfile> {
        self.read()?
            .profiles
            .get(&account_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", account_id)))
    }

    async fn create_profile(&self, profile: NewProfile) -> PortResult<UserProfile> {
        self.write()?.insert_profile(profile)
    }

    async fn save_profile(&self, profile: &UserProfile) -> PortResult<UserProfile> {
        let mut t = self.write()?;
        if !t.profiles.contains_key(&profile.account_id) {
            return Err(PortError::NotFound(format!(
                "Profile {} not found",
                profile.account_id
            )));
        }
        t.check_profile_uniqueness(profile)?;
        let mut saved = profile.clone();
        t.derive(&mut saved);
        t.profiles.insert(saved.account_id, saved.clone());
        Ok(saved)
    }

    async fn upsert_invitation(&self, invitation: &Invitation) -> PortResult<()> {
        let mut t = self.write()?;
        if t
            .invitations
            .values()
            .any(|i| i.token == invitation.token && i.email != invitation.email)
        {
            return Err(PortError::Conflict("invitation token already in use".to_string()));
        }
        t.invitations
            .insert(invitation.email.clone(), invitation.clone());
        Ok(())
    }

    async fn find_invitation_by_token(&self, token: &str) -> PortResult<Invitation> {
        self.read()?
            .invitations
            .values()
            .find(|i| i.token == token)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Invitation not found".to_string()))
    }

    async fn find_invitation_by_email(&self, email: &str) -> PortResult<Invitation> {
        self.read()?
            .invitations
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Invitation not found".to_string()))
    }

    async fn find_invitation(&self, token: &str, email: &str) -> PortResult<Invitation> {
        self.read()?
            .invitations
            .get(email)
            .filter(|i| i.token == token)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Invitation not found".to_string()))
    }

    async fn delete_invitation(&self, token: &str) -> PortResult<()> {
        self.write()?.invitations.retain(|_, i| i.token != token);
        Ok(())
    }

    async fn redeem_invitation(
        &self,
        token: &str,
        account: NewAccount,
        profile: NewProfile,
    ) -> PortResult<Account> {
        let mut t = self.write()?;
        let matches = t
            .invitations
            .get(&account.email)
            .is_some_and(|i| i.token == token);
        if !matches {
            return Err(PortError::NotFound("Invitation not found".to_string()));
        }

        // Validate both inserts before touching anything so a failure leaves
        // the invitation in place.
        if t.account_by_email(&account.email).is_some() {
            return Err(PortError::Conflict(format!(
                "account {} already exists",
                account.email
            )));
        }
        if t.profiles.values().any(|p| p.email == profile.email) {
            return Err(PortError::Conflict(format!(
                "profile email {} already in use",
                profile.email
            )));
        }

        let email = account.email.clone();
        let account = t.insert_account(account)?;
        t.insert_profile(profile)?;
        t.invitations.remove(&email);
        Ok(account)
    }

    async fn create_otp(&self, otp: &OtpCode) -> PortResult<()> {
        self.write()?.otps.insert(otp.id, otp.clone());
        Ok(())
    }

    async fn find_unused_otp(&self, email: &str, code: &str) -> PortResult<OtpCode> {
        self.read()?
            .otps
            .values()
            .filter(|o| o.email == email && o.code == code && !o.is_used)
            .max_by_key(|o| o.created_at)
            .cloned()
            .ok_or_else(|| PortError::NotFound("OTP not found".to_string()))
    }

    async fn delete_otp(&self, otp_id: Uuid) -> PortResult<()> {
        self.write()?.otps.remove(&otp_id);
        Ok(())
    }

    async fn consume_otp(&self, otp: &OtpCode) -> PortResult<OtpConsumption> {
        let mut t = self.write()?;
        match t.otps.get_mut(&otp.id) {
            Some(record) if !record.is_used => record.is_used = true,
            _ => return Err(PortError::NotFound("OTP not found".to_string())),
        }

        let account_id = match t.account_by_email(&otp.email) {
            Some(stored) => stored.account.id,
            None => return Ok(OtpConsumption::AccountMissing),
        };
        let account = match t.accounts.get_mut(&account_id) {
            Some(stored) => {
                stored.account.is_active = true;
                stored.account.clone()
            }
            None => return Ok(OtpConsumption::AccountMissing),
        };
        t.otps.remove(&otp.id);
        Ok(OtpConsumption::Activated(account))
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        self.write()?
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
        self.read()?
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Session not found".to_string()))
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.write()?.sessions.remove(session_id);
        Ok(())
    }
}
