//! crates/lms_core/src/enrollment.rs
//!
//! Course assignment: the derivation of a profile's registered courses from
//! its (cohort, specialization) pair, profile edits that re-run it, and the
//! administrator-curated course bundles.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    CohortId, Course, CourseBundle, CourseId, Identity, ProfileUpdate, SpecializationId,
    UserProfile,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{DatabaseService, PortError};

/// Every course whose pair equals `(cohort, specialization)`; empty when either
/// side is missing.
pub fn registered_courses<'a, I>(
    cohort: Option<CohortId>,
    specialization: Option<SpecializationId>,
    courses: I,
) -> BTreeSet<CourseId>
where
    I: IntoIterator<Item = &'a Course>,
{
    let (Some(cohort), Some(specialization)) = (cohort, specialization) else {
        return BTreeSet::new();
    };
    courses
        .into_iter()
        .filter(|c| c.cohort_id == cohort && c.specialization_id == specialization)
        .map(|c| c.id)
        .collect()
}

#[derive(Clone)]
pub struct EnrollmentService {
    db: Arc<dyn DatabaseService>,
}

impl EnrollmentService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Computes the course set `profile` should be registered on right now.
    pub async fn recompute(&self, profile: &UserProfile) -> WorkflowResult<BTreeSet<CourseId>> {
        let (Some(cohort), Some(specialization)) = (profile.cohort_id, profile.specialization_id)
        else {
            return Ok(BTreeSet::new());
        };
        let courses = self.db.courses_for_pair(cohort, specialization).await?;
        Ok(registered_courses(Some(cohort), Some(specialization), &courses))
    }

    /// Replaces the whole course set of the (cohort, specialization) bundle.
    pub async fn assign_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
        course_ids: &[CourseId],
    ) -> WorkflowResult<CourseBundle> {
        self.db.get_cohort(cohort_id).await?;
        self.db.get_specialization(specialization_id).await?;

        let bundle = self
            .db
            .replace_bundle(cohort_id, specialization_id, course_ids)
            .await?;
        info!(
            cohort_id,
            specialization_id,
            courses = bundle.course_ids.len(),
            "Course bundle replaced"
        );
        Ok(bundle)
    }

    /// The bundle of a (cohort, specialization) pair with its course records.
    /// `NotFound` if no bundle was ever assigned to the pair.
    pub async fn bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> WorkflowResult<(CourseBundle, Vec<Course>)> {
        let bundle = match self.db.get_bundle(cohort_id, specialization_id).await {
            Ok(bundle) => bundle,
            Err(PortError::NotFound(_)) => {
                return Err(WorkflowError::NotFound(
                    "No courses assigned to this specialization".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        let ids: Vec<CourseId> = bundle.course_ids.iter().copied().collect();
        let courses = self.db.get_courses(&ids).await?;
        Ok((bundle, courses))
    }

    pub async fn profile(&self, identity: &Identity) -> WorkflowResult<UserProfile> {
        Ok(self.db.get_profile(identity.account_id).await?)
    }

    /// The caller's profile together with its registered courses.
    pub async fn profile_with_courses(
        &self,
        identity: &Identity,
    ) -> WorkflowResult<(UserProfile, Vec<Course>)> {
        let profile = self.profile(identity).await?;
        let courses = self.courses_of(&profile).await?;
        Ok((profile, courses))
    }

    /// Loads the course records behind a profile's registered ids.
    pub async fn courses_of(&self, profile: &UserProfile) -> WorkflowResult<Vec<Course>> {
        let ids: Vec<CourseId> = profile.registered_courses.iter().copied().collect();
        Ok(self.db.get_courses(&ids).await?)
    }

    pub async fn registered_courses(&self, identity: &Identity) -> WorkflowResult<Vec<Course>> {
        let (_, courses) = self.profile_with_courses(identity).await?;
        Ok(courses)
    }

    /// Applies a partial edit to the caller's profile. The store re-derives the
    /// course set as part of the save.
    pub async fn update_profile(
        &self,
        identity: &Identity,
        update: ProfileUpdate,
    ) -> WorkflowResult<UserProfile> {
        let (cohort_id, specialization_id) = update.referenced_ids();
        if let Some(cohort_id) = cohort_id {
            self.db.get_cohort(cohort_id).await?;
        }
        if let Some(specialization_id) = specialization_id {
            self.db.get_specialization(specialization_id).await?;
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            debug!(account_id = %identity.account_id, "Rejecting blank profile name");
            return Err(WorkflowError::Validation("Name cannot be blank".to_string()));
        }

        let mut profile = self.db.get_profile(identity.account_id).await?;
        update.apply_to(&mut profile);
        let saved = self.db.save_profile(&profile).await.map_err(|e| match e {
            PortError::Conflict(_) => {
                WorkflowError::Conflict("Preferred name is already taken".to_string())
            }
            other => other.into(),
        })?;

        info!(
            account_id = %saved.account_id,
            cohort_id = ?saved.cohort_id,
            specialization_id = ?saved.specialization_id,
            courses = saved.registered_courses.len(),
            "Profile updated"
        );
        Ok(saved)
    }
}
