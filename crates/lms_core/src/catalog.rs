//! crates/lms_core/src/catalog.rs
//!
//! Staff maintenance of cohorts, specializations and courses.

use std::sync::Arc;

use tracing::info;

use crate::domain::{
    Cohort, CohortId, Course, NewCohort, NewCourse, NewSpecialization, Specialization,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::DatabaseService;

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<dyn DatabaseService>,
}

impl CatalogService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn create_cohort(&self, cohort: NewCohort) -> WorkflowResult<Cohort> {
        if cohort.name.trim().is_empty() {
            return Err(WorkflowError::Validation("Cohort name is required".to_string()));
        }
        if cohort.end_date < cohort.start_date {
            return Err(WorkflowError::Validation(
                "Cohort end date precedes its start date".to_string(),
            ));
        }
        let cohort = self.db.create_cohort(cohort).await?;
        info!(cohort_id = cohort.id, name = %cohort.name, "Cohort created");
        Ok(cohort)
    }

    pub async fn create_specialization(
        &self,
        specialization: NewSpecialization,
    ) -> WorkflowResult<Specialization> {
        if specialization.name.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "Specialization name is required".to_string(),
            ));
        }
        self.db.get_cohort(specialization.cohort_id).await?;
        let specialization = self.db.create_specialization(specialization).await?;
        info!(
            specialization_id = specialization.id,
            cohort_id = specialization.cohort_id,
            "Specialization created"
        );
        Ok(specialization)
    }

    /// Adds a course; profiles already on its pair are enrolled by the store.
    pub async fn create_course(&self, course: NewCourse) -> WorkflowResult<Course> {
        if course.title.trim().is_empty() {
            return Err(WorkflowError::Validation("Course title is required".to_string()));
        }
        self.db.get_cohort(course.cohort_id).await?;
        let specialization = self.db.get_specialization(course.specialization_id).await?;
        if specialization.cohort_id != course.cohort_id {
            return Err(WorkflowError::Validation(format!(
                "Specialization {} does not belong to cohort {}",
                specialization.id, course.cohort_id
            )));
        }
        let course = self.db.create_course(course).await?;
        info!(
            course_id = course.id,
            cohort_id = course.cohort_id,
            specialization_id = course.specialization_id,
            "Course created"
        );
        Ok(course)
    }

    pub async fn delete_cohort(&self, cohort_id: CohortId) -> WorkflowResult<()> {
        self.db.delete_cohort(cohort_id).await?;
        info!(cohort_id, "Cohort deleted");
        Ok(())
    }
}
