use reskill_core::model::{
    CourseOutline, CourseRollup, DashboardSummary, ModuleId, ProgressStatus,
};

use crate::error::CourseProgressError;
use crate::identity::IdentityProvider;
use crate::progress::ProgressStore;

/// Course-level actions a learner takes, expressed as progress writes.
#[derive(Clone)]
pub struct CourseProgressService {
    store: ProgressStore,
    identity: IdentityProvider,
}

impl CourseProgressService {
    #[must_use]
    pub fn new(store: ProgressStore, identity: IdentityProvider) -> Self {
        Self { store, identity }
    }

    fn require_learner(&self) -> Result<(), CourseProgressError> {
        if self.identity.is_signed_in() {
            Ok(())
        } else {
            Err(CourseProgressError::SignInRequired)
        }
    }

    /// Mark the course itself as in progress.
    ///
    /// # Errors
    ///
    /// Returns `CourseProgressError::SignInRequired` when nobody is signed in.
    pub fn enroll(&self, course: &CourseOutline) -> Result<CourseRollup, CourseProgressError> {
        self.require_learner()?;
        self.store
            .set_progress(course.course_key(), ProgressStatus::InProgress);
        Ok(self.rollup(course))
    }

    /// # Errors
    ///
    /// Returns `CourseProgressError::SignInRequired` when nobody is signed in,
    /// or `UnknownModule` if the module is not part of the course.
    pub fn start_module(
        &self,
        course: &CourseOutline,
        module: &ModuleId,
    ) -> Result<CourseRollup, CourseProgressError> {
        self.require_learner()?;
        if !course.has_module(module) {
            return Err(CourseProgressError::UnknownModule(module.clone()));
        }
        self.store
            .set_progress(course.module_key(module), ProgressStatus::InProgress);
        Ok(self.rollup(course))
    }

    /// Complete a module and advance the course key with it: the first
    /// completed module moves the course to in progress, the last one
    /// completes it.
    ///
    /// # Errors
    ///
    /// Returns `CourseProgressError::SignInRequired` when nobody is signed in,
    /// or `UnknownModule` if the module is not part of the course.
    pub fn complete_module(
        &self,
        course: &CourseOutline,
        module: &ModuleId,
    ) -> Result<CourseRollup, CourseProgressError> {
        self.require_learner()?;
        if !course.has_module(module) {
            return Err(CourseProgressError::UnknownModule(module.clone()));
        }
        self.store
            .set_progress(course.module_key(module), ProgressStatus::Completed);

        let rollup = self.rollup(course);
        if rollup.completed_modules == 1 {
            self.store
                .set_progress(course.course_key(), ProgressStatus::InProgress);
        }
        if rollup.completed_modules == rollup.total_modules {
            self.store
                .set_progress(course.course_key(), ProgressStatus::Completed);
            tracing::info!(course_id = %course.id, "course completed; project unlocked");
        }
        Ok(self.rollup(course))
    }

    /// Record the capstone project as submitted.
    ///
    /// # Errors
    ///
    /// Returns `SignInRequired` when nobody is signed in, `EmptySubmission`
    /// for a blank submission, and `ProjectLocked` while modules remain.
    pub fn submit_project(
        &self,
        course: &CourseOutline,
        submission: &str,
    ) -> Result<CourseRollup, CourseProgressError> {
        self.require_learner()?;
        if submission.trim().is_empty() {
            return Err(CourseProgressError::EmptySubmission);
        }
        if !self.rollup(course).project_unlocked {
            return Err(CourseProgressError::ProjectLocked);
        }
        self.store
            .set_progress(course.project_key(), ProgressStatus::Completed);
        Ok(self.rollup(course))
    }

    #[must_use]
    pub fn rollup(&self, course: &CourseOutline) -> CourseRollup {
        CourseRollup::compute(course, &self.store.snapshot())
    }

    #[must_use]
    pub fn dashboard(&self, catalog: &[CourseOutline]) -> DashboardSummary {
        DashboardSummary::compute(catalog, &self.store.snapshot())
    }
}
