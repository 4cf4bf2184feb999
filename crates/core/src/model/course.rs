use crate::model::ids::{CourseId, CourseKey, ModuleId};
use crate::model::progress::{ProgressStats, ProgressStatus, ProgressTable};

/// Maximum number of not-yet-started courses suggested on the dashboard.
pub const RECOMMENDATION_LIMIT: usize = 3;

//
// ─── OUTLINE ──────────────────────────────────────────────────────────────────
//

/// The parts of a catalog course that progress tracking cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    pub id: CourseId,
    pub title: String,
    pub modules: Vec<ModuleId>,
}

impl CourseOutline {
    #[must_use]
    pub fn new(id: CourseId, title: impl Into<String>, modules: Vec<ModuleId>) -> Self {
        Self {
            id,
            title: title.into(),
            modules,
        }
    }

    #[must_use]
    pub fn course_key(&self) -> CourseKey {
        CourseKey::course(&self.id)
    }

    #[must_use]
    pub fn module_key(&self, module: &ModuleId) -> CourseKey {
        CourseKey::module(&self.id, module)
    }

    #[must_use]
    pub fn project_key(&self) -> CourseKey {
        CourseKey::project(&self.id)
    }

    #[must_use]
    pub fn has_module(&self, module: &ModuleId) -> bool {
        self.modules.contains(module)
    }
}

//
// ─── ROLLUP ───────────────────────────────────────────────────────────────────
//

/// Per-course view derived from the module and project keys of one course.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseRollup {
    /// Status stored under the bare course key (enrollment state).
    pub enrollment: ProgressStatus,
    pub completed_modules: usize,
    pub total_modules: usize,
    /// Status derived from module completion alone.
    pub derived_status: ProgressStatus,
    pub project_unlocked: bool,
    pub project_status: ProgressStatus,
}

impl CourseRollup {
    #[must_use]
    pub fn compute(outline: &CourseOutline, table: &ProgressTable) -> Self {
        let completed_modules = outline
            .modules
            .iter()
            .filter(|m| table.status_of(&outline.module_key(m)) == ProgressStatus::Completed)
            .count();
        let total_modules = outline.modules.len();

        let derived_status = if total_modules > 0 && completed_modules == total_modules {
            ProgressStatus::Completed
        } else if completed_modules > 0 {
            ProgressStatus::InProgress
        } else {
            ProgressStatus::NotStarted
        };

        Self {
            enrollment: table.status_of(&outline.course_key()),
            completed_modules,
            total_modules,
            derived_status,
            project_unlocked: derived_status == ProgressStatus::Completed,
            project_status: table.status_of(&outline.project_key()),
        }
    }

    /// Share of modules completed, `0.0..=100.0`.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total_modules == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = self.completed_modules as f64 / self.total_modules as f64 * 100.0;
        pct
    }

    /// Enrolled means the course key itself is in progress or completed.
    #[must_use]
    pub fn is_enrolled(&self) -> bool {
        matches!(
            self.enrollment,
            ProgressStatus::InProgress | ProgressStatus::Completed
        )
    }
}

//
// ─── DASHBOARD ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub title: &'static str,
    pub completed: bool,
    /// The milestone the learner is currently working towards.
    pub current: bool,
}

/// Learner dashboard numbers over a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub stats: ProgressStats,
    pub enrolled: Vec<CourseId>,
    pub certificates: Vec<CourseId>,
    pub recommended: Vec<CourseId>,
    /// Mean module completion over enrolled courses, `0.0..=100.0`.
    pub overall_percent: f64,
    pub milestones: Vec<Milestone>,
}

impl DashboardSummary {
    #[must_use]
    pub fn compute(catalog: &[CourseOutline], table: &ProgressTable) -> Self {
        let stats = table.stats();
        let rollups: Vec<(&CourseOutline, CourseRollup)> = catalog
            .iter()
            .map(|c| (c, CourseRollup::compute(c, table)))
            .collect();

        let enrolled: Vec<&(&CourseOutline, CourseRollup)> =
            rollups.iter().filter(|(_, r)| r.is_enrolled()).collect();
        let certificates: Vec<CourseId> = rollups
            .iter()
            .filter(|(_, r)| r.enrollment == ProgressStatus::Completed)
            .map(|(c, _)| c.id.clone())
            .collect();
        let recommended = rollups
            .iter()
            .filter(|(_, r)| r.enrollment == ProgressStatus::NotStarted)
            .take(RECOMMENDATION_LIMIT)
            .map(|(c, _)| c.id.clone())
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let overall_percent = if enrolled.is_empty() {
            0.0
        } else {
            enrolled.iter().map(|(_, r)| r.percent()).sum::<f64>() / enrolled.len() as f64
        };

        let milestones = vec![
            Milestone {
                title: "Complete first module",
                completed: stats.total > 0,
                current: false,
            },
            Milestone {
                title: "Finish 50% of a course",
                completed: overall_percent >= 50.0,
                current: overall_percent > 0.0 && overall_percent < 50.0,
            },
            Milestone {
                title: "Complete first course",
                completed: stats.completed > 0,
                current: stats.total > 0 && stats.completed == 0,
            },
            Milestone {
                title: "Earn first certificate",
                completed: !certificates.is_empty(),
                current: false,
            },
            Milestone {
                title: "Complete 3 courses",
                completed: stats.completed >= 3,
                current: false,
            },
        ];

        Self {
            stats,
            enrolled: enrolled.iter().map(|(c, _)| c.id.clone()).collect(),
            certificates,
            recommended,
            overall_percent,
            milestones,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn outline(id: &str, modules: &[&str]) -> CourseOutline {
        CourseOutline::new(
            CourseId::new(id).unwrap(),
            id,
            modules.iter().map(|m| ModuleId::new(*m).unwrap()).collect(),
        )
    }

    #[test]
    fn rollup_derives_status_from_modules() {
        let course = outline("rust", &["m1", "m2"]);
        let mut table = ProgressTable::new();

        let empty = CourseRollup::compute(&course, &table);
        assert_eq!(empty.derived_status, ProgressStatus::NotStarted);
        assert!(!empty.project_unlocked);

        table.apply(
            course.module_key(&course.modules[0]),
            ProgressStatus::Completed,
            fixed_now(),
        );
        let half = CourseRollup::compute(&course, &table);
        assert_eq!(half.completed_modules, 1);
        assert_eq!(half.derived_status, ProgressStatus::InProgress);
        assert!((half.percent() - 50.0).abs() < f64::EPSILON);

        table.apply(
            course.module_key(&course.modules[1]),
            ProgressStatus::Completed,
            fixed_now(),
        );
        let full = CourseRollup::compute(&course, &table);
        assert_eq!(full.derived_status, ProgressStatus::Completed);
        assert!(full.project_unlocked);
        assert_eq!(full.project_status, ProgressStatus::NotStarted);
    }

    #[test]
    fn moduleless_course_is_never_complete() {
        let course = outline("empty", &[]);
        let rollup = CourseRollup::compute(&course, &ProgressTable::new());
        assert_eq!(rollup.derived_status, ProgressStatus::NotStarted);
        assert!(rollup.percent().abs() < f64::EPSILON);
    }

    #[test]
    fn dashboard_splits_enrolled_and_recommended() {
        let catalog = vec![
            outline("a", &["m1", "m2"]),
            outline("b", &["m1"]),
            outline("c", &["m1"]),
            outline("d", &["m1"]),
            outline("e", &["m1"]),
        ];
        let mut table = ProgressTable::new();
        let now = fixed_now();
        table.apply(catalog[0].course_key(), ProgressStatus::InProgress, now);
        table.apply(
            catalog[0].module_key(&catalog[0].modules[0]),
            ProgressStatus::Completed,
            now,
        );
        table.apply(catalog[1].course_key(), ProgressStatus::Completed, now);
        table.apply(
            catalog[1].module_key(&catalog[1].modules[0]),
            ProgressStatus::Completed,
            now,
        );

        let summary = DashboardSummary::compute(&catalog, &table);
        assert_eq!(summary.enrolled.len(), 2);
        assert_eq!(summary.certificates, vec![catalog[1].id.clone()]);
        assert_eq!(summary.recommended.len(), RECOMMENDATION_LIMIT);
        assert!((summary.overall_percent - 75.0).abs() < f64::EPSILON);

        assert!(summary.milestones[1].completed);
        assert!(summary.milestones[2].completed);
        // module keys count towards completions, as on the learner dashboard
        assert_eq!(summary.stats.completed, 3);
        assert!(summary.milestones[4].completed);
    }
}
