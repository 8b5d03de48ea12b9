use db::models::{course, course_enrollment, member};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::Validate;

use crate::error::{is_unique_violation, AttendanceError, AttendanceResult};

pub use db::models::course::Model as Course;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCourse {
    pub owner_id: i64,

    #[validate(length(min = 1, max = 128, message = "Subject must be 1 to 128 characters"))]
    pub subject: String,

    #[validate(length(min = 1, max = 128, message = "Label must be 1 to 128 characters"))]
    pub label: String,

    #[validate(length(min = 1, max = 32, message = "Course code must be 1 to 32 characters"))]
    pub code: String,
}

pub struct CourseService;

impl CourseService {
    /// Creates a course owned by an administrator.
    pub async fn create(db: &DatabaseConnection, new: NewCourse) -> AttendanceResult<Course> {
        new.validate()?;

        let owner = member::Model::find_by_id(db, new.owner_id)
            .await?
            .ok_or(AttendanceError::MemberNotFound(new.owner_id))?;
        if !owner.is_administrator() {
            return Err(AttendanceError::NotAnAdministrator(owner.id));
        }

        let code = new.code.trim();
        let created = course::Model::create(db, owner.id, new.subject.trim(), new.label.trim(), code)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AttendanceError::DuplicateCourse(code.to_owned())
                } else {
                    AttendanceError::Database(e)
                }
            })?;

        tracing::info!(course = %created.code, owner_id = owner.id, "course created");
        Ok(created)
    }

    pub async fn find_by_code(db: &DatabaseConnection, code: &str) -> AttendanceResult<Course> {
        course::Model::find_by_code(db, code)
            .await?
            .ok_or_else(|| AttendanceError::CourseNotFound(code.to_owned()))
    }

    /// Enrolls a learner in a course.
    pub async fn enroll(
        db: &DatabaseConnection,
        course_code: &str,
        member_id: i64,
    ) -> AttendanceResult<()> {
        let course = Self::find_by_code(db, course_code).await?;
        let learner = member::Model::find_by_id(db, member_id)
            .await?
            .ok_or(AttendanceError::MemberNotFound(member_id))?;
        if !learner.is_learner() {
            return Err(AttendanceError::NotALearner(member_id));
        }

        course_enrollment::Model::create(db, course.id, learner.id)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AttendanceError::AlreadyEnrolled {
                        member_id,
                        course_code: course.code.clone(),
                    }
                } else {
                    AttendanceError::Database(e)
                }
            })?;

        tracing::info!(course = %course.code, member_id, "member enrolled");
        Ok(())
    }

    pub async fn courses_for_member(
        db: &DatabaseConnection,
        member_id: i64,
    ) -> AttendanceResult<Vec<Course>> {
        Ok(course::Model::enrolled_for(db, member_id).await?)
    }

    pub async fn available_courses(
        db: &DatabaseConnection,
        member_id: i64,
    ) -> AttendanceResult<Vec<Course>> {
        Ok(course::Model::available_for(db, member_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::member_service::{MemberService, NewMember};
    use db::models::member::MemberKind;
    use db::test_utils::setup_test_db;

    async fn register(db: &DatabaseConnection, handle: &str, kind: MemberKind) -> i64 {
        MemberService::register(
            db,
            NewMember {
                handle: handle.into(),
                name: handle.into(),
                email: format!("{handle}@example.com"),
                phone: format!("555-{handle}"),
                kind,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn math(owner_id: i64) -> NewCourse {
        NewCourse {
            owner_id,
            subject: "Mathematics".into(),
            label: "Dr. Smith".into(),
            code: "MATH101".into(),
        }
    }

    #[tokio::test]
    async fn test_create_requires_administrator() {
        let db = setup_test_db().await;
        let admin = register(&db, "prof", MemberKind::Administrator).await;
        let alice = register(&db, "alice", MemberKind::Learner { roll_number: "R1".into() }).await;

        let err = CourseService::create(&db, math(alice)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NotAnAdministrator(id) if id == alice));
        assert_eq!(err.category(), ErrorCategory::Forbidden);

        let created = CourseService::create(&db, math(admin)).await.unwrap();
        assert_eq!(created.code, "MATH101");

        let dup = CourseService::create(&db, math(admin)).await.unwrap_err();
        assert!(matches!(dup, AttendanceError::DuplicateCourse(ref c) if c == "MATH101"));
    }

    #[tokio::test]
    async fn test_enroll() {
        let db = setup_test_db().await;
        let admin = register(&db, "prof", MemberKind::Administrator).await;
        let alice = register(&db, "alice", MemberKind::Learner { roll_number: "R1".into() }).await;
        CourseService::create(&db, math(admin)).await.unwrap();
        CourseService::create(
            &db,
            NewCourse {
                owner_id: admin,
                subject: "Physics".into(),
                label: "Dr. Jones".into(),
                code: "PHYS101".into(),
            },
        )
        .await
        .unwrap();

        CourseService::enroll(&db, "MATH101", alice).await.unwrap();

        let again = CourseService::enroll(&db, "MATH101", alice).await.unwrap_err();
        assert_eq!(again.category(), ErrorCategory::Conflict);

        let admin_enroll = CourseService::enroll(&db, "MATH101", admin).await.unwrap_err();
        assert!(matches!(admin_enroll, AttendanceError::NotALearner(_)));

        let unknown = CourseService::enroll(&db, "NOPE", alice).await.unwrap_err();
        assert!(matches!(unknown, AttendanceError::CourseNotFound(_)));

        let mine = CourseService::courses_for_member(&db, alice).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].code, "MATH101");

        let open = CourseService::available_courses(&db, alice).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].code, "PHYS101");
    }
}
