use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, DbErr, QueryOrder, QuerySelect, QueryTrait, Set};
use serde::Serialize;

use super::course_enrollment;

/// Represents a course in the `courses` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Administrator who created the course.
    pub owner_id: i64,
    /// Subject label, e.g. "Mathematics". Not unique across courses.
    pub subject: String,
    /// Human label, e.g. the lecturer's name.
    pub label: String,
    /// Globally unique course code, e.g. "MATH101".
    #[sea_orm(unique)]
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::OwnerId",
        to = "super::member::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::course_enrollment::Entity")]
    Enrollments,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    AttendanceRecords,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::course_enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Creates a new course owned by `owner_id`.
    ///
    /// # Arguments
    /// * `db` - Database connection reference.
    /// * `owner_id` - ID of the creating administrator.
    /// * `subject` - Subject label.
    /// * `label` - Human label.
    /// * `code` - Unique course code.
    pub async fn create(
        db: &DatabaseConnection,
        owner_id: i64,
        subject: &str,
        label: &str,
        code: &str,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            owner_id: Set(owner_id),
            subject: Set(subject.to_owned()),
            label: Set(label.to_owned()),
            code: Set(code.to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn find_by_code(db: &DatabaseConnection, code: &str) -> Result<Option<Model>, DbErr> {
        Entity::find().filter(Column::Code.eq(code)).one(db).await
    }

    /// Courses created by an administrator, ordered by code.
    pub async fn find_by_owner(db: &DatabaseConnection, owner_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::OwnerId.eq(owner_id))
            .order_by_asc(Column::Code)
            .all(db)
            .await
    }

    /// Courses a member is enrolled in, ordered by code.
    pub async fn enrolled_for(db: &DatabaseConnection, member_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .inner_join(course_enrollment::Entity)
            .filter(course_enrollment::Column::MemberId.eq(member_id))
            .order_by_asc(Column::Code)
            .all(db)
            .await
    }

    /// Courses a member has not enrolled in yet, ordered by code.
    pub async fn available_for(db: &DatabaseConnection, member_id: i64) -> Result<Vec<Model>, DbErr> {
        let enrolled = course_enrollment::Entity::find()
            .select_only()
            .column(course_enrollment::Column::CourseId)
            .filter(course_enrollment::Column::MemberId.eq(member_id))
            .into_query();

        Entity::find()
            .filter(Column::Id.not_in_subquery(enrolled))
            .order_by_asc(Column::Code)
            .all(db)
            .await
    }

    /// IDs of every member currently enrolled in this course.
    pub async fn enrolled_member_ids(&self, db: &DatabaseConnection) -> Result<Vec<i64>, DbErr> {
        course_enrollment::Entity::find()
            .select_only()
            .column(course_enrollment::Column::MemberId)
            .filter(course_enrollment::Column::CourseId.eq(self.id))
            .order_by_asc(course_enrollment::Column::MemberId)
            .into_tuple::<i64>()
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::{self, MemberKind};
    use crate::test_utils::setup_test_db;

    async fn admin(db: &DatabaseConnection) -> member::Model {
        member::Model::create(db, "prof", "Prof", "prof@example.com", "0200", &MemberKind::Administrator)
            .await
            .expect("create admin")
    }

    async fn learner(db: &DatabaseConnection, n: u32) -> member::Model {
        member::Model::create(
            db,
            &format!("l{n}"),
            &format!("Learner {n}"),
            &format!("l{n}@example.com"),
            &format!("07{n}"),
            &MemberKind::Learner {
                roll_number: format!("R-{n}"),
            },
        )
        .await
        .expect("create learner")
    }

    #[tokio::test]
    async fn test_create_and_find_by_code() {
        let db = setup_test_db().await;
        let owner = admin(&db).await;

        let created = Model::create(&db, owner.id, "Mathematics", "Dr. Smith", "MATH101")
            .await
            .expect("create course");
        assert_eq!(created.code, "MATH101");

        let found = Model::find_by_code(&db, "MATH101").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(Model::find_by_code(&db, "NOPE").await.unwrap().is_none());

        let owned = Model::find_by_owner(&db, owner.id).await.unwrap();
        assert_eq!(owned.len(), 1);
    }

    #[tokio::test]
    async fn test_enrolled_and_available() {
        let db = setup_test_db().await;
        let owner = admin(&db).await;
        let l1 = learner(&db, 1).await;
        let l2 = learner(&db, 2).await;

        let math = Model::create(&db, owner.id, "Mathematics", "Dr. Smith", "MATH101").await.unwrap();
        let phys = Model::create(&db, owner.id, "Physics", "Dr. Jones", "PHYS101").await.unwrap();

        course_enrollment::Model::create(&db, math.id, l1.id).await.unwrap();
        course_enrollment::Model::create(&db, math.id, l2.id).await.unwrap();
        course_enrollment::Model::create(&db, phys.id, l2.id).await.unwrap();

        let ids = math.enrolled_member_ids(&db).await.unwrap();
        assert_eq!(ids, vec![l1.id, l2.id]);

        let l1_courses: Vec<String> = Model::enrolled_for(&db, l1.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(l1_courses, vec!["MATH101".to_string()]);

        let l1_available: Vec<String> = Model::available_for(&db, l1.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(l1_available, vec!["PHYS101".to_string()]);

        assert!(Model::available_for(&db, l2.id).await.unwrap().is_empty());
    }
}
