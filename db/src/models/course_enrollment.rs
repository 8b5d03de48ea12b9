use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, DbErr, Set};
use serde::Serialize;

/// Membership of a member in a course. The composite key forbids duplicates.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "course_enrollments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub course_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_id: i64,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Enrolls a member. A second enrollment of the same pair is rejected by the
    /// primary key.
    pub async fn create(
        db: &DatabaseConnection,
        course_id: i64,
        member_id: i64,
    ) -> Result<Model, DbErr> {
        let active = ActiveModel {
            course_id: Set(course_id),
            member_id: Set(member_id),
            enrolled_at: Set(Utc::now()),
        };
        active.insert(db).await
    }

    pub async fn is_enrolled(
        db: &DatabaseConnection,
        course_id: i64,
        member_id: i64,
    ) -> Result<bool, DbErr> {
        Ok(Entity::find_by_id((course_id, member_id))
            .one(db)
            .await?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{course, member};
    use crate::test_utils::setup_test_db;
    use sea_orm::SqlErr;

    #[tokio::test]
    async fn test_enroll_once() {
        let db = setup_test_db().await;
        let owner = member::Model::create(
            &db,
            "prof",
            "Prof",
            "prof@example.com",
            "0200",
            &member::MemberKind::Administrator,
        )
        .await
        .unwrap();
        let learner = member::Model::create(
            &db,
            "alice",
            "Alice",
            "alice@example.com",
            "0100",
            &member::MemberKind::Learner {
                roll_number: "R-1".into(),
            },
        )
        .await
        .unwrap();
        let c = course::Model::create(&db, owner.id, "Mathematics", "Dr. Smith", "MATH101")
            .await
            .unwrap();

        assert!(!Model::is_enrolled(&db, c.id, learner.id).await.unwrap());
        Model::create(&db, c.id, learner.id).await.unwrap();
        assert!(Model::is_enrolled(&db, c.id, learner.id).await.unwrap());

        let dup = Model::create(&db, c.id, learner.id).await.unwrap_err();
        assert!(matches!(dup.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))));

        let members = member::Model::enrolled_in(&db, c.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, learner.id);
    }
}
