use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, DbErr, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Represents a registered person in the `members` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique login handle.
    #[sea_orm(unique)]
    pub handle: String,
    /// Display name shown in reports.
    pub name: String,
    /// Unique, lower-cased email address.
    #[sea_orm(unique)]
    pub email: String,
    /// Unique phone number.
    #[sea_orm(unique)]
    pub phone: String,
    /// Stored discriminant of [`MemberKind`].
    pub role: Role,
    /// Set for learners only; unique when present.
    pub roll_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column-level role, backed by the `member_role_type` enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "member_role_type")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[sea_orm(string_value = "learner")]
    Learner,

    #[sea_orm(string_value = "administrator")]
    Administrator,
}

/// What a member is, with the data only that variant carries.
///
/// Learners always have a roll number and administrators never do; callers
/// construct this instead of pairing a role with an optional identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum MemberKind {
    Learner { roll_number: String },
    Administrator,
}

impl MemberKind {
    pub fn role(&self) -> Role {
        match self {
            MemberKind::Learner { .. } => Role::Learner,
            MemberKind::Administrator => Role::Administrator,
        }
    }

    pub fn roll_number(&self) -> Option<&str> {
        match self {
            MemberKind::Learner { roll_number } => Some(roll_number),
            MemberKind::Administrator => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::course::Entity")]
    OwnedCourses,
    #[sea_orm(has_many = "super::course_enrollment::Entity")]
    Enrollments,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    AttendanceRecords,
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
    /// Inserts a new member and returns the stored row.
    ///
    /// Duplicate handle, email, phone or roll number surface as a unique
    /// constraint violation from the store.
    pub async fn create(
        db: &DatabaseConnection,
        handle: &str,
        name: &str,
        email: &str,
        phone: &str,
        kind: &MemberKind,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            handle: Set(handle.to_owned()),
            name: Set(name.to_owned()),
            email: Set(email.to_lowercase()),
            phone: Set(phone.to_owned()),
            role: Set(kind.role()),
            roll_number: Set(kind.roll_number().map(str::to_owned)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn find_by_handle(
        db: &DatabaseConnection,
        handle: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::Handle.eq(handle))
            .one(db)
            .await
    }

    /// Members enrolled in a course, ordered by id.
    pub async fn enrolled_in(db: &DatabaseConnection, course_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .inner_join(super::course_enrollment::Entity)
            .filter(super::course_enrollment::Column::CourseId.eq(course_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Rebuilds the tagged kind from the stored columns.
    pub fn kind(&self) -> MemberKind {
        match self.role {
            Role::Learner => MemberKind::Learner {
                roll_number: self.roll_number.clone().unwrap_or_default(),
            },
            Role::Administrator => MemberKind::Administrator,
        }
    }

    pub fn is_learner(&self) -> bool {
        self.role == Role::Learner
    }

    pub fn is_administrator(&self) -> bool {
        self.role == Role::Administrator
    }
}
