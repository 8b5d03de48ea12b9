use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    DatabaseConnection, DbErr, FromQueryResult, NotSet, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use strum::Display;

/// One ledger row per (member, course, session day).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub member_id: i64,
    pub course_id: i64,
    /// Day in the reference timezone the session was opened on.
    pub session_date: NaiveDate,
    pub status: AttendanceStatus,
    /// When the row flipped to present.
    pub marked_at: Option<DateTime<Utc>>,
    /// Network origin the redemption came from.
    pub marked_from: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_status_type")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "absent")]
    Absent,

    #[sea_orm(string_value = "present")]
    Present,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Present and total row counts for one member in one course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub present: i64,
    pub total: i64,
}

impl Tally {
    pub fn absent(&self) -> i64 {
        self.total - self.present
    }
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    member_id: i64,
    cnt: i64,
}

/// Rows per `INSERT`; seven parameters each keeps a batch under 999 variables.
const INSERT_CHUNK: usize = 128;

impl Model {
    /// Inserts an absent row for every member that has none for this course and day.
    ///
    /// Rows that already exist are skipped by the unique index instead of failing
    /// the batch, so repeated calls converge on one row per member. Returns the
    /// number of rows actually created. Large enrollments are written in batches
    /// that stay under SQLite's bound-parameter limit.
    pub async fn insert_absent(
        db: &DatabaseConnection,
        course_id: i64,
        member_ids: &[i64],
        session_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let mut created = 0;
        for chunk in member_ids.chunks(INSERT_CHUNK) {
            let rows = chunk.iter().map(|&member_id| ActiveModel {
                id: NotSet,
                member_id: Set(member_id),
                course_id: Set(course_id),
                session_date: Set(session_date),
                status: Set(AttendanceStatus::Absent),
                marked_at: Set(None),
                marked_from: Set(None),
                created_at: Set(now),
            });

            created += Entity::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([Column::MemberId, Column::CourseId, Column::SessionDate])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }
        Ok(created)
    }

    /// Fetches the row for a member, course and day.
    pub async fn find_for_day(
        db: &DatabaseConnection,
        member_id: i64,
        course_id: i64,
        session_date: NaiveDate,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::MemberId.eq(member_id))
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::SessionDate.eq(session_date))
            .one(db)
            .await
    }

    /// Flips the row for a member, course and day from absent to present.
    ///
    /// This is a single conditional `UPDATE ... WHERE status = 'absent'`, so of
    /// any number of concurrent callers exactly one observes `true`. Returns
    /// `false` when there is no absent row to flip.
    pub async fn mark_present(
        db: &DatabaseConnection,
        member_id: i64,
        course_id: i64,
        session_date: NaiveDate,
        now: DateTime<Utc>,
        origin: Option<&str>,
    ) -> Result<bool, DbErr> {
        let res = Entity::update_many()
            .set(ActiveModel {
                status: Set(AttendanceStatus::Present),
                marked_at: Set(Some(now)),
                marked_from: Set(origin.map(str::to_owned)),
                ..Default::default()
            })
            .filter(Column::MemberId.eq(member_id))
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::SessionDate.eq(session_date))
            .filter(Column::Status.eq(AttendanceStatus::Absent))
            .exec(db)
            .await?;

        Ok(res.rows_affected == 1)
    }

    /// Every row of one member in one course, oldest day first.
    pub async fn history(
        db: &DatabaseConnection,
        member_id: i64,
        course_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::MemberId.eq(member_id))
            .filter(Column::CourseId.eq(course_id))
            .order_by_asc(Column::SessionDate)
            .all(db)
            .await
    }

    /// All rows of a course on one day.
    pub async fn for_course_day(
        db: &DatabaseConnection,
        course_id: i64,
        session_date: NaiveDate,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::SessionDate.eq(session_date))
            .order_by_asc(Column::MemberId)
            .all(db)
            .await
    }

    /// Per-member tallies for one course, keyed by member id.
    ///
    /// Scoped by course id, never by subject label: two courses that share a
    /// subject do not see each other's rows.
    pub async fn tallies_for_course(
        db: &DatabaseConnection,
        course_id: i64,
    ) -> Result<HashMap<i64, Tally>, DbErr> {
        let totals = Self::count_by_member(db, course_id, None).await?;
        let present = Self::count_by_member(db, course_id, Some(AttendanceStatus::Present)).await?;

        let mut tallies: HashMap<i64, Tally> = HashMap::with_capacity(totals.len());
        for row in totals {
            tallies.entry(row.member_id).or_default().total = row.cnt;
        }
        for row in present {
            tallies.entry(row.member_id).or_default().present = row.cnt;
        }
        Ok(tallies)
    }

    async fn count_by_member(
        db: &DatabaseConnection,
        course_id: i64,
        status: Option<AttendanceStatus>,
    ) -> Result<Vec<CountRow>, DbErr> {
        let mut query = Entity::find()
            .select_only()
            .column(Column::MemberId)
            .column_as(Expr::expr(Func::count(Expr::col(Column::Id))), "cnt")
            .filter(Column::CourseId.eq(course_id));
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status));
        }

        query
            .group_by(Column::MemberId)
            .into_model::<CountRow>()
            .all(db)
            .await
    }
}
