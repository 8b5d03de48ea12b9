use chrono::NaiveDate;
use db::models::attendance_record::{self, AttendanceStatus};
use db::models::{course, member};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::error::{AttendanceError, AttendanceResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// One course in a member's personal report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberCourseReport {
    pub course_code: String,
    pub subject: String,
    pub total_sessions: i64,
    pub present_count: i64,
    pub absent_count: i64,
    /// Oldest day first.
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberTally {
    pub member_id: i64,
    pub name: String,
    pub roll_number: Option<String>,
    pub present: i64,
    pub absent: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseReport {
    pub subject: String,
    pub course_code: String,
    pub members: Vec<MemberTally>,
}

/// Read-only aggregation over the attendance ledger.
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    db: DatabaseConnection,
}

impl ReportAggregator {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn report_for_member(&self, member_id: i64) -> AttendanceResult<Vec<MemberCourseReport>> {
        member::Model::find_by_id(&self.db, member_id)
            .await?
            .ok_or(AttendanceError::MemberNotFound(member_id))?;

        let courses = course::Model::enrolled_for(&self.db, member_id).await?;
        let mut reports = Vec::with_capacity(courses.len());

        for course in courses {
            let rows = attendance_record::Model::history(&self.db, member_id, course.id).await?;
            let present_count = rows
                .iter()
                .filter(|r| r.status == AttendanceStatus::Present)
                .count() as i64;
            let total_sessions = rows.len() as i64;

            reports.push(MemberCourseReport {
                course_code: course.code,
                subject: course.subject,
                total_sessions,
                present_count,
                absent_count: total_sessions - present_count,
                history: rows
                    .into_iter()
                    .map(|r| HistoryEntry {
                        date: r.session_date,
                        status: r.status,
                    })
                    .collect(),
            });
        }

        Ok(reports)
    }

    /// Per-member tallies for one course, every enrolled member included.
    pub async fn report_for_course(&self, course_code: &str) -> AttendanceResult<CourseReport> {
        let course = course::Model::find_by_code(&self.db, course_code)
            .await?
            .ok_or_else(|| AttendanceError::CourseNotFound(course_code.to_owned()))?;
        self.build_course_report(course).await
    }

    /// Reports for every course owned by an administrator, ordered by code.
    pub async fn reports_for_owner(&self, owner_id: i64) -> AttendanceResult<Vec<CourseReport>> {
        let owner = member::Model::find_by_id(&self.db, owner_id)
            .await?
            .ok_or(AttendanceError::MemberNotFound(owner_id))?;
        if !owner.is_administrator() {
            return Err(AttendanceError::NotAnAdministrator(owner_id));
        }

        let mut reports = Vec::new();
        for course in course::Model::find_by_owner(&self.db, owner_id).await? {
            reports.push(self.build_course_report(course).await?);
        }
        Ok(reports)
    }

    async fn build_course_report(&self, course: course::Model) -> AttendanceResult<CourseReport> {
        let tallies = attendance_record::Model::tallies_for_course(&self.db, course.id).await?;
        let members = member::Model::enrolled_in(&self.db, course.id).await?;

        let members = members
            .into_iter()
            .map(|m| {
                let tally = tallies.get(&m.id).copied().unwrap_or_default();
                MemberTally {
                    member_id: m.id,
                    name: m.name,
                    roll_number: m.roll_number,
                    present: tally.present,
                    absent: tally.absent(),
                    total: tally.total,
                }
            })
            .collect();

        Ok(CourseReport {
            subject: course.subject,
            course_code: course.code,
            members,
        })
    }
}
