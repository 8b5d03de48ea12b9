use chrono::{DateTime, Utc};
use db::models::attendance_record::{self, AttendanceStatus};
use db::models::course;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::calendar::SessionCalendar;
use crate::credential::{CredentialCodec, CredentialError};
use crate::error::{AttendanceError, AttendanceResult};
use crate::origin::{normalize_origin, same_network};

/// Non-error outcomes of a redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Redemption {
    /// The member's row flipped from absent to present.
    Marked { course_code: String, subject: String },
    /// The row was already present; nothing changed.
    AlreadyMarked { course_code: String, subject: String },
    /// The caller is not on the issuing administrator's network.
    WrongNetwork,
}

impl Redemption {
    pub fn message(&self) -> String {
        match self {
            Redemption::Marked { subject, .. } => format!("Attendance marked for {subject}"),
            Redemption::AlreadyMarked { subject, .. } => {
                format!("Attendance already marked for {subject} today")
            }
            Redemption::WrongNetwork => {
                "You must be on the same network as the session host to mark attendance".into()
            }
        }
    }

    pub fn is_marked(&self) -> bool {
        matches!(self, Redemption::Marked { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RedemptionHandler {
    db: DatabaseConnection,
    codec: CredentialCodec,
    calendar: SessionCalendar,
}

impl RedemptionHandler {
    pub fn new(db: DatabaseConnection, codec: CredentialCodec, calendar: SessionCalendar) -> Self {
        Self { db, codec, calendar }
    }

    /// Marks `member_id` present for the course named in `token`.
    ///
    /// The credential is checked before anything is read from the store. The
    /// absent to present flip is a single conditional update, so concurrent
    /// redemptions by the same member yield exactly one `Marked`.
    pub async fn redeem(
        &self,
        token: &str,
        member_id: i64,
        caller_origin: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<Redemption> {
        let credential = self.codec.verify(token, now).inspect_err(|e| match e {
            CredentialError::BadSignature => {
                tracing::warn!(member_id, "credential with invalid signature presented")
            }
            _ => tracing::debug!(member_id, error = %e, "credential rejected"),
        })?;

        if !same_network(caller_origin, &credential.issuer_origin) {
            tracing::warn!(
                member_id,
                course = %credential.course_code,
                caller = %normalize_origin(caller_origin),
                issuer = %credential.issuer_origin,
                "redemption from a different network"
            );
            return Ok(Redemption::WrongNetwork);
        }

        let course = course::Model::find_by_code(&self.db, &credential.course_code)
            .await?
            .ok_or_else(|| AttendanceError::CourseNotFound(credential.course_code.clone()))?;

        let today = self.calendar.day_of(now);
        let not_started = || AttendanceError::SessionNotStarted {
            course_code: course.code.clone(),
            date: today,
        };
        let already = || Redemption::AlreadyMarked {
            course_code: course.code.clone(),
            subject: course.subject.clone(),
        };

        match attendance_record::Model::find_for_day(&self.db, member_id, course.id, today).await? {
            None => {
                tracing::debug!(member_id, course = %course.code, date = %today, "no session row for today");
                return Err(not_started());
            }
            Some(row) if row.status == AttendanceStatus::Present => {
                tracing::debug!(member_id, course = %course.code, "already marked");
                return Ok(already());
            }
            Some(_) => {}
        }

        let origin = normalize_origin(caller_origin);
        let flipped = attendance_record::Model::mark_present(
            &self.db,
            member_id,
            course.id,
            today,
            now,
            Some(origin.as_str()),
        )
        .await?;

        if flipped {
            tracing::info!(member_id, course = %course.code, date = %today, "attendance marked");
            return Ok(Redemption::Marked {
                course_code: course.code.clone(),
                subject: course.subject.clone(),
            });
        }

        // Lost a race against a concurrent redemption of the same row.
        match attendance_record::Model::find_for_day(&self.db, member_id, course.id, today).await? {
            Some(row) if row.status == AttendanceStatus::Present => Ok(already()),
            _ => Err(not_started()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance_session::SessionManager;
    use crate::course_service::{CourseService, NewCourse};
    use chrono::{Duration, TimeZone};
    use db::models::member::{self, MemberKind};
    use db::test_utils::setup_test_db;

    const SECRET: &[u8] = b"redeem-secret";

    struct Fixture {
        db: DatabaseConnection,
        admin: i64,
        alice: i64,
        sessions: SessionManager,
        handler: RedemptionHandler,
    }

    async fn fixture() -> Fixture {
        let db = setup_test_db().await;
        let admin = member::Model::create(&db, "prof", "Prof", "prof@example.com", "0200", &MemberKind::Administrator)
            .await
            .unwrap()
            .id;
        let alice = member::Model::create(
            &db,
            "alice",
            "Alice",
            "alice@example.com",
            "0100",
            &MemberKind::Learner { roll_number: "R-1".into() },
        )
        .await
        .unwrap()
        .id;
        CourseService::create(
            &db,
            NewCourse {
                owner_id: admin,
                subject: "Mathematics".into(),
                label: "Dr. Smith".into(),
                code: "MATH101".into(),
            },
        )
        .await
        .unwrap();
        CourseService::enroll(&db, "MATH101", alice).await.unwrap();

        let codec = CredentialCodec::new(SECRET, Duration::minutes(15));
        let calendar = SessionCalendar::default();
        Fixture {
            sessions: SessionManager::new(db.clone(), codec.clone(), calendar, None),
            handler: RedemptionHandler::new(db.clone(), codec, calendar),
            db,
            admin,
            alice,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 8, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_marks_once() {
        let fx = fixture().await;
        let ticket = fx.sessions.start_session("MATH101", fx.admin, "10.0.0.7", t0()).await.unwrap();

        let first = fx
            .handler
            .redeem(&ticket.token, fx.alice, "::ffff:10.0.0.7", t0() + Duration::minutes(2))
            .await
            .unwrap();
        assert_eq!(
            first,
            Redemption::Marked {
                course_code: "MATH101".into(),
                subject: "Mathematics".into()
            }
        );
        assert_eq!(first.message(), "Attendance marked for Mathematics");

        let second = fx
            .handler
            .redeem(&ticket.token, fx.alice, "10.0.0.7", t0() + Duration::minutes(3))
            .await
            .unwrap();
        assert!(matches!(second, Redemption::AlreadyMarked { .. }));

        let course = course::Model::find_by_code(&fx.db, "MATH101").await.unwrap().unwrap();
        let row = attendance_record::Model::find_for_day(&fx.db, fx.alice, course.id, ticket.session_date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, AttendanceStatus::Present);
        assert_eq!(row.marked_at, Some(t0() + Duration::minutes(2)));
        assert_eq!(row.marked_from.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_wrong_network_leaves_row_absent() {
        let fx = fixture().await;
        let ticket = fx.sessions.start_session("MATH101", fx.admin, "10.0.0.7", t0()).await.unwrap();

        let outcome = fx.handler.redeem(&ticket.token, fx.alice, "192.168.1.50", t0()).await.unwrap();
        assert_eq!(outcome, Redemption::WrongNetwork);

        let course = course::Model::find_by_code(&fx.db, "MATH101").await.unwrap().unwrap();
        let row = attendance_record::Model::find_for_day(&fx.db, fx.alice, course.id, ticket.session_date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, AttendanceStatus::Absent);
    }

    #[tokio::test]
    async fn test_expired_credential() {
        let fx = fixture().await;
        let ticket = fx.sessions.start_session("MATH101", fx.admin, "10.0.0.7", t0()).await.unwrap();

        let err = fx
            .handler
            .redeem(&ticket.token, fx.alice, "10.0.0.7", t0() + Duration::minutes(16))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Credential(CredentialError::Expired)));
    }

    #[tokio::test]
    async fn test_not_started_without_row() {
        let fx = fixture().await;
        // Signed credential with no session row behind it.
        let codec = CredentialCodec::new(SECRET, Duration::minutes(15));
        let issued = codec.issue("MATH101", "10.0.0.7", t0()).unwrap();

        let err = fx.handler.redeem(&issued.token, fx.alice, "10.0.0.7", t0()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::SessionNotStarted { ref course_code, .. } if course_code == "MATH101"));
    }

    #[tokio::test]
    async fn test_unenrolled_member_is_not_started() {
        let fx = fixture().await;
        let ticket = fx.sessions.start_session("MATH101", fx.admin, "10.0.0.7", t0()).await.unwrap();

        let err = fx.handler.redeem(&ticket.token, fx.admin, "10.0.0.7", t0()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::SessionNotStarted { .. }));
    }
}
