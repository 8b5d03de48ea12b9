//! Starting attendance sessions.
//!
//! Starting a session writes the day's absent baseline for every enrolled
//! member and hands back a signed credential bound to the administrator's
//! network origin.

use chrono::{DateTime, NaiveDate, Utc};
use db::models::{attendance_record, course};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use url::Url;

use crate::calendar::SessionCalendar;
use crate::credential::CredentialCodec;
use crate::error::{AttendanceError, AttendanceResult};

const REDEEM_PATH: &str = "mark-attendance";

/// What an administrator receives after starting a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionTicket {
    pub token: String,
    pub course_code: String,
    pub session_date: NaiveDate,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Absent rows written by this call. Zero when the session was already
    /// started today for every enrolled member.
    pub rows_created: u64,
    /// Link members open to redeem the token, when a front end is configured.
    pub redeem_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionManager {
    db: DatabaseConnection,
    codec: CredentialCodec,
    calendar: SessionCalendar,
    link_base: Option<Url>,
}

impl SessionManager {
    pub fn new(
        db: DatabaseConnection,
        codec: CredentialCodec,
        calendar: SessionCalendar,
        link_base: Option<Url>,
    ) -> Self {
        Self {
            db,
            codec,
            calendar,
            link_base,
        }
    }

    /// Starts (or restarts) today's session for a course.
    ///
    /// Only the course owner may start it. Calling this again on the same day
    /// adds rows only for members enrolled since the last call and always
    /// returns a freshly signed credential.
    pub async fn start_session(
        &self,
        course_code: &str,
        admin_id: i64,
        issuer_origin: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<SessionTicket> {
        let course = course::Model::find_by_code(&self.db, course_code)
            .await?
            .ok_or_else(|| AttendanceError::CourseNotFound(course_code.to_owned()))?;

        if course.owner_id != admin_id {
            tracing::warn!(course = %course.code, admin_id, "session start refused: not owner");
            return Err(AttendanceError::NotOwner {
                member_id: admin_id,
                course_code: course.code,
            });
        }

        let session_date = self.calendar.day_of(now);
        let member_ids = course.enrolled_member_ids(&self.db).await?;
        let rows_created = attendance_record::Model::insert_absent(
            &self.db,
            course.id,
            &member_ids,
            session_date,
            now,
        )
        .await?;

        let issued = self.codec.issue(&course.code, issuer_origin, now)?;
        let redeem_url = self
            .link_base
            .as_ref()
            .map(|base| redeem_link(base, &issued.token))
            .transpose()?;

        tracing::info!(
            course = %course.code,
            %session_date,
            enrolled = member_ids.len(),
            rows_created,
            expires_at = %issued.expires_at,
            "attendance session started"
        );

        Ok(SessionTicket {
            token: issued.token,
            course_code: course.code,
            session_date,
            issued_at: issued.issued_at,
            expires_at: issued.expires_at,
            rows_created,
            redeem_url,
        })
    }
}

/// Parses a front-end base URL so relative joins keep its path.
pub(crate) fn parse_link_base(raw: &str) -> AttendanceResult<Url> {
    let mut raw = raw.trim().to_owned();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| AttendanceError::Config(format!("invalid FRONTEND_URL '{raw}': {e}")))
}

fn redeem_link(base: &Url, token: &str) -> AttendanceResult<String> {
    let mut url = base
        .join(REDEEM_PATH)
        .map_err(|e| AttendanceError::Config(format!("cannot build redeem link: {e}")))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.into())
}
