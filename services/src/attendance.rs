//! Entry point wiring the attendance components to one store and one signing
//! key.

use chrono::{DateTime, Duration, Utc};
use sea_orm::DatabaseConnection;
use url::Url;
use util::config::AppConfig;

use crate::attendance_session::{parse_link_base, SessionManager, SessionTicket};
use crate::calendar::SessionCalendar;
use crate::course_service::{Course, CourseService, NewCourse};
use crate::credential::{CredentialCodec, VerifiedCredential};
use crate::error::{AttendanceError, AttendanceResult};
use crate::member_service::{Member, MemberService, NewMember};
use crate::redemption::{Redemption, RedemptionHandler};
use crate::report::{CourseReport, MemberCourseReport, ReportAggregator};

/// Longest credential lifetime accepted at startup.
const MAX_TOKEN_TTL_DAYS: i64 = 366;

/// Values the attendance core needs from configuration.
#[derive(Debug, Clone)]
pub struct AttendanceSettings {
    pub secret: String,
    pub token_ttl: Duration,
    pub utc_offset_minutes: i32,
    pub frontend_url: Option<String>,
}

impl AttendanceSettings {
    pub fn from_config(config: &AppConfig) -> AttendanceResult<Self> {
        let minutes = config.attendance_token_ttl_minutes;
        let token_ttl = Duration::try_minutes(minutes).ok_or_else(|| {
            AttendanceError::Config(format!("credential lifetime out of range: {minutes} minutes"))
        })?;

        Ok(Self {
            secret: config.attendance_secret.clone(),
            token_ttl,
            utc_offset_minutes: config.attendance_utc_offset_minutes,
            frontend_url: config.frontend_url.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceCore {
    db: DatabaseConnection,
    codec: CredentialCodec,
    sessions: SessionManager,
    redemptions: RedemptionHandler,
    reports: ReportAggregator,
}

impl AttendanceCore {
    pub fn new(db: DatabaseConnection, settings: AttendanceSettings) -> AttendanceResult<Self> {
        if settings.secret.is_empty() {
            return Err(AttendanceError::Config("attendance secret must not be empty".into()));
        }
        if settings.token_ttl <= Duration::zero()
            || settings.token_ttl > Duration::days(MAX_TOKEN_TTL_DAYS)
        {
            return Err(AttendanceError::Config(format!(
                "credential lifetime must be between 1 second and {MAX_TOKEN_TTL_DAYS} days"
            )));
        }

        let codec = CredentialCodec::new(settings.secret.as_bytes(), settings.token_ttl);
        let calendar = SessionCalendar::from_offset_minutes(settings.utc_offset_minutes)?;
        let link_base: Option<Url> = settings
            .frontend_url
            .as_deref()
            .map(parse_link_base)
            .transpose()?;

        tracing::debug!(
            ttl_minutes = settings.token_ttl.num_minutes(),
            utc_offset_minutes = settings.utc_offset_minutes,
            links = link_base.is_some(),
            "attendance core ready"
        );

        Ok(Self {
            sessions: SessionManager::new(db.clone(), codec.clone(), calendar, link_base),
            redemptions: RedemptionHandler::new(db.clone(), codec.clone(), calendar),
            reports: ReportAggregator::new(db.clone()),
            codec,
            db,
        })
    }

    pub fn from_config(db: DatabaseConnection, config: &AppConfig) -> AttendanceResult<Self> {
        Self::new(db, AttendanceSettings::from_config(config)?)
    }

    pub async fn register_member(&self, new: NewMember) -> AttendanceResult<Member> {
        MemberService::register(&self.db, new).await
    }

    pub async fn create_course(&self, new: NewCourse) -> AttendanceResult<Course> {
        CourseService::create(&self.db, new).await
    }

    pub async fn enroll(&self, course_code: &str, member_id: i64) -> AttendanceResult<()> {
        CourseService::enroll(&self.db, course_code, member_id).await
    }

    pub async fn courses_for_member(&self, member_id: i64) -> AttendanceResult<Vec<Course>> {
        CourseService::courses_for_member(&self.db, member_id).await
    }

    pub async fn available_courses(&self, member_id: i64) -> AttendanceResult<Vec<Course>> {
        CourseService::available_courses(&self.db, member_id).await
    }

    pub async fn start_session(
        &self,
        course_code: &str,
        admin_id: i64,
        issuer_origin: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<SessionTicket> {
        self.sessions
            .start_session(course_code, admin_id, issuer_origin, now)
            .await
    }

    pub async fn redeem(
        &self,
        token: &str,
        member_id: i64,
        caller_origin: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<Redemption> {
        self.redemptions
            .redeem(token, member_id, caller_origin, now)
            .await
    }

    /// Decodes a credential without touching the store.
    pub fn inspect_credential(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<VerifiedCredential> {
        Ok(self.codec.verify(token, now)?)
    }

    pub async fn report_for_member(&self, member_id: i64) -> AttendanceResult<Vec<MemberCourseReport>> {
        self.reports.report_for_member(member_id).await
    }

    pub async fn report_for_course(&self, course_code: &str) -> AttendanceResult<CourseReport> {
        self.reports.report_for_course(course_code).await
    }

    pub async fn reports_for_owner(&self, owner_id: i64) -> AttendanceResult<Vec<CourseReport>> {
        self.reports.reports_for_owner(owner_id).await
    }
}
