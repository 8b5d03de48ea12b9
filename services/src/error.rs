use chrono::NaiveDate;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use validator::ValidationErrors;

use crate::credential::CredentialError;

pub type AttendanceResult<T> = Result<T, AttendanceError>;

/// Failures surfaced by the attendance core.
///
/// Outcomes a member can act on without re-acquiring a credential (wrong
/// network, already marked) are not errors; see [`crate::redemption::Redemption`].
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("Course not found: {0}")]
    CourseNotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(i64),

    #[error("Member {member_id} does not own course {course_code}")]
    NotOwner { member_id: i64, course_code: String },

    #[error("Member {0} is not a learner")]
    NotALearner(i64),

    #[error("Member {0} is not an administrator")]
    NotAnAdministrator(i64),

    #[error("Course code already in use: {0}")]
    DuplicateCourse(String),

    #[error("A member with this handle, email, phone or roll number already exists")]
    DuplicateMember,

    #[error("Member {member_id} is already enrolled in {course_code}")]
    AlreadyEnrolled { member_id: i64, course_code: String },

    #[error("Attendance not started yet for {course_code} on {date}")]
    SessionNotStarted { course_code: String, date: NaiveDate },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Coarse grouping callers map to their own transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Forbidden,
    InvalidCredential,
    SessionNotStarted,
    Invalid,
    Internal,
}

impl AttendanceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AttendanceError::CourseNotFound(_) | AttendanceError::MemberNotFound(_) => {
                ErrorCategory::NotFound
            }
            AttendanceError::DuplicateCourse(_)
            | AttendanceError::DuplicateMember
            | AttendanceError::AlreadyEnrolled { .. } => ErrorCategory::Conflict,
            AttendanceError::NotOwner { .. }
            | AttendanceError::NotALearner(_)
            | AttendanceError::NotAnAdministrator(_) => ErrorCategory::Forbidden,
            AttendanceError::Credential(CredentialError::Signing(_)) => ErrorCategory::Internal,
            AttendanceError::Credential(_) => ErrorCategory::InvalidCredential,
            AttendanceError::SessionNotStarted { .. } => ErrorCategory::SessionNotStarted,
            AttendanceError::Validation(_) => ErrorCategory::Invalid,
            AttendanceError::Config(_) | AttendanceError::Database(_) => ErrorCategory::Internal,
        }
    }
}

impl From<ValidationErrors> for AttendanceError {
    fn from(errors: ValidationErrors) -> Self {
        AttendanceError::Validation(format_validation_errors(&errors))
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .values()
        .flat_map(|errs| {
            errs.iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
