use std::borrow::Cow;

use db::models::member::{self, MemberKind};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::{is_unique_violation, AttendanceError, AttendanceResult};

pub use db::models::member::Model as Member;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMember {
    #[validate(length(min = 1, max = 64, message = "Handle must be 1 to 64 characters"))]
    pub handle: String,

    #[validate(length(min = 1, max = 128, message = "Name must be 1 to 128 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 3, max = 32, message = "Phone must be 3 to 32 characters"))]
    pub phone: String,

    #[validate(custom(function = "validate_kind"))]
    #[serde(flatten)]
    pub kind: MemberKind,
}

fn validate_kind(kind: &MemberKind) -> Result<(), ValidationError> {
    match kind {
        MemberKind::Learner { roll_number } if roll_number.trim().is_empty() => {
            Err(ValidationError::new("roll_number")
                .with_message(Cow::Borrowed("Learners must have a roll number")))
        }
        _ => Ok(()),
    }
}

pub struct MemberService;

impl MemberService {
    /// Registers a learner or administrator.
    pub async fn register(db: &DatabaseConnection, new: NewMember) -> AttendanceResult<Member> {
        new.validate()?;

        let kind = match new.kind {
            MemberKind::Learner { roll_number } => MemberKind::Learner {
                roll_number: roll_number.trim().to_owned(),
            },
            MemberKind::Administrator => MemberKind::Administrator,
        };

        member::Model::create(
            db,
            new.handle.trim(),
            new.name.trim(),
            new.email.trim(),
            new.phone.trim(),
            &kind,
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AttendanceError::DuplicateMember
            } else {
                AttendanceError::Database(e)
            }
        })
        .inspect(|m| tracing::info!(member_id = m.id, role = %m.role, "member registered"))
    }

    pub async fn get(db: &DatabaseConnection, member_id: i64) -> AttendanceResult<Member> {
        member::Model::find_by_id(db, member_id)
            .await?
            .ok_or(AttendanceError::MemberNotFound(member_id))
    }
}
