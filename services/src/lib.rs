//! Attendance core: course membership, daily sessions, credential redemption
//! and reporting over a sea-orm store.

pub mod attendance;
pub mod attendance_session;
pub mod calendar;
pub mod course_service;
pub mod credential;
pub mod error;
pub mod member_service;
pub mod origin;
pub mod redemption;
pub mod report;

pub use attendance::{AttendanceCore, AttendanceSettings};
pub use attendance_session::{SessionManager, SessionTicket};
pub use error::{AttendanceError, AttendanceResult, ErrorCategory};
pub use redemption::{Redemption, RedemptionHandler};
pub use report::ReportAggregator;
