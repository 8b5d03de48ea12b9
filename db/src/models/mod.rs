pub mod attendance_record;
pub mod course;
pub mod course_enrollment;
pub mod member;

pub use attendance_record::Entity as AttendanceRecord;
pub use course::Entity as Course;
pub use course_enrollment::Entity as CourseEnrollment;
pub use member::Entity as Member;
