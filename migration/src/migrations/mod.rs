pub mod m202510160001_create_members;
pub mod m202510160002_create_courses;
pub mod m202510160003_create_course_enrollments;
pub mod m202510160004_create_attendance_records;
