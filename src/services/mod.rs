pub mod access_window;
pub mod attempt_grader;
pub mod attempt_ledger;
pub mod course_access;
pub mod feedback;
pub mod grading;
pub mod test_service;
