pub(crate) mod attempts;
pub(crate) mod exam_questions;
pub(crate) mod exams;
pub(crate) mod questions;
pub(crate) mod users;
