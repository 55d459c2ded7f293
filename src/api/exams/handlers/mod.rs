mod create;
mod list;
mod manage;

pub(super) use create::{create_exam, duplicate_exam};
pub(super) use list::{list_exam_attempts, list_exams, list_statuses};
pub(super) use manage::{
    archive_exam, delete_exam, get_exam, publish_exam, unpublish_exam, update_exam,
};
