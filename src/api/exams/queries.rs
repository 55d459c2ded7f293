use serde::Deserialize;
use time::OffsetDateTime;

use crate::db::types::ExamStatus;
use crate::schemas::exam::deserialize_option_offset_datetime_flexible;

#[derive(Debug, Deserialize)]
pub(super) struct ListExamsQuery {
    #[serde(default)]
    pub(super) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(super) limit: i64,
    #[serde(default)]
    pub(super) title: Option<String>,
    #[serde(default)]
    pub(super) status: Option<ExamStatus>,
    #[serde(
        default,
        alias = "startDate",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(super) start_date: Option<OffsetDateTime>,
    #[serde(
        default,
        alias = "endDate",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(super) end_date: Option<OffsetDateTime>,
    #[serde(default)]
    #[serde(alias = "createdBy")]
    pub(super) created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListAttemptsQuery {
    #[serde(default)]
    pub(super) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(super) limit: i64,
}
