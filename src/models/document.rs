//! Document entity model
//!
//! This module contains the SeaORM entity model for the documents table,
//! which holds one row per submitted portal form, and the status/form-type
//! vocabulary used when updating it.

use std::fmt;
use std::str::FromStr;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// Document entity representing one submitted form
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    /// Internal document identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Form the document was submitted from (see [`FormType`])
    pub form_type: String,

    /// Lifecycle status; usually a [`DocumentStatus`] but workflow results may
    /// store other values verbatim
    pub status: String,

    /// Signing-platform submission this document is linked to
    pub submission_id: Option<String>,

    /// Raw form payload as posted by the portal
    #[sea_orm(column_type = "JsonBinary")]
    pub form_data: Option<JsonValue>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Portal form a document originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FormType {
    InsuranceVerification,
    Onboarding,
    Order,
    Agreement,
}

impl FormType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FormType::InsuranceVerification => "insurance-verification",
            FormType::Onboarding => "onboarding",
            FormType::Order => "order",
            FormType::Agreement => "agreement",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "insurance-verification" => Ok(FormType::InsuranceVerification),
            "onboarding" => Ok(FormType::Onboarding),
            "order" => Ok(FormType::Order),
            "agreement" => Ok(FormType::Agreement),
            other => Err(format!("unknown form type '{}'", other)),
        }
    }
}

/// Known document statuses, ordered by lifecycle progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Viewed,
    Completed,
}

impl DocumentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Viewed => "viewed",
            DocumentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(DocumentStatus::Pending),
            "viewed" => Ok(DocumentStatus::Viewed),
            "completed" => Ok(DocumentStatus::Completed),
            other => Err(format!("unknown document status '{}'", other)),
        }
    }
}

/// Outcome of comparing a stored status with a requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the requested status
    Apply,
    /// Requested status equals the stored one; nothing to write
    Unchanged,
    /// Requested status is behind the stored one in the lifecycle
    Regression,
}

impl Transition {
    /// Decides how to move from `current` to `requested`.
    ///
    /// Only pairs of known statuses are ordered. Statuses outside
    /// [`DocumentStatus`] are applied as given, and a known status may replace
    /// an unknown one.
    pub fn between(current: &str, requested: &str) -> Self {
        if current == requested {
            return Transition::Unchanged;
        }
        match (
            current.parse::<DocumentStatus>(),
            requested.parse::<DocumentStatus>(),
        ) {
            (Ok(current), Ok(requested)) if requested < current => Transition::Regression,
            _ => Transition::Apply,
        }
    }
}
