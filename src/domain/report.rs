//! Request-scoped entity and report types shared by the aggregation tools.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Investor,
    Person,
}

impl EntityKind {
    pub fn from_upstream_type(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Project),
            2 => Some(Self::Investor),
            3 => Some(Self::Person),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Investor => "investor",
            Self::Person => "person",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Investor => "VC/Organization",
            Self::Person => "Person",
        }
    }

    /// Parses a declared kind; `auto` (or absent) means no constraint.
    pub fn parse_filter(value: Option<&str>) -> Result<Option<Self>, AppError> {
        match value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            None | Some("auto") => Ok(None),
            Some("project") => Ok(Some(Self::Project)),
            Some("investor") => Ok(Some(Self::Investor)),
            Some("person") => Ok(Some(Self::Person)),
            _ => Err(AppError::bad_request(
                "invalid_entity_type",
                "entity_type must be one of: project, investor, person, auto",
            )),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search hit, resolved to an id and kind.
#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    pub id: i64,
    pub kind: EntityKind,
    pub name: String,
    pub search_hit: Value,
}

impl EntityRef {
    /// Builds a reference from a `ser_inv` hit; hits without id, known type or name are skipped.
    pub fn from_search_hit(hit: &Value) -> Option<Self> {
        let id = hit.get("id").and_then(Value::as_i64)?;
        let kind = hit
            .get("type")
            .and_then(Value::as_i64)
            .and_then(EntityKind::from_upstream_type)?;
        let name = hit.get("name").and_then(Value::as_str)?.trim().to_string();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            id,
            kind,
            name,
            search_hit: hit.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Profile,
    Funding,
    Team,
    Social,
    Investments,
    Ecosystem,
    Portfolio,
    RecentInvestments,
    Ranking,
    JobChanges,
    HotIndex,
    NewTokens,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Self::Profile,
        Self::Funding,
        Self::Team,
        Self::Social,
        Self::Investments,
        Self::Ecosystem,
        Self::Portfolio,
        Self::RecentInvestments,
        Self::Ranking,
        Self::JobChanges,
        Self::HotIndex,
        Self::NewTokens,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Funding => "funding",
            Self::Team => "team",
            Self::Social => "social",
            Self::Investments => "investments",
            Self::Ecosystem => "ecosystem",
            Self::Portfolio => "portfolio",
            Self::RecentInvestments => "recent_investments",
            Self::Ranking => "ranking",
            Self::JobChanges => "job_changes",
            Self::HotIndex => "hot_index",
            Self::NewTokens => "new_tokens",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
    }

    pub fn applies_to(self, kind: EntityKind) -> bool {
        match self {
            Self::Profile | Self::NewTokens => true,
            Self::Funding | Self::Social | Self::Investments | Self::Ecosystem | Self::HotIndex => {
                kind == EntityKind::Project
            }
            Self::Team => matches!(kind, EntityKind::Project | EntityKind::Investor),
            Self::Portfolio | Self::RecentInvestments => kind == EntityKind::Investor,
            Self::Ranking | Self::JobChanges => kind == EntityKind::Person,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMarker {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl From<&AppError> for ErrorMarker {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.public_message(),
            upstream_status: error.upstream_status(),
        }
    }
}

/// Outcome of one category call: the upstream payload or an explicit failure marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupResult {
    Ok { data: Value },
    Error { error: ErrorMarker },
}

impl LookupResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Ok { data } => Some(data),
            Self::Error { .. } => None,
        }
    }
}

impl From<Result<Value, AppError>> for LookupResult {
    fn from(result: Result<Value, AppError>) -> Self {
        match result {
            Ok(data) => Self::Ok { data },
            Err(error) => Self::Error {
                error: ErrorMarker::from(&error),
            },
        }
    }
}

/// Informational marker for a report where some, but not all, keys failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialFailure {
    pub code: &'static str,
    pub failed: Vec<String>,
    pub message: String,
}

/// Checks a keyed set of lookups: fails when every key failed, flags a partial failure otherwise.
pub fn check_outcomes<K>(
    results: &BTreeMap<K, LookupResult>,
) -> Result<Option<PartialFailure>, AppError>
where
    K: fmt::Display,
{
    let failed: Vec<String> = results
        .iter()
        .filter(|(_, result)| !result.is_ok())
        .map(|(key, _)| key.to_string())
        .collect();

    if failed.is_empty() {
        return Ok(None);
    }

    if failed.len() == results.len() {
        return Err(AppError::aggregation_failed(format!(
            "all {} upstream lookups failed: {}",
            failed.len(),
            failed.join(", ")
        )));
    }

    Ok(Some(PartialFailure {
        code: "partial_aggregation",
        message: format!("{} of {} lookups failed", failed.len(), results.len()),
        failed,
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregatedReport {
    pub entity: EntityRef,
    pub categories: BTreeMap<Category, LookupResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_failure: Option<PartialFailure>,
    pub summary: String,
}
