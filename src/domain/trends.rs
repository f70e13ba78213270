//! Market-wide trend tracking
//!
//! Unlike investigations there is no resolution step: a category expands into metrics,
//! each backed by independent upstream calls that share the fan-out bounds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::domain::aggregate::{
    ecosystem_ids_for, fan_out, join_ids, FanOutLimits, LookupFuture,
};
use crate::domain::basic::{
    get_ecosystem_map, get_funding_rounds, get_hot_projects, get_job_changes, get_new_tokens,
    get_projects_by_ecosystem, get_projects_by_tags, get_tag_map, get_x_hot_projects,
    GetFundingRoundsTool, GetHotProjectsTool, GetJobChangesTool, GetProjectsByEcosystemTool,
    GetProjectsByTagsTool, GetXHotProjectsTool,
};
use crate::domain::report::{check_outcomes, LookupResult, PartialFailure};
use crate::domain::utils::{normalize_choice, require_text};
use crate::errors::AppError;
use crate::rootdata_client::RootDataApi;

#[macros::mcp_tool(
    name = "trackTrends",
    description = "Track market trends across projects, funding, and social metrics"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct TrackTrendsTool {
    /// Category to track: hot_projects, funding, social, job_changes, new_tokens, ecosystem, or all
    pub category: String,
    /// Time range for trends: 1d, 7d, 30d, or 3m (default: 7d)
    pub time_range: Option<String>,
    /// Filter by ecosystem name
    pub ecosystem: Option<String>,
    /// Filter by tag names, comma-separated
    pub tags: Option<String>,
    /// Minimum funding amount (USD)
    pub min_funding: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendFilter {
    pub ecosystem: Option<String>,
    pub tags: Option<String>,
    pub min_funding: Option<u64>,
}

/// Wire arguments for `trackTrends`: filters arrive either nested under `filter_by` or
/// at the top level. Nested values take precedence.
#[derive(Debug, Default, Deserialize)]
pub struct TrackTrendsParams {
    pub category: String,
    pub time_range: Option<String>,
    pub filter_by: Option<TrendFilter>,
    #[serde(flatten)]
    pub top_level: TrendFilter,
}

impl TrackTrendsParams {
    fn filter(&self) -> TrendFilter {
        let nested = self.filter_by.clone().unwrap_or_default();
        let non_blank = |value: Option<String>| {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        TrendFilter {
            ecosystem: non_blank(nested.ecosystem.or_else(|| self.top_level.ecosystem.clone())),
            tags: non_blank(nested.tags.or_else(|| self.top_level.tags.clone())),
            min_funding: nested.min_funding.or(self.top_level.min_funding),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    OneDay,
    SevenDays,
    ThirtyDays,
    ThreeMonths,
}

impl TimeRange {
    pub fn parse(value: Option<String>) -> Result<Self, AppError> {
        let range = normalize_choice(
            value,
            &["1d", "7d", "30d", "3m"],
            "7d",
            "invalid_time_range",
            "time_range",
        )?;

        Ok(match range.as_str() {
            "1d" => Self::OneDay,
            "30d" => Self::ThirtyDays,
            "3m" => Self::ThreeMonths,
            _ => Self::SevenDays,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
            Self::ThreeMonths => "3m",
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Self::OneDay => 1,
            Self::SevenDays => 7,
            Self::ThirtyDays => 30,
            Self::ThreeMonths => 90,
        }
    }

    /// Hot index only supports 1 to 7 days.
    fn hot_index_days(self) -> u32 {
        if self == Self::OneDay {
            1
        } else {
            7
        }
    }

    /// `yyyy-MM` bounds of the window ending at `now`.
    pub fn month_window(self, now: DateTime<Utc>) -> (String, String) {
        let start = now - Duration::days(self.days());
        (
            start.format("%Y-%m").to_string(),
            now.format("%Y-%m").to_string(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    HotProjects,
    Funding,
    Social,
    JobChanges,
    NewTokens,
    Ecosystem,
    TagProjects,
}

impl TrendMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HotProjects => "hot_projects",
            Self::Funding => "funding",
            Self::Social => "social",
            Self::JobChanges => "job_changes",
            Self::NewTokens => "new_tokens",
            Self::Ecosystem => "ecosystem",
            Self::TagProjects => "tag_projects",
        }
    }
}

impl fmt::Display for TrendMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TREND_CATEGORIES: [&str; 7] = [
    "hot_projects",
    "funding",
    "social",
    "job_changes",
    "new_tokens",
    "ecosystem",
    "all",
];

fn metrics_for(category: &str, filter: &TrendFilter) -> Vec<TrendMetric> {
    use TrendMetric::*;

    let mut metrics = match category {
        "hot_projects" => vec![HotProjects],
        "funding" => vec![Funding],
        "social" => vec![Social],
        "job_changes" => vec![JobChanges],
        "new_tokens" => vec![NewTokens],
        "ecosystem" => vec![Ecosystem],
        _ => vec![HotProjects, Funding, Social, JobChanges, NewTokens, Ecosystem],
    };

    if filter.tags.is_some() && matches!(category, "ecosystem" | "all") {
        metrics.push(TagProjects);
    }

    metrics
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub category: String,
    pub time_range: &'static str,
    pub metrics: BTreeMap<TrendMetric, LookupResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_failure: Option<PartialFailure>,
    pub summary: String,
}

pub async fn track_trends(
    api: &dyn RootDataApi,
    limits: FanOutLimits,
    params: TrackTrendsParams,
) -> Result<TrendReport, AppError> {
    track_trends_at(api, limits, params, Utc::now()).await
}

pub async fn track_trends_at(
    api: &dyn RootDataApi,
    limits: FanOutLimits,
    params: TrackTrendsParams,
    now: DateTime<Utc>,
) -> Result<TrendReport, AppError> {
    let filter = params.filter();
    let category = require_text(&params.category, "invalid_category", "category")?;
    let category = normalize_choice(
        Some(category),
        &TREND_CATEGORIES,
        "all",
        "invalid_category",
        "category",
    )?;
    let time_range = TimeRange::parse(params.time_range)?;

    let jobs = metrics_for(&category, &filter)
        .into_iter()
        .map(|metric| (metric, metric_lookup(api, metric, time_range, &filter, now)))
        .collect();
    let metrics: BTreeMap<TrendMetric, LookupResult> =
        fan_out(limits, jobs).await.into_iter().collect();
    let partial_failure = check_outcomes(&metrics)?;

    let retrieved = metrics.values().filter(|result| result.is_ok()).count();
    let mut summary = format!(
        "Trends for {category} over {}: {retrieved} of {} metrics retrieved",
        time_range.as_str(),
        metrics.len()
    );
    if let Some(partial) = &partial_failure {
        summary.push_str(&format!("\nUnavailable: {}", partial.failed.join(", ")));
    }

    info!(
        category = %category,
        time_range = time_range.as_str(),
        metrics = metrics.len(),
        partial = partial_failure.is_some(),
        "trends tracked"
    );

    Ok(TrendReport {
        category,
        time_range: time_range.as_str(),
        metrics,
        partial_failure,
        summary,
    })
}

fn metric_lookup<'a>(
    api: &'a dyn RootDataApi,
    metric: TrendMetric,
    time_range: TimeRange,
    filter: &'a TrendFilter,
    now: DateTime<Utc>,
) -> LookupFuture<'a> {
    match metric {
        TrendMetric::HotProjects => get_hot_projects(
            api,
            GetHotProjectsTool {
                days: time_range.hot_index_days(),
            },
        )
        .boxed(),
        TrendMetric::Funding => {
            let (start_time, end_time) = time_range.month_window(now);
            get_funding_rounds(
                api,
                GetFundingRoundsTool {
                    start_time: Some(start_time),
                    end_time: Some(end_time),
                    min_amount: filter.min_funding,
                    ..Default::default()
                },
            )
            .boxed()
        }
        TrendMetric::Social => get_x_hot_projects(api, GetXHotProjectsTool::default()).boxed(),
        TrendMetric::JobChanges => get_job_changes(api, GetJobChangesTool::default()).boxed(),
        TrendMetric::NewTokens => get_new_tokens(api).boxed(),
        TrendMetric::Ecosystem => ecosystem_trend(api, filter.ecosystem.as_deref()).boxed(),
        TrendMetric::TagProjects => {
            tag_projects(api, filter.tags.as_deref().unwrap_or_default()).boxed()
        }
    }
}

async fn ecosystem_trend(
    api: &dyn RootDataApi,
    ecosystem: Option<&str>,
) -> Result<Value, AppError> {
    let map = get_ecosystem_map(api).await?;
    let Some(ecosystem) = ecosystem else {
        return Ok(json!({ "map": map }));
    };

    let ids = ecosystem_ids_for(&map, &[ecosystem.to_string()]);
    let Some(id) = ids.first() else {
        return Ok(json!({ "map": map, "projects": null }));
    };

    let projects = get_projects_by_ecosystem(
        api,
        GetProjectsByEcosystemTool {
            ecosystem_ids: id.to_string(),
        },
    )
    .await?;

    Ok(json!({ "map": map, "projects": projects }))
}

async fn tag_projects(api: &dyn RootDataApi, tags: &str) -> Result<Value, AppError> {
    let wanted: Vec<&str> = tags
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect();

    let tag_map = get_tag_map(api).await?;
    let matched: Vec<(i64, String)> = tag_map
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|tag| {
            let id = tag
                .get("id")
                .or_else(|| tag.get("tag_id"))
                .and_then(Value::as_i64)?;
            let name = tag
                .get("name")
                .or_else(|| tag.get("tag_name"))
                .and_then(Value::as_str)?;
            wanted
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(name))
                .then(|| (id, name.to_string()))
        })
        .collect();

    if matched.is_empty() {
        return Ok(json!({ "tags": [], "projects": [] }));
    }

    let ids: Vec<i64> = matched.iter().map(|(id, _)| *id).collect();
    let names: Vec<&str> = matched.iter().map(|(_, name)| name.as_str()).collect();
    let projects = get_projects_by_tags(
        api,
        GetProjectsByTagsTool {
            tag_ids: join_ids(&ids),
        },
    )
    .await?;

    Ok(json!({ "tags": names, "projects": projects }))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::rootdata_client::Endpoint;
    use crate::test_support::{sample_universe, FakeRootData};

    fn params(value: Value) -> TrackTrendsParams {
        serde_json::from_value(value).expect("valid trend params")
    }

    fn march_tenth() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[tokio::test]
    async fn funding_window_follows_time_range() {
        let api = FakeRootData::new(sample_universe);

        let report = track_trends_at(
            &api,
            FanOutLimits::default(),
            params(json!({"category": "funding", "time_range": "30d", "min_funding": 5000000})),
            march_tenth(),
        )
        .await
        .expect("trends should succeed");

        assert!(report.metrics[&TrendMetric::Funding].is_ok());
        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Endpoint::FundingRounds);
        assert_eq!(calls[0].1["start_time"], "2024-02");
        assert_eq!(calls[0].1["end_time"], "2024-03");
        assert_eq!(calls[0].1["min_amount"], 5000000);
    }

    #[tokio::test]
    async fn all_category_reports_every_metric() {
        let api = FakeRootData::new(sample_universe);

        let report = track_trends_at(
            &api,
            FanOutLimits::default(),
            params(json!({"category": "all", "time_range": "1d"})),
            march_tenth(),
        )
        .await
        .expect("trends should succeed");

        let keys: Vec<TrendMetric> = report.metrics.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                TrendMetric::HotProjects,
                TrendMetric::Funding,
                TrendMetric::Social,
                TrendMetric::JobChanges,
                TrendMetric::NewTokens,
                TrendMetric::Ecosystem
            ]
        );
        let hot_call = api
            .calls()
            .into_iter()
            .find(|(endpoint, _)| *endpoint == Endpoint::HotIndex)
            .expect("hot index call");
        assert_eq!(hot_call.1["days"], 1);
    }

    #[tokio::test]
    async fn nested_filter_drives_ecosystem_and_tag_lookups() {
        let api = FakeRootData::new(sample_universe);

        let report = track_trends_at(
            &api,
            FanOutLimits::default(),
            params(json!({
                "category": "ecosystem",
                "filter_by": {"ecosystem": "solana", "tags": "defi"}
            })),
            march_tenth(),
        )
        .await
        .expect("trends should succeed");

        let ecosystem = report.metrics[&TrendMetric::Ecosystem]
            .data()
            .expect("ecosystem data");
        assert!(ecosystem["projects"].is_array());
        let tags = report.metrics[&TrendMetric::TagProjects]
            .data()
            .expect("tag data");
        assert_eq!(tags["tags"], json!(["DeFi"]));

        let calls = api.calls();
        assert!(calls.iter().any(|(endpoint, params)| {
            *endpoint == Endpoint::ProjectsByEcosystems && params["ecosystem_ids"] == "53"
        }));
        assert!(calls.iter().any(|(endpoint, params)| {
            *endpoint == Endpoint::ProjectsByTags && params["tag_ids"] == "100"
        }));
    }

    #[tokio::test]
    async fn failed_metric_is_isolated() {
        let api = FakeRootData::new(|endpoint, params| match endpoint {
            Endpoint::NewTokens => Err(AppError::upstream(403, "plan does not include endpoint")),
            _ => sample_universe(endpoint, params),
        });

        let report = track_trends_at(
            &api,
            FanOutLimits::default(),
            params(json!({"category": "all"})),
            march_tenth(),
        )
        .await
        .expect("partial trends should succeed");

        assert!(!report.metrics[&TrendMetric::NewTokens].is_ok());
        assert!(report.metrics[&TrendMetric::HotProjects].is_ok());
        let partial = report.partial_failure.expect("partial marker");
        assert_eq!(partial.failed, vec!["new_tokens".to_string()]);
    }

    #[tokio::test]
    async fn rejects_unknown_time_range() {
        let api = FakeRootData::new(sample_universe);

        let error = track_trends_at(
            &api,
            FanOutLimits::default(),
            params(json!({"category": "funding", "time_range": "1y"})),
            march_tenth(),
        )
        .await
        .expect_err("expected validation error");

        assert_eq!(error.code(), "invalid_time_range");
        assert!(api.calls().is_empty());
    }
}
