//! Multi-call orchestration for entity investigations
//!
//! An investigation resolves a name to one entity, expands a scope into categories and
//! issues one independent lookup per category. Lookups run concurrently with a bounded
//! fan-out; each failure is recorded under its own key and never aborts its siblings.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::domain::basic::{
    get_ecosystem_map, get_funding_rounds, get_hot_projects, get_investors, get_job_changes,
    get_new_tokens, get_org, get_people, get_project, get_projects_by_ecosystem,
    get_x_hot_projects, get_x_popular_figures, search_entities, GetFundingRoundsTool,
    GetHotProjectsTool, GetInvestorsTool, GetJobChangesTool, GetOrgTool, GetPeopleTool,
    GetProjectTool, GetProjectsByEcosystemTool, GetXHotProjectsTool, GetXPopularFiguresTool,
    SearchEntitiesTool,
};
use crate::domain::report::{
    check_outcomes, AggregatedReport, Category, EntityKind, EntityRef, LookupResult,
};
use crate::domain::utils::{normalize_choice, require_text};
use crate::errors::AppError;
use crate::rootdata_client::RootDataApi;

const RANKING_PAGE_SIZE: u32 = 100;
const SOCIAL_RANKINGS: [&str; 3] = ["heat", "influence", "followers"];

#[macros::mcp_tool(
    name = "investigateEntity",
    description = "Deep dive into a specific entity with all related information"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct InvestigateEntityTool {
    /// Name of the project, investor, or person
    pub entity_name: String,
    /// Type of entity: project, investor, person, or auto (default: auto)
    pub entity_type: Option<String>,
    /// What aspects to investigate: basic, funding, team, social, ecosystem, or all (default: basic)
    pub investigation_scope: Option<String>,
}

#[macros::mcp_tool(
    name = "analyzeComprehensive",
    description = "Comprehensive analysis combining multiple RootData endpoints for a holistic view"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct AnalyzeComprehensiveTool {
    /// Natural language query about crypto projects, investors, or trends
    pub query: String,
    /// Type of analysis: project, investor, ecosystem, trends, fundraising, or comprehensive (default: comprehensive)
    pub analysis_type: Option<String>,
    /// Time period for analysis (e.g., '1d', '7d', '30d', '2024-01')
    pub timeframe: Option<String>,
    /// Level of detail: basic, detailed, or full (default: detailed)
    pub depth: Option<String>,
    /// Include related entities in the analysis (default: false)
    pub include_related: Option<bool>,
}

/// Bounds applied to every fan-out of independent upstream calls.
#[derive(Debug, Clone, Copy)]
pub struct FanOutLimits {
    pub max_concurrency: usize,
    pub call_timeout: Duration,
}

impl Default for FanOutLimits {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            call_timeout: Duration::from_secs(30),
        }
    }
}

pub type LookupFuture<'a> = BoxFuture<'a, Result<Value, AppError>>;

/// Runs independent jobs with bounded concurrency, each under the per-call timeout.
/// Results come back in job order, whatever order the calls complete in.
///
/// The stream is boxed here so callers holding it across an await stay `Send`.
pub fn run_bounded<'a, K, T>(
    limits: FanOutLimits,
    jobs: Vec<(K, BoxFuture<'a, Result<T, AppError>>)>,
) -> BoxFuture<'a, Vec<(K, Result<T, AppError>)>>
where
    K: fmt::Display + Send + 'a,
    T: Send + 'a,
{
    stream::iter(jobs)
        .map(move |(key, job)| async move {
            let outcome = match tokio::time::timeout(limits.call_timeout, job).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AppError::upstream(504, "upstream call timed out")),
            };
            if let Err(err) = &outcome {
                warn!(lookup = %key, error = %err, "lookup failed");
            }
            (key, outcome)
        })
        .buffered(limits.max_concurrency.max(1))
        .collect()
        .boxed()
}

/// Like [`run_bounded`], recording each outcome as a lookup result.
pub async fn fan_out<'a, K>(
    limits: FanOutLimits,
    jobs: Vec<(K, LookupFuture<'a>)>,
) -> Vec<(K, LookupResult)>
where
    K: fmt::Display + Send + 'a,
{
    run_bounded(limits, jobs)
        .await
        .into_iter()
        .map(|(key, outcome)| (key, LookupResult::from(outcome)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestigationScope {
    Basic,
    Funding,
    Team,
    Social,
    Ecosystem,
    All,
}

impl InvestigationScope {
    pub fn parse(value: Option<String>) -> Result<Self, AppError> {
        let scope = normalize_choice(
            value,
            &["basic", "funding", "team", "social", "ecosystem", "all"],
            "basic",
            "invalid_investigation_scope",
            "investigation_scope",
        )?;

        Ok(match scope.as_str() {
            "funding" => Self::Funding,
            "team" => Self::Team,
            "social" => Self::Social,
            "ecosystem" => Self::Ecosystem,
            "all" => Self::All,
            _ => Self::Basic,
        })
    }

    /// Scopes that do not apply to a kind collapse to its profile.
    pub fn categories(self, kind: EntityKind) -> Vec<Category> {
        use Category::*;

        match (self, kind) {
            (Self::Funding, EntityKind::Project) => vec![Profile, Funding, Investments],
            (Self::Funding, EntityKind::Investor) => vec![Profile, Portfolio, RecentInvestments],
            (Self::Team, EntityKind::Project | EntityKind::Investor) => vec![Profile, Team],
            (Self::Social, EntityKind::Project) => vec![Profile, Social],
            (Self::Social, EntityKind::Person) => vec![Profile, Ranking],
            (Self::Ecosystem, EntityKind::Project) => vec![Profile, Ecosystem],
            (Self::All, EntityKind::Project) => {
                vec![Profile, Funding, Team, Social, Investments, Ecosystem]
            }
            (Self::All, EntityKind::Investor) => {
                vec![Profile, Team, Portfolio, RecentInvestments]
            }
            (Self::All, EntityKind::Person) => vec![Profile, Ranking],
            _ => vec![Profile],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    Project,
    Investor,
    Ecosystem,
    Trends,
    Fundraising,
    Comprehensive,
}

impl AnalysisType {
    pub fn parse(value: Option<String>) -> Result<Self, AppError> {
        let analysis = normalize_choice(
            value,
            &[
                "project",
                "investor",
                "ecosystem",
                "trends",
                "fundraising",
                "comprehensive",
            ],
            "comprehensive",
            "invalid_analysis_type",
            "analysis_type",
        )?;

        Ok(match analysis.as_str() {
            "project" => Self::Project,
            "investor" => Self::Investor,
            "ecosystem" => Self::Ecosystem,
            "trends" => Self::Trends,
            "fundraising" => Self::Fundraising,
            _ => Self::Comprehensive,
        })
    }

    pub fn kind_filter(self) -> Option<EntityKind> {
        match self {
            Self::Project => Some(EntityKind::Project),
            Self::Investor => Some(EntityKind::Investor),
            _ => None,
        }
    }

    pub fn categories(self, kind: EntityKind, include_related: bool) -> Vec<Category> {
        use Category::*;

        let mut categories = match (self, kind) {
            (Self::Comprehensive, EntityKind::Project) => vec![
                Profile,
                Funding,
                Team,
                Social,
                Investments,
                HotIndex,
                NewTokens,
            ],
            (Self::Comprehensive, EntityKind::Investor) => {
                vec![Profile, Team, Portfolio, RecentInvestments, NewTokens]
            }
            (Self::Comprehensive, EntityKind::Person) => vec![Profile, Ranking, NewTokens],
            (Self::Fundraising, EntityKind::Project) => vec![Profile, Funding, Investments],
            (Self::Fundraising, EntityKind::Investor) => {
                vec![Profile, Portfolio, RecentInvestments]
            }
            (Self::Trends, EntityKind::Project) => vec![Profile, Social, HotIndex],
            (Self::Ecosystem, EntityKind::Project) => vec![Profile, Ecosystem],
            _ => vec![Profile],
        };

        if include_related {
            let related = match kind {
                EntityKind::Project => Some(Ecosystem),
                EntityKind::Person => Some(JobChanges),
                EntityKind::Investor => None,
            };
            if let Some(related) = related.filter(|category| !categories.contains(category)) {
                categories.push(related);
            }
        }

        categories
    }
}

/// Per-request knobs for category lookups.
#[derive(Debug, Clone, Copy)]
pub struct CategoryOptions {
    pub detailed: bool,
    pub hot_index_days: u32,
}

impl Default for CategoryOptions {
    fn default() -> Self {
        Self {
            detailed: true,
            hot_index_days: 7,
        }
    }
}

/// Resolves a name to one entity.
///
/// Hits are optionally filtered by kind. Among the remaining candidates an exact
/// case-sensitive name match wins, then an exact case-insensitive match, then the first
/// hit in upstream order. Zero candidates is an `EntityNotFound` error.
pub async fn resolve_entity(
    api: &dyn RootDataApi,
    name: &str,
    kind: Option<EntityKind>,
) -> Result<EntityRef, AppError> {
    let hits = search_entities(
        api,
        SearchEntitiesTool {
            query: name.to_string(),
            precise_x_search: None,
        },
    )
    .await?;

    let hits = match hits {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        _ => return Err(AppError::malformed("search results must be a list")),
    };

    let candidates = hits
        .iter()
        .filter_map(EntityRef::from_search_hit)
        .filter(|candidate| kind.map_or(true, |kind| candidate.kind == kind))
        .collect();

    select_candidate(name, candidates).ok_or_else(|| AppError::entity_not_found(name.trim()))
}

pub fn select_candidate(query: &str, candidates: Vec<EntityRef>) -> Option<EntityRef> {
    let query = query.trim();
    let folded_query = query.to_lowercase();

    let index = candidates
        .iter()
        .position(|candidate| candidate.name == query)
        .or_else(|| {
            candidates
                .iter()
                .position(|candidate| candidate.name.to_lowercase() == folded_query)
        })
        .unwrap_or(0);

    candidates.into_iter().nth(index)
}

/// Performs the upstream work for one category of one entity.
pub async fn fetch_category(
    api: &dyn RootDataApi,
    entity: &EntityRef,
    category: Category,
    options: CategoryOptions,
) -> Result<Value, AppError> {
    if !category.applies_to(entity.kind) {
        return Err(AppError::bad_request(
            "not_applicable",
            format!("{category} does not apply to a {}", entity.kind),
        ));
    }

    match (category, entity.kind) {
        (Category::Profile, EntityKind::Project) => {
            get_project(
                api,
                GetProjectTool {
                    project_id: entity.id,
                    include_team: Some(options.detailed),
                    include_investors: Some(options.detailed),
                },
            )
            .await
        }
        (Category::Profile, EntityKind::Investor) => {
            get_org(
                api,
                GetOrgTool {
                    org_id: entity.id,
                    include_team: Some(options.detailed),
                    include_investments: Some(options.detailed),
                },
            )
            .await
        }
        (Category::Profile, EntityKind::Person) => {
            get_people(
                api,
                GetPeopleTool {
                    people_id: entity.id,
                },
            )
            .await
        }
        (Category::Funding, _) => {
            get_funding_rounds(
                api,
                GetFundingRoundsTool {
                    project_id: Some(entity.id),
                    ..Default::default()
                },
            )
            .await
        }
        (Category::Team, EntityKind::Project) => get_project(
            api,
            GetProjectTool {
                project_id: entity.id,
                include_team: Some(true),
                include_investors: None,
            },
        )
        .await
        .map(|profile| take_field(profile, "team_members")),
        (Category::Team, _) => get_org(
            api,
            GetOrgTool {
                org_id: entity.id,
                include_team: Some(true),
                include_investments: None,
            },
        )
        .await
        .map(|profile| take_field(profile, "team_members")),
        (Category::Investments, _) => get_project(
            api,
            GetProjectTool {
                project_id: entity.id,
                include_team: None,
                include_investors: Some(true),
            },
        )
        .await
        .map(|profile| take_field(profile, "investors")),
        (Category::Social, _) => get_x_hot_projects(api, GetXHotProjectsTool::default())
            .await
            .map(|rankings| social_entries(&rankings, entity.id)),
        (Category::Ecosystem, _) => related_ecosystem_projects(api, entity.id).await,
        (Category::Portfolio, _) => get_org(
            api,
            GetOrgTool {
                org_id: entity.id,
                include_team: None,
                include_investments: Some(true),
            },
        )
        .await
        .map(|profile| take_field(profile, "investments")),
        (Category::RecentInvestments, _) => get_investors(
            api,
            GetInvestorsTool {
                page: Some(1),
                page_size: Some(RANKING_PAGE_SIZE),
            },
        )
        .await
        .map(|investors| find_entry(&investors, "invest_id", entity.id)),
        (Category::Ranking, _) => get_x_popular_figures(
            api,
            GetXPopularFiguresTool {
                page: Some(1),
                page_size: Some(RANKING_PAGE_SIZE),
                rank_type: "heat".to_string(),
            },
        )
        .await
        .map(|figures| find_entry(&figures, "people_id", entity.id)),
        (Category::JobChanges, _) => get_job_changes(api, GetJobChangesTool::default()).await,
        (Category::HotIndex, _) => get_hot_projects(
            api,
            GetHotProjectsTool {
                days: options.hot_index_days,
            },
        )
        .await
        .map(|hot| find_entry(&hot, "project_id", entity.id)),
        (Category::NewTokens, _) => get_new_tokens(api).await,
    }
}

/// Looks up every category of one entity; keys are exactly the requested categories.
pub async fn collect_categories(
    api: &dyn RootDataApi,
    limits: FanOutLimits,
    entity: &EntityRef,
    categories: &[Category],
    options: CategoryOptions,
) -> BTreeMap<Category, LookupResult> {
    let jobs = categories
        .iter()
        .map(|&category| (category, fetch_category(api, entity, category, options).boxed()))
        .collect();

    fan_out(limits, jobs).await.into_iter().collect()
}

pub async fn investigate_entity(
    api: &dyn RootDataApi,
    limits: FanOutLimits,
    args: InvestigateEntityTool,
) -> Result<AggregatedReport, AppError> {
    let name = require_text(&args.entity_name, "invalid_entity_name", "entity_name")?;
    let kind = EntityKind::parse_filter(args.entity_type.as_deref())?;
    let scope = InvestigationScope::parse(args.investigation_scope)?;

    let entity = resolve_entity(api, &name, kind).await?;
    let categories = scope.categories(entity.kind);
    let results =
        collect_categories(api, limits, &entity, &categories, CategoryOptions::default()).await;
    let partial_failure = check_outcomes(&results)?;
    let summary = investigation_summary(&entity, &results);

    info!(
        entity = %entity.name,
        kind = %entity.kind,
        categories = results.len(),
        partial = partial_failure.is_some(),
        "entity investigated"
    );

    Ok(AggregatedReport {
        entity,
        categories: results,
        partial_failure,
        summary,
    })
}

pub async fn analyze_comprehensive(
    api: &dyn RootDataApi,
    limits: FanOutLimits,
    args: AnalyzeComprehensiveTool,
) -> Result<AggregatedReport, AppError> {
    let query = require_text(&args.query, "invalid_query", "query")?;
    let analysis = AnalysisType::parse(args.analysis_type)?;
    let depth = normalize_choice(
        args.depth,
        &["basic", "detailed", "full"],
        "detailed",
        "invalid_depth",
        "depth",
    )?;
    let timeframe = args
        .timeframe
        .map(|value| require_text(&value, "invalid_timeframe", "timeframe"))
        .transpose()?;
    let options = CategoryOptions {
        detailed: depth != "basic",
        hot_index_days: if timeframe.as_deref() == Some("1d") { 1 } else { 7 },
    };

    let entity = resolve_entity(api, &query, analysis.kind_filter()).await?;
    let categories = analysis.categories(entity.kind, args.include_related.unwrap_or(false));
    let results = collect_categories(api, limits, &entity, &categories, options).await;
    let partial_failure = check_outcomes(&results)?;
    let summary = analysis_summary(&query, &entity, &results);

    info!(
        query = %query,
        entity = %entity.name,
        kind = %entity.kind,
        categories = results.len(),
        partial = partial_failure.is_some(),
        "comprehensive analysis completed"
    );

    Ok(AggregatedReport {
        entity,
        categories: results,
        partial_failure,
        summary,
    })
}

fn investigation_summary(entity: &EntityRef, results: &BTreeMap<Category, LookupResult>) -> String {
    let retrieved = results.values().filter(|result| result.is_ok()).count();
    let mut summary = format!(
        "Investigated {} {} (id {}): {} of {} categories retrieved",
        entity.kind.label(),
        entity.name,
        entity.id,
        retrieved,
        results.len()
    );
    append_failures(&mut summary, results);
    summary
}

fn analysis_summary(
    query: &str,
    entity: &EntityRef,
    results: &BTreeMap<Category, LookupResult>,
) -> String {
    let mut summary = format!("Analysis for \"{query}\":\n\n");

    let profile = results.get(&Category::Profile).and_then(LookupResult::data);
    let name = profile
        .and_then(|profile| {
            ["project_name", "org_name", "people_name"]
                .iter()
                .find_map(|field| profile.get(*field).and_then(Value::as_str))
        })
        .unwrap_or(entity.name.as_str());
    summary.push_str(&format!("{}: {}\n", entity.kind.label(), name));

    if let Some(total) = profile
        .and_then(|profile| profile.get("total_funding"))
        .and_then(Value::as_f64)
        .filter(|total| *total > 0.0)
    {
        summary.push_str(&format!("Total Funding: ${:.2}M\n", total / 1e6));
    }

    if let Some(established) = profile
        .and_then(|profile| profile.get("establishment_date"))
        .filter(|value| !value.is_null())
    {
        let established = established
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| established.to_string());
        summary.push_str(&format!("Established: {established}\n"));
    }

    if let Some(hot) = results
        .get(&Category::HotIndex)
        .and_then(LookupResult::data)
        .filter(|hot| hot.is_object())
    {
        summary.push_str(&format!(
            "\nHot Index Rank: #{} (Score: {})\n",
            display_value(hot.get("rank")),
            display_value(hot.get("eval"))
        ));
    }

    if let Some(related) = results
        .get(&Category::Ecosystem)
        .and_then(LookupResult::data)
        .and_then(|data| data.get("related_projects"))
        .and_then(Value::as_array)
    {
        summary.push_str(&format!(
            "\nRelated Projects: {} projects in the same ecosystem\n",
            related.len()
        ));
    }

    if let Some(rounds) = results
        .get(&Category::Funding)
        .and_then(LookupResult::data)
        .and_then(|data| data.get("items"))
        .and_then(Value::as_array)
    {
        summary.push_str(&format!(
            "\nFundraising Rounds: {} rounds found\n",
            rounds.len()
        ));
    }

    append_failures(&mut summary, results);
    summary
}

fn append_failures(summary: &mut String, results: &BTreeMap<Category, LookupResult>) {
    let failed: Vec<&str> = results
        .iter()
        .filter(|(_, result)| !result.is_ok())
        .map(|(category, _)| category.as_str())
        .collect();

    if !failed.is_empty() {
        summary.push_str(&format!("\nUnavailable: {}\n", failed.join(", ")));
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => "n/a".to_string(),
        Some(other) => other.to_string(),
    }
}

fn take_field(mut data: Value, field: &str) -> Value {
    data.get_mut(field).map(Value::take).unwrap_or(Value::Null)
}

/// Finds the entry whose `key` equals `id` in a list payload, or in its `items` member.
pub(crate) fn find_entry(payload: &Value, key: &str, id: i64) -> Value {
    let items = payload
        .as_array()
        .or_else(|| payload.get("items").and_then(Value::as_array));

    items
        .into_iter()
        .flatten()
        .find(|item| item.get(key).and_then(Value::as_i64) == Some(id))
        .cloned()
        .unwrap_or(Value::Null)
}

fn social_entries(rankings: &Value, project_id: i64) -> Value {
    let entries = SOCIAL_RANKINGS
        .iter()
        .map(|ranking| {
            let entry = rankings
                .get(*ranking)
                .map(|list| find_entry(list, "project_id", project_id))
                .unwrap_or(Value::Null);
            (ranking.to_string(), entry)
        })
        .collect::<serde_json::Map<_, _>>();

    Value::Object(entries)
}

/// Maps ecosystem names to ids using the ecosystem map, matching names case-insensitively.
pub(crate) fn ecosystem_ids_for(map: &Value, names: &[String]) -> Vec<i64> {
    map.as_array()
        .into_iter()
        .flatten()
        .filter(|ecosystem| {
            ecosystem
                .get("ecosystem_name")
                .and_then(Value::as_str)
                .is_some_and(|name| names.iter().any(|wanted| wanted.eq_ignore_ascii_case(name)))
        })
        .filter_map(|ecosystem| ecosystem.get("ecosystem_id").and_then(Value::as_i64))
        .collect()
}

pub(crate) fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

async fn related_ecosystem_projects(
    api: &dyn RootDataApi,
    project_id: i64,
) -> Result<Value, AppError> {
    let profile = get_project(
        api,
        GetProjectTool {
            project_id,
            include_team: None,
            include_investors: None,
        },
    )
    .await?;

    let names: Vec<String> = profile
        .get("ecosystem")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Ok(json!({ "ecosystems": [], "related_projects": [] }));
    }

    let map = get_ecosystem_map(api).await?;
    let ids = ecosystem_ids_for(&map, &names);
    if ids.is_empty() {
        return Ok(json!({ "ecosystems": names, "related_projects": [] }));
    }

    let projects = get_projects_by_ecosystem(
        api,
        GetProjectsByEcosystemTool {
            ecosystem_ids: join_ids(&ids),
        },
    )
    .await?;

    Ok(json!({ "ecosystems": names, "related_projects": projects }))
}
