//! Single-endpoint RootData tools
//!
//! Each tool validates its arguments locally, then performs exactly one upstream call
//! and hands back the `data` payload unchanged.

use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::utils::{
    normalize_choice, normalize_id_list, normalize_page, normalize_page_size,
    normalize_year_month, require_id, require_text, MAX_FUNDING_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::errors::AppError;
use crate::rootdata_client::{Endpoint, RootDataApi};

#[macros::mcp_tool(
    name = "searchEntities",
    description = "Search for projects, VCs, or people by keywords"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct SearchEntitiesTool {
    /// Search keywords
    pub query: String,
    /// Search by X handle (@...)
    pub precise_x_search: Option<bool>,
}

#[macros::mcp_tool(name = "getProject", description = "Get detailed project information")]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetProjectTool {
    /// Project ID
    pub project_id: i64,
    /// Include team members
    pub include_team: Option<bool>,
    /// Include investors
    pub include_investors: Option<bool>,
}

#[macros::mcp_tool(
    name = "getOrg",
    description = "Get detailed VC/organization information"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetOrgTool {
    /// Organization ID
    pub org_id: i64,
    /// Include team members
    pub include_team: Option<bool>,
    /// Include investments
    pub include_investments: Option<bool>,
}

#[macros::mcp_tool(
    name = "getPeople",
    description = "Get detailed information about a person (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetPeopleTool {
    /// Person ID
    pub people_id: i64,
}

#[macros::mcp_tool(
    name = "getInvestors",
    description = "Get investor information in batches (Plus/Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetInvestorsTool {
    /// Page number (default: 1)
    pub page: Option<u32>,
    /// Items per page (default: 10, max: 100)
    pub page_size: Option<u32>,
}

#[macros::mcp_tool(
    name = "getFundingRounds",
    description = "Get fundraising rounds information (Plus/Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetFundingRoundsTool {
    /// Page number (default: 1)
    pub page: Option<u32>,
    /// Items per page (default: 10, max: 200)
    pub page_size: Option<u32>,
    /// Start date (yyyy-MM)
    pub start_time: Option<String>,
    /// End date (yyyy-MM)
    pub end_time: Option<String>,
    /// Minimum funding amount (USD)
    pub min_amount: Option<u64>,
    /// Maximum funding amount (USD)
    pub max_amount: Option<u64>,
    /// Project ID
    pub project_id: Option<i64>,
}

#[macros::mcp_tool(
    name = "syncUpdate",
    description = "Get projects updated within a time range (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct SyncUpdateTool {
    /// Start timestamp
    pub begin_time: i64,
    /// End timestamp
    pub end_time: Option<i64>,
}

#[macros::mcp_tool(
    name = "getHotProjects",
    description = "Get top 100 hot crypto projects (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetHotProjectsTool {
    /// Time period in days (1 to 7)
    pub days: u32,
}

#[macros::mcp_tool(
    name = "getXHotProjects",
    description = "Get X platform hot projects rankings (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetXHotProjectsTool {
    /// Get heat ranking (default: true)
    pub heat: Option<bool>,
    /// Get influence ranking (default: true)
    pub influence: Option<bool>,
    /// Get followers ranking (default: true)
    pub followers: Option<bool>,
}

#[macros::mcp_tool(
    name = "getXPopularFigures",
    description = "Get X platform popular figures (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetXPopularFiguresTool {
    /// Page number (default: 1)
    pub page: Option<u32>,
    /// Items per page (default: 10, max: 100)
    pub page_size: Option<u32>,
    /// Ranking type: heat or influence
    pub rank_type: String,
}

#[macros::mcp_tool(
    name = "getJobChanges",
    description = "Get job position changes (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetJobChangesTool {
    /// Get recent job joiners (default: true)
    pub recent_joinees: Option<bool>,
    /// Get recent resignations (default: true)
    pub recent_resignations: Option<bool>,
}

#[macros::mcp_tool(
    name = "getNewTokens",
    description = "Get newly issued tokens in the past 3 months (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetNewTokensTool {}

#[macros::mcp_tool(name = "getEcosystemMap", description = "Get ecosystem map list (Pro only)")]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetEcosystemMapTool {}

#[macros::mcp_tool(name = "getTagMap", description = "Get tag map list (Pro only)")]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetTagMapTool {}

#[macros::mcp_tool(
    name = "getProjectsByEcosystem",
    description = "Get projects by ecosystem IDs (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetProjectsByEcosystemTool {
    /// Comma-separated ecosystem IDs
    pub ecosystem_ids: String,
}

#[macros::mcp_tool(
    name = "getProjectsByTags",
    description = "Get projects by tag IDs (Pro only)"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetProjectsByTagsTool {
    /// Comma-separated tag IDs
    pub tag_ids: String,
}

pub async fn search_entities(
    api: &dyn RootDataApi,
    args: SearchEntitiesTool,
) -> Result<Value, AppError> {
    let query = require_text(&args.query, "invalid_query", "query")?;
    api.call(
        Endpoint::Search,
        json!({
            "query": query,
            "precise_x_search": args.precise_x_search,
        }),
    )
    .await
}

pub async fn get_project(api: &dyn RootDataApi, args: GetProjectTool) -> Result<Value, AppError> {
    let project_id = require_id(args.project_id, "invalid_project_id", "project_id")?;
    api.call(
        Endpoint::Project,
        json!({
            "project_id": project_id,
            "include_team": args.include_team,
            "include_investors": args.include_investors,
        }),
    )
    .await
}

pub async fn get_org(api: &dyn RootDataApi, args: GetOrgTool) -> Result<Value, AppError> {
    let org_id = require_id(args.org_id, "invalid_org_id", "org_id")?;
    api.call(
        Endpoint::Organization,
        json!({
            "org_id": org_id,
            "include_team": args.include_team,
            "include_investments": args.include_investments,
        }),
    )
    .await
}

pub async fn get_people(api: &dyn RootDataApi, args: GetPeopleTool) -> Result<Value, AppError> {
    let people_id = require_id(args.people_id, "invalid_people_id", "people_id")?;
    api.call(Endpoint::People, json!({ "people_id": people_id }))
        .await
}

pub async fn get_investors(
    api: &dyn RootDataApi,
    args: GetInvestorsTool,
) -> Result<Value, AppError> {
    let page = normalize_page(args.page)?;
    let page_size = normalize_page_size(args.page_size, MAX_PAGE_SIZE)?;
    api.call(
        Endpoint::Investors,
        json!({ "page": page, "page_size": page_size }),
    )
    .await
}

pub async fn get_funding_rounds(
    api: &dyn RootDataApi,
    args: GetFundingRoundsTool,
) -> Result<Value, AppError> {
    let page = normalize_page(args.page)?;
    let page_size = normalize_page_size(args.page_size, MAX_FUNDING_PAGE_SIZE)?;
    let start_time = normalize_year_month(args.start_time, "start_time")?;
    let end_time = normalize_year_month(args.end_time, "end_time")?;

    // yyyy-MM sorts lexicographically in calendar order.
    if let (Some(start), Some(end)) = (start_time.as_deref(), end_time.as_deref()) {
        if start > end {
            return Err(AppError::bad_request(
                "invalid_time_range",
                "start_time must not be after end_time",
            ));
        }
    }

    if let (Some(min), Some(max)) = (args.min_amount, args.max_amount) {
        if min > max {
            return Err(AppError::bad_request(
                "invalid_amount_range",
                "min_amount must not exceed max_amount",
            ));
        }
    }

    let project_id = args
        .project_id
        .map(|id| require_id(id, "invalid_project_id", "project_id"))
        .transpose()?;

    api.call(
        Endpoint::FundingRounds,
        json!({
            "page": page,
            "page_size": page_size,
            "start_time": start_time,
            "end_time": end_time,
            "min_amount": args.min_amount,
            "max_amount": args.max_amount,
            "project_id": project_id,
        }),
    )
    .await
}

pub async fn sync_update(api: &dyn RootDataApi, args: SyncUpdateTool) -> Result<Value, AppError> {
    if args.begin_time < 0 {
        return Err(AppError::bad_request(
            "invalid_time_range",
            "begin_time must not be negative",
        ));
    }
    if args.end_time.is_some_and(|end| end < args.begin_time) {
        return Err(AppError::bad_request(
            "invalid_time_range",
            "end_time must not be before begin_time",
        ));
    }

    api.call(
        Endpoint::SyncUpdate,
        json!({ "begin_time": args.begin_time, "end_time": args.end_time }),
    )
    .await
}

pub async fn get_hot_projects(
    api: &dyn RootDataApi,
    args: GetHotProjectsTool,
) -> Result<Value, AppError> {
    if !(1..=7).contains(&args.days) {
        return Err(AppError::bad_request(
            "invalid_days",
            "days must be between 1 and 7",
        ));
    }

    api.call(Endpoint::HotIndex, json!({ "days": args.days }))
        .await
}

pub async fn get_x_hot_projects(
    api: &dyn RootDataApi,
    args: GetXHotProjectsTool,
) -> Result<Value, AppError> {
    let heat = args.heat.unwrap_or(true);
    let influence = args.influence.unwrap_or(true);
    let followers = args.followers.unwrap_or(true);
    if !(heat || influence || followers) {
        return Err(AppError::bad_request(
            "empty_ranking_selection",
            "at least one of heat, influence, followers must be true",
        ));
    }

    api.call(
        Endpoint::XHotProjects,
        json!({ "heat": heat, "influence": influence, "followers": followers }),
    )
    .await
}

pub async fn get_x_popular_figures(
    api: &dyn RootDataApi,
    args: GetXPopularFiguresTool,
) -> Result<Value, AppError> {
    let page = normalize_page(args.page)?;
    let page_size = normalize_page_size(args.page_size, MAX_PAGE_SIZE)?;
    let rank_type = normalize_choice(
        Some(args.rank_type),
        &["heat", "influence"],
        "",
        "invalid_rank_type",
        "rank_type",
    )?;

    api.call(
        Endpoint::XPopularFigures,
        json!({ "page": page, "page_size": page_size, "rank_type": rank_type }),
    )
    .await
}

pub async fn get_job_changes(
    api: &dyn RootDataApi,
    args: GetJobChangesTool,
) -> Result<Value, AppError> {
    let recent_joinees = args.recent_joinees.unwrap_or(true);
    let recent_resignations = args.recent_resignations.unwrap_or(true);
    if !(recent_joinees || recent_resignations) {
        return Err(AppError::bad_request(
            "empty_change_selection",
            "at least one of recent_joinees, recent_resignations must be true",
        ));
    }

    api.call(
        Endpoint::JobChanges,
        json!({
            "recent_joinees": recent_joinees,
            "recent_resignations": recent_resignations,
        }),
    )
    .await
}

pub async fn get_new_tokens(api: &dyn RootDataApi) -> Result<Value, AppError> {
    api.call(Endpoint::NewTokens, json!({})).await
}

pub async fn get_ecosystem_map(api: &dyn RootDataApi) -> Result<Value, AppError> {
    api.call(Endpoint::EcosystemMap, json!({})).await
}

pub async fn get_tag_map(api: &dyn RootDataApi) -> Result<Value, AppError> {
    api.call(Endpoint::TagMap, json!({})).await
}

pub async fn get_projects_by_ecosystem(
    api: &dyn RootDataApi,
    args: GetProjectsByEcosystemTool,
) -> Result<Value, AppError> {
    let ecosystem_ids = normalize_id_list(&args.ecosystem_ids, "ecosystem_ids")?;
    api.call(
        Endpoint::ProjectsByEcosystems,
        json!({ "ecosystem_ids": ecosystem_ids }),
    )
    .await
}

pub async fn get_projects_by_tags(
    api: &dyn RootDataApi,
    args: GetProjectsByTagsTool,
) -> Result<Value, AppError> {
    let tag_ids = normalize_id_list(&args.tag_ids, "tag_ids")?;
    api.call(Endpoint::ProjectsByTags, json!({ "tag_ids": tag_ids }))
        .await
}
