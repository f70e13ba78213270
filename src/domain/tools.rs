//! Tool registry exposed via Model Context Protocol
//!
//! Publishes every tool schema for `tools/list` and routes `tools/call` to the basic
//! passthroughs or the aggregation tools.

use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::aggregate::{
    analyze_comprehensive, investigate_entity, AnalyzeComprehensiveTool, InvestigateEntityTool,
};
use crate::domain::basic::*;
use crate::domain::compare::{compare_entities, CompareEntitiesTool};
use crate::domain::prompts::research_strategies;
use crate::domain::trends::{track_trends, TrackTrendsParams, TrackTrendsTool};
use crate::mcp::rpc::{app_error_to_json_rpc, json_rpc_error, json_rpc_result};
use crate::{errors::AppError, AppState};

const ADVANCED_TOOLS: [&str; 4] = [
    "analyzeComprehensive",
    "investigateEntity",
    "trackTrends",
    "compareEntities",
];

#[macros::mcp_tool(
    name = "listAllTools",
    description = "List all available tools with descriptions, parameters and recommended research strategies"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListAllToolsTool {}

pub fn build_tools_list() -> Vec<Tool> {
    vec![
        ListAllToolsTool::tool(),
        SearchEntitiesTool::tool(),
        GetProjectTool::tool(),
        GetOrgTool::tool(),
        GetPeopleTool::tool(),
        GetInvestorsTool::tool(),
        GetFundingRoundsTool::tool(),
        SyncUpdateTool::tool(),
        GetHotProjectsTool::tool(),
        GetXHotProjectsTool::tool(),
        GetXPopularFiguresTool::tool(),
        GetJobChangesTool::tool(),
        GetNewTokensTool::tool(),
        GetEcosystemMapTool::tool(),
        GetTagMapTool::tool(),
        GetProjectsByEcosystemTool::tool(),
        GetProjectsByTagsTool::tool(),
        AnalyzeComprehensiveTool::tool(),
        InvestigateEntityTool::tool(),
        TrackTrendsTool::tool(),
        CompareEntitiesTool::tool(),
    ]
}

/// Text summary plus structured payload of one successful tool call.
#[derive(Debug)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Map<String, Value>,
}

impl ToolOutput {
    /// Basic tools hand back the upstream `data` unchanged, under `data`.
    fn data(data: Value) -> Result<Self, AppError> {
        let text = serde_json::to_string_pretty(&data)
            .map_err(|err| AppError::internal(format!("tool result serialization: {err}")))?;
        Ok(Self {
            text,
            structured: Map::from_iter([("data".to_string(), data)]),
        })
    }

    fn report<T: Serialize>(summary: String, report: &T) -> Result<Self, AppError> {
        let structured = match serde_json::to_value(report) {
            Ok(Value::Object(map)) => map,
            Ok(other) => Map::from_iter([("data".to_string(), other)]),
            Err(err) => {
                return Err(AppError::internal(format!("tool report serialization: {err}")))
            }
        };
        Ok(Self {
            text: summary,
            structured,
        })
    }
}

fn parse_args<T: DeserializeOwned>(
    tool: &str,
    arguments: Map<String, Value>,
) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(arguments)).map_err(|err| {
        AppError::bad_request(
            "invalid_arguments",
            format!("invalid arguments for {tool}: {err}"),
        )
    })
}

fn list_all_tools() -> Value {
    let (advanced, basic): (Vec<Tool>, Vec<Tool>) = build_tools_list()
        .into_iter()
        .filter(|tool| tool.name != "listAllTools")
        .partition(|tool| ADVANCED_TOOLS.contains(&tool.name.as_str()));

    json!({
        "tools_info": {
            "basic_tools": basic,
            "advanced_tools": advanced,
            "search_strategies": research_strategies(),
        },
        "recommendation": "Based on the query nature, select either a basic tool for simple lookups, \
an advanced tool for complex analysis, or follow one of the recommended search strategies for a \
guided multi-step approach.",
    })
}

/// Runs one tool by name. Unknown names are a `tool_not_found` error.
pub async fn call_tool(
    state: &AppState,
    name: &str,
    arguments: Map<String, Value>,
) -> Result<ToolOutput, AppError> {
    let api = state.rootdata.as_ref();
    let limits = state.limits;

    match name {
        "listAllTools" => ToolOutput::report(
            "Catalog of RootData tools and research strategies".to_string(),
            &list_all_tools(),
        ),
        "searchEntities" => {
            ToolOutput::data(search_entities(api, parse_args(name, arguments)?).await?)
        }
        "getProject" => ToolOutput::data(get_project(api, parse_args(name, arguments)?).await?),
        "getOrg" => ToolOutput::data(get_org(api, parse_args(name, arguments)?).await?),
        "getPeople" => ToolOutput::data(get_people(api, parse_args(name, arguments)?).await?),
        "getInvestors" => ToolOutput::data(get_investors(api, parse_args(name, arguments)?).await?),
        "getFundingRounds" => {
            ToolOutput::data(get_funding_rounds(api, parse_args(name, arguments)?).await?)
        }
        "syncUpdate" => ToolOutput::data(sync_update(api, parse_args(name, arguments)?).await?),
        "getHotProjects" => {
            ToolOutput::data(get_hot_projects(api, parse_args(name, arguments)?).await?)
        }
        "getXHotProjects" => {
            ToolOutput::data(get_x_hot_projects(api, parse_args(name, arguments)?).await?)
        }
        "getXPopularFigures" => {
            ToolOutput::data(get_x_popular_figures(api, parse_args(name, arguments)?).await?)
        }
        "getJobChanges" => {
            ToolOutput::data(get_job_changes(api, parse_args(name, arguments)?).await?)
        }
        "getNewTokens" => ToolOutput::data(get_new_tokens(api).await?),
        "getEcosystemMap" => ToolOutput::data(get_ecosystem_map(api).await?),
        "getTagMap" => ToolOutput::data(get_tag_map(api).await?),
        "getProjectsByEcosystem" => {
            ToolOutput::data(get_projects_by_ecosystem(api, parse_args(name, arguments)?).await?)
        }
        "getProjectsByTags" => {
            ToolOutput::data(get_projects_by_tags(api, parse_args(name, arguments)?).await?)
        }
        "investigateEntity" => {
            let report = investigate_entity(api, limits, parse_args(name, arguments)?).await?;
            ToolOutput::report(report.summary.clone(), &report)
        }
        "analyzeComprehensive" => {
            let report = analyze_comprehensive(api, limits, parse_args(name, arguments)?).await?;
            ToolOutput::report(report.summary.clone(), &report)
        }
        "trackTrends" => {
            let params: TrackTrendsParams = parse_args(name, arguments)?;
            let report = track_trends(api, limits, params).await?;
            ToolOutput::report(report.summary.clone(), &report)
        }
        "compareEntities" => {
            let report = compare_entities(api, limits, parse_args(name, arguments)?).await?;
            ToolOutput::report(report.summary.clone(), &report)
        }
        _ => Err(AppError::not_found("tool_not_found", "unknown tool name")),
    }
}

pub async fn handle_tools_call(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, -32602, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, -32602, "Invalid params"),
    };

    let arguments = tool_call.arguments.unwrap_or_default();
    match call_tool(state, &tool_call.name, arguments).await {
        Ok(output) => json_rpc_result(
            id,
            serde_json::to_value(CallToolResult {
                content: vec![ContentBlock::from(TextContent::new(output.text, None, None))],
                is_error: None,
                meta: None,
                structured_content: Some(output.structured),
            })
            .expect("tool result serialization"),
        ),
        Err(err) => app_error_to_json_rpc(id, err),
    }
}
