//! Research-strategy prompts served over `prompts/list` and `prompts/get`

use serde_json::{json, Value};

use crate::errors::AppError;

struct PromptTemplate {
    name: &'static str,
    description: &'static str,
    text: &'static str,
}

const PROMPTS: [PromptTemplate; 2] = [
    PromptTemplate {
        name: "rootdata_research_strategy",
        description: "Short reminder to consult listAllTools before researching with RootData tools",
        text: "When using RootData tools, always start by calling listAllTools to understand \
all available capabilities and recommended research strategies before proceeding with \
specific tool calls.",
    },
    PromptTemplate {
        name: "rootdata_system_prompt",
        description: "Guides a model through effective use of the RootData tools",
        text: "When using RootData MCP tools to research crypto projects, investors, or market trends, follow this process:

1. Always start by calling listAllTools to understand available capabilities and recommended research strategies.
2. Select the most appropriate search strategy based on the query type:
   - For project research: first search, then get details, then examine relationships
   - For market analysis: look at trends, then hot projects, then funding rounds
   - For investor analysis: first identify the investor, then examine their portfolio
3. For complex queries, use analyzeComprehensive or investigateEntity
4. For simple lookups, use basic tools directly after confirming the entity ID

Always present findings with a clear summary of key information, relevant metrics with context, \
significant patterns or anomalies, and the limitations of the data where appropriate.",
    },
];

pub fn list_prompts() -> Value {
    let prompts: Vec<Value> = PROMPTS
        .iter()
        .map(|prompt| {
            json!({
                "name": prompt.name,
                "description": prompt.description,
                "arguments": [],
            })
        })
        .collect();

    json!({ "prompts": prompts })
}

pub fn get_prompt(name: &str) -> Result<Value, AppError> {
    let prompt = PROMPTS
        .iter()
        .find(|prompt| prompt.name == name)
        .ok_or_else(|| {
            AppError::bad_request("prompt_not_found", format!("unknown prompt: {name}"))
        })?;

    Ok(json!({
        "description": prompt.description,
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": prompt.text },
        }],
    }))
}

/// Recommended multi-step flows, returned by `listAllTools`.
pub fn research_strategies() -> Value {
    json!({
        "project_research": {
            "description": "Research a specific crypto project thoroughly",
            "recommended_flow": [
                "1. Start with searchEntities(query='project_name') to identify the project",
                "2. Use investigateEntity(entity_name='project_name', investigation_scope='all') for deep analysis",
                "3. Optionally use trackTrends and compareEntities to place it in context",
            ],
        },
        "investor_analysis": {
            "description": "Analyze an investment firm or VC thoroughly",
            "recommended_flow": [
                "1. Start with searchEntities(query='investor_name') to identify the investor",
                "2. Use investigateEntity(entity_name='investor_name', entity_type='investor', investigation_scope='funding') for portfolio analysis",
                "3. Examine recent investments with getFundingRounds or getInvestors",
            ],
        },
        "market_trends": {
            "description": "Analyze current market trends and hot projects",
            "recommended_flow": [
                "1. Use trackTrends(category='all', time_range='7d') for a broad market overview",
                "2. Identify hot projects with getHotProjects(days=7) or getXHotProjects()",
                "3. Examine funding trends with getFundingRounds() for recent activity",
            ],
        },
        "ecosystem_analysis": {
            "description": "Analyze a specific crypto ecosystem (e.g., Layer 2, DeFi)",
            "recommended_flow": [
                "1. Get the ecosystem map with getEcosystemMap() to identify ecosystem IDs",
                "2. Get projects in the ecosystem with getProjectsByEcosystem()",
                "3. Use compareEntities() to compare key projects within the ecosystem",
            ],
        },
        "funding_analysis": {
            "description": "Analyze recent funding activities in the crypto space",
            "recommended_flow": [
                "1. Use getFundingRounds() with time filters to get recent rounds",
                "2. Identify top investors with getInvestors()",
                "3. Analyze specific projects that received funding with getProject()",
            ],
        },
        "comprehensive_query": {
            "description": "For general crypto market questions or complex queries",
            "recommended_flow": [
                "Use analyzeComprehensive() which combines multiple endpoints",
            ],
        },
    })
}
