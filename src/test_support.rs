use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::rootdata_client::{Endpoint, RootDataApi};

type Handler = dyn Fn(Endpoint, &Value) -> Result<Value, AppError> + Send + Sync;

/// In-process RootData double answering from a closure and recording every call.
pub struct FakeRootData {
    handler: Box<Handler>,
    calls: Mutex<Vec<(Endpoint, Value)>>,
}

impl FakeRootData {
    pub fn new(
        handler: impl Fn(Endpoint, &Value) -> Result<Value, AppError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Endpoint, Value)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.calls()
            .iter()
            .filter(|(called, _)| *called == endpoint)
            .count()
    }
}

#[async_trait]
impl RootDataApi for FakeRootData {
    async fn call(&self, endpoint: Endpoint, params: Value) -> Result<Value, AppError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((endpoint, params.clone()));
        (self.handler)(endpoint, &params)
    }
}

/// A small RootData universe: project Ethereum (12), investor Paradigm (7), person Vitalik (3).
pub fn sample_universe(endpoint: Endpoint, params: &Value) -> Result<Value, AppError> {
    match endpoint {
        Endpoint::Search => {
            let query = params["query"].as_str().unwrap_or_default().to_ascii_lowercase();
            Ok(match query.as_str() {
                "ethereum" => json!([
                    {"id": 12, "type": 1, "name": "Ethereum", "introduce": "Smart contract platform"},
                    {"id": 99, "type": 1, "name": "Ethereum Classic"}
                ]),
                "paradigm" => json!([{"id": 7, "type": 2, "name": "Paradigm"}]),
                "vitalik" => json!([{"id": 3, "type": 3, "name": "Vitalik Buterin"}]),
                _ => json!([]),
            })
        }
        Endpoint::Project => Ok(json!({
            "project_id": params["project_id"],
            "project_name": "Ethereum",
            "total_funding": 18_300_000,
            "establishment_date": "2013",
            "ecosystem": ["Ethereum"],
            "tags": ["Infrastructure"],
            "team_members": [{"name": "Vitalik Buterin"}],
            "investors": [{"name": "Paradigm"}],
        })),
        Endpoint::Organization => Ok(json!({
            "org_id": params["org_id"],
            "org_name": "Paradigm",
            "establishment_date": "2018",
            "category": ["VC"],
            "team_members": [{"name": "Matt Huang"}],
            "investments": [{"name": "Uniswap"}, {"name": "Optimism"}],
        })),
        Endpoint::People => Ok(json!({
            "people_id": params["people_id"],
            "people_name": "Vitalik Buterin",
        })),
        Endpoint::FundingRounds => Ok(json!({
            "total": 1,
            "items": [{"project_id": 12, "amount": 18_300_000, "rounds": "ICO"}],
        })),
        Endpoint::XHotProjects => Ok(json!({
            "heat": [{"project_id": 12, "score": 98}],
            "influence": [{"project_id": 55, "score": 80}],
            "followers": [{"project_id": 12, "score": 91}],
        })),
        Endpoint::HotIndex => Ok(json!([
            {"project_id": 12, "rank": 1, "eval": 99.5},
            {"project_id": 55, "rank": 2, "eval": 90.1},
        ])),
        Endpoint::NewTokens => Ok(json!([{"project_id": 77, "token_symbol": "NEW"}])),
        Endpoint::EcosystemMap => Ok(json!([
            {"ecosystem_id": 52, "ecosystem_name": "Ethereum", "project_num": 100},
            {"ecosystem_id": 53, "ecosystem_name": "Solana", "project_num": 50},
        ])),
        Endpoint::TagMap => Ok(json!([
            {"id": 100, "name": "DeFi"},
            {"id": 101, "name": "Infrastructure"},
        ])),
        Endpoint::ProjectsByEcosystems | Endpoint::ProjectsByTags => {
            Ok(json!([{"project_id": 12, "project_name": "Ethereum"}]))
        }
        Endpoint::Investors => Ok(json!({
            "items": [{"invest_id": 7, "invest_name": "Paradigm", "investments": 250}],
            "total": 1,
        })),
        Endpoint::XPopularFigures => Ok(json!({
            "items": [{"people_id": 3, "name": "Vitalik Buterin", "score": 100}],
        })),
        Endpoint::JobChanges => Ok(json!({
            "recent_joinees": [],
            "recent_resignations": [],
        })),
        Endpoint::SyncUpdate => Ok(json!([])),
    }
}
