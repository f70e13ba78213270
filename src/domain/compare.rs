//! Side-by-side comparison of several named entities

use std::collections::BTreeMap;
use std::fmt;

use futures::FutureExt;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::domain::aggregate::{
    fan_out, fetch_category, resolve_entity, run_bounded, CategoryOptions, FanOutLimits,
};
use crate::domain::report::{
    Category, EntityKind, EntityRef, ErrorMarker, LookupResult, PartialFailure,
};
use crate::domain::utils::normalize_choice;
use crate::errors::AppError;
use crate::rootdata_client::RootDataApi;

pub const MAX_COMPARED_ENTITIES: usize = 10;

#[macros::mcp_tool(
    name = "compareEntities",
    description = "Compare multiple projects or investors side by side"
)]
#[derive(Debug, Default, Deserialize, Serialize, macros::JsonSchema)]
pub struct CompareEntitiesTool {
    /// Names of the entities to compare (1 to 10)
    pub entities: Vec<String>,
    /// Categories to compare, e.g. profile, funding, social, ecosystem, team
    pub aspects: Option<Vec<String>>,
    /// Type of comparison when aspects are omitted: metrics, funding, ecosystem, social, or all (default: all)
    pub compare_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntityComparison {
    Ok {
        entity: EntityRef,
        aspects: BTreeMap<Category, LookupResult>,
    },
    Error {
        error: ErrorMarker,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    /// Requested names, deduplicated, in request order.
    pub requested: Vec<String>,
    pub aspects: Vec<Category>,
    pub entities: BTreeMap<String, EntityComparison>,
    pub metrics: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_failure: Option<PartialFailure>,
    pub summary: String,
}

struct AspectKey {
    entity: usize,
    name: String,
    aspect: Category,
}

impl fmt::Display for AspectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.aspect)
    }
}

fn normalize_entities(entities: Vec<String>) -> Result<Vec<String>, AppError> {
    let mut names: Vec<String> = Vec::with_capacity(entities.len());
    for entity in entities {
        let name = entity.trim();
        if name.is_empty() {
            return Err(AppError::bad_request(
                "invalid_entities",
                "entity names must not be empty",
            ));
        }
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }

    if names.is_empty() || names.len() > MAX_COMPARED_ENTITIES {
        return Err(AppError::bad_request(
            "invalid_entities",
            format!("entities must contain between 1 and {MAX_COMPARED_ENTITIES} names"),
        ));
    }

    Ok(names)
}

fn select_aspects(
    aspects: Option<Vec<String>>,
    compare_type: Option<String>,
) -> Result<Vec<Category>, AppError> {
    if let Some(aspects) = aspects {
        let mut selected = Vec::new();
        for aspect in aspects {
            let category = Category::parse(&aspect).ok_or_else(|| {
                AppError::bad_request(
                    "invalid_aspect",
                    format!("unknown aspect: {}", aspect.trim()),
                )
            })?;
            if !selected.contains(&category) {
                selected.push(category);
            }
        }
        if selected.is_empty() {
            return Err(AppError::bad_request(
                "invalid_aspect",
                "aspects must name at least one category",
            ));
        }
        return Ok(selected);
    }

    let compare_type = normalize_choice(
        compare_type,
        &["metrics", "funding", "ecosystem", "social", "all"],
        "all",
        "invalid_compare_type",
        "compare_type",
    )?;

    Ok(match compare_type.as_str() {
        "metrics" => vec![Category::Profile],
        "funding" => vec![Category::Profile, Category::Funding],
        "ecosystem" => vec![Category::Profile, Category::Ecosystem],
        "social" => vec![Category::Profile, Category::Social],
        _ => vec![Category::Profile, Category::Funding, Category::Social],
    })
}

pub async fn compare_entities(
    api: &dyn RootDataApi,
    limits: FanOutLimits,
    args: CompareEntitiesTool,
) -> Result<ComparisonReport, AppError> {
    let names = normalize_entities(args.entities)?;
    let aspects = select_aspects(args.aspects, args.compare_type)?;

    let resolutions = run_bounded(
        limits,
        names
            .iter()
            .map(|name| (name.clone(), resolve_entity(api, name, None).boxed()))
            .collect(),
    )
    .await;

    let resolved: Vec<(String, EntityRef)> = resolutions
        .iter()
        .filter_map(|(name, outcome)| {
            outcome
                .as_ref()
                .ok()
                .map(|entity| (name.clone(), entity.clone()))
        })
        .collect();

    if resolved.is_empty() {
        return Err(match resolutions.into_iter().next() {
            Some((_, Err(err))) if names.len() == 1 => err,
            _ => AppError::aggregation_failed("none of the entities could be resolved"),
        });
    }

    let options = CategoryOptions::default();
    let jobs = resolved
        .iter()
        .enumerate()
        .flat_map(|(index, (name, entity))| {
            aspects.iter().map(move |&aspect| {
                (
                    AspectKey {
                        entity: index,
                        name: name.clone(),
                        aspect,
                    },
                    fetch_category(api, entity, aspect, options).boxed(),
                )
            })
        })
        .collect();

    let lookups = resolved.len() * aspects.len();
    let mut per_entity: Vec<BTreeMap<Category, LookupResult>> =
        vec![BTreeMap::new(); resolved.len()];
    let mut failed = Vec::new();
    for (key, result) in fan_out(limits, jobs).await {
        if !result.is_ok() {
            failed.push(key.to_string());
        }
        per_entity[key.entity].insert(key.aspect, result);
    }

    if failed.len() == lookups {
        return Err(AppError::aggregation_failed(format!(
            "all {lookups} upstream lookups failed: {}",
            failed.join(", ")
        )));
    }

    let mut entities = BTreeMap::new();
    for (name, outcome) in resolutions {
        if let Err(err) = outcome {
            failed.push(name.clone());
            entities.insert(
                name,
                EntityComparison::Error {
                    error: ErrorMarker::from(&err),
                },
            );
        }
    }

    let mut metrics = BTreeMap::new();
    for ((name, entity), aspect_results) in resolved.into_iter().zip(per_entity) {
        metrics.insert(name.clone(), entity_metrics(entity.kind, &aspect_results));
        entities.insert(
            name,
            EntityComparison::Ok {
                entity,
                aspects: aspect_results,
            },
        );
    }

    let partial_failure = (!failed.is_empty()).then(|| PartialFailure {
        code: "partial_aggregation",
        message: format!("{} lookups failed across {} entities", failed.len(), names.len()),
        failed,
    });
    let summary = comparison_summary(&names, &entities, &metrics);

    info!(
        entities = names.len(),
        aspects = aspects.len(),
        lookups,
        partial = partial_failure.is_some(),
        "entities compared"
    );

    Ok(ComparisonReport {
        requested: names,
        aspects,
        entities,
        metrics,
        partial_failure,
        summary,
    })
}

fn entity_metrics(kind: EntityKind, aspects: &BTreeMap<Category, LookupResult>) -> Value {
    let mut metrics = Map::new();
    let profile = aspects.get(&Category::Profile).and_then(LookupResult::data);

    match kind {
        EntityKind::Project => {
            if let Some(profile) = profile {
                for (metric, field) in [
                    ("funding", "total_funding"),
                    ("established_date", "establishment_date"),
                    ("ecosystem", "ecosystem"),
                    ("tags", "tags"),
                ] {
                    metrics.insert(
                        metric.to_string(),
                        profile.get(field).cloned().unwrap_or(Value::Null),
                    );
                }
            }
            if let Some(social) = aspects.get(&Category::Social).and_then(LookupResult::data) {
                for ranking in ["heat", "influence", "followers"] {
                    if let Some(score) = social.get(ranking).and_then(|entry| entry.get("score")) {
                        metrics.insert(ranking.to_string(), score.clone());
                    }
                }
            }
        }
        EntityKind::Investor => {
            if let Some(profile) = profile {
                if let Some(investments) = profile.get("investments").and_then(Value::as_array) {
                    metrics.insert("investment_count".to_string(), json!(investments.len()));
                }
                for (metric, field) in [
                    ("established_date", "establishment_date"),
                    ("category", "category"),
                ] {
                    metrics.insert(
                        metric.to_string(),
                        profile.get(field).cloned().unwrap_or(Value::Null),
                    );
                }
            }
        }
        EntityKind::Person => {}
    }

    Value::Object(metrics)
}

fn comparison_summary(
    names: &[String],
    entities: &BTreeMap<String, EntityComparison>,
    metrics: &BTreeMap<String, Value>,
) -> String {
    let mut summary = String::from("Comparison Summary:\n\n");

    for (position, name) in names.iter().enumerate() {
        match entities.get(name) {
            Some(EntityComparison::Ok { entity, .. }) => summary.push_str(&format!(
                "{}. {} ({})\n",
                position + 1,
                entity.name,
                entity.kind.label()
            )),
            Some(EntityComparison::Error { error }) => summary.push_str(&format!(
                "{}. {name}: {}\n",
                position + 1,
                error.message
            )),
            None => {}
        }
    }

    let mut funded: Vec<(&str, f64)> = metrics
        .iter()
        .filter_map(|(name, metrics)| {
            metrics
                .get("funding")
                .and_then(Value::as_f64)
                .filter(|funding| *funding > 0.0)
                .map(|funding| (name.as_str(), funding))
        })
        .collect();

    if !funded.is_empty() {
        funded.sort_by(|left, right| right.1.total_cmp(&left.1));
        summary.push_str("\nFunding Comparison:\n");
        for (name, funding) in funded {
            summary.push_str(&format!("{name}: ${:.2}M\n", funding / 1e6));
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rootdata_client::Endpoint;
    use crate::test_support::{sample_universe, FakeRootData};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn unresolved_entity_is_marked_without_failing() {
        let api = FakeRootData::new(sample_universe);

        let report = compare_entities(
            &api,
            FanOutLimits::default(),
            CompareEntitiesTool {
                entities: names(&["Ethereum", "Nonexistent"]),
                aspects: Some(names(&["profile"])),
                compare_type: None,
            },
        )
        .await
        .expect("comparison should succeed");

        match &report.entities["Ethereum"] {
            EntityComparison::Ok { entity, aspects } => {
                assert_eq!(entity.id, 12);
                assert!(aspects[&Category::Profile].is_ok());
            }
            other => panic!("expected resolved entity, got {other:?}"),
        }
        match &report.entities["Nonexistent"] {
            EntityComparison::Error { error } => assert_eq!(error.code, "entity_not_found"),
            other => panic!("expected resolution error, got {other:?}"),
        }
        assert_eq!(report.metrics["Ethereum"]["funding"], 18_300_000);
        assert!(report.summary.contains("Ethereum: $18.30M"));
        assert_eq!(
            report.partial_failure.expect("partial marker").failed,
            vec!["Nonexistent".to_string()]
        );
    }

    #[tokio::test]
    async fn inapplicable_aspects_are_marked_per_entity() {
        let api = FakeRootData::new(sample_universe);

        let report = compare_entities(
            &api,
            FanOutLimits::default(),
            CompareEntitiesTool {
                entities: names(&["Ethereum", "Paradigm"]),
                aspects: None,
                compare_type: Some("funding".to_string()),
            },
        )
        .await
        .expect("comparison should succeed");

        let EntityComparison::Ok { aspects, .. } = &report.entities["Paradigm"] else {
            panic!("expected Paradigm to resolve");
        };
        match &aspects[&Category::Funding] {
            LookupResult::Error { error } => assert_eq!(error.code, "not_applicable"),
            other => panic!("expected not_applicable marker, got {other:?}"),
        }
        assert_eq!(report.metrics["Paradigm"]["investment_count"], 2);
        assert_eq!(api.count(Endpoint::FundingRounds), 1);
    }

    #[tokio::test]
    async fn duplicate_names_collapse_in_order() {
        let api = FakeRootData::new(sample_universe);

        let report = compare_entities(
            &api,
            FanOutLimits::default(),
            CompareEntitiesTool {
                entities: names(&["Paradigm", " Ethereum ", "Paradigm"]),
                aspects: Some(names(&["profile"])),
                compare_type: None,
            },
        )
        .await
        .expect("comparison should succeed");

        assert_eq!(report.requested, names(&["Paradigm", "Ethereum"]));
        assert_eq!(api.count(Endpoint::Search), 2);
    }

    #[tokio::test]
    async fn fails_when_nothing_resolves() {
        let api = FakeRootData::new(sample_universe);

        let error = compare_entities(
            &api,
            FanOutLimits::default(),
            CompareEntitiesTool {
                entities: names(&["Nope", "Nada"]),
                ..Default::default()
            },
        )
        .await
        .expect_err("expected failure");

        assert_eq!(error.code(), "aggregation_failed");
    }

    #[tokio::test]
    async fn fails_when_every_aspect_lookup_fails() {
        let api = FakeRootData::new(|endpoint, params| match endpoint {
            Endpoint::Search => sample_universe(endpoint, params),
            _ => Err(AppError::upstream(503, "unavailable")),
        });

        let error = compare_entities(
            &api,
            FanOutLimits::default(),
            CompareEntitiesTool {
                entities: names(&["Ethereum", "Paradigm"]),
                aspects: Some(names(&["profile"])),
                compare_type: None,
            },
        )
        .await
        .expect_err("expected aggregation failure");

        assert_eq!(error.code(), "aggregation_failed");
        assert_eq!(api.count(Endpoint::Search), 2);
    }

    #[tokio::test]
    async fn validates_entity_count_and_aspects() {
        let api = FakeRootData::new(sample_universe);

        let too_many = (0..11).map(|i| format!("entity-{i}")).collect();
        let error = compare_entities(
            &api,
            FanOutLimits::default(),
            CompareEntitiesTool {
                entities: too_many,
                ..Default::default()
            },
        )
        .await
        .expect_err("expected validation error");
        assert_eq!(error.code(), "invalid_entities");

        let error = compare_entities(
            &api,
            FanOutLimits::default(),
            CompareEntitiesTool {
                entities: names(&["Ethereum"]),
                aspects: Some(names(&["vibes"])),
                compare_type: None,
            },
        )
        .await
        .expect_err("expected invalid aspect");
        assert_eq!(error.code(), "invalid_aspect");
        assert!(api.calls().is_empty());
    }

    #[test]
    fn compare_type_defaults_to_all() {
        assert_eq!(
            select_aspects(None, None).expect("default aspects"),
            vec![Category::Profile, Category::Funding, Category::Social]
        );
        assert_eq!(
            select_aspects(Some(names(&["Team", "team"])), None).expect("aspects"),
            vec![Category::Team]
        );
        assert_eq!(json!(Category::Team), json!("team"));
    }
}
