//! CLI command implementations
//!
//! - plan: target and split a sub-pipeline offline, print the result
//! - check-config: load and validate a router configuration

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_json_file, write_response};
use crate::coordinator::RouterConfig;
use crate::observability::Logger;
use crate::pipeline::{MergeStep, SortSpec, SplitPipeline, Stage, SubPipeline};
use crate::routing::{ChunkVersion, KeyInterval, PartitionMap, ShardId, Targeter};

/// What the router would send where, for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchPlan {
    pub namespace: String,
    pub version: ChunkVersion,
    pub shards: BTreeSet<ShardId>,
    pub interval: KeyInterval,
    pub shard_stages: Vec<Stage>,
    pub merge_sort: Option<SortSpec>,
    pub merge_steps: Vec<MergeStep>,
    pub batch_size: Option<u32>,
}

/// Entry point: parse arguments and run
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Plan {
            routing,
            pipeline,
            config,
        } => plan(&routing, &pipeline, config.as_deref()),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Print the dispatch plan for a sub-pipeline
pub fn plan(routing_path: &Path, pipeline_path: &Path, config_path: Option<&Path>) -> CliResult<()> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    let map: PartitionMap = read_json_file(routing_path, "routing snapshot")?;
    let pipeline: SubPipeline = read_json_file(pipeline_path, "pipeline")?;

    let plan = build_plan(&map, &pipeline, &config)?;
    write_response(serde_json::to_value(&plan)?)
}

/// Target and split `pipeline` against `map`
pub fn build_plan(
    map: &PartitionMap,
    pipeline: &SubPipeline,
    config: &RouterConfig,
) -> CliResult<DispatchPlan> {
    pipeline.validate()?;
    if map.namespace() != pipeline.namespace() {
        return Err(CliError::input_error(format!(
            "routing snapshot is for {} but the pipeline reads {}",
            map.namespace(),
            pipeline.namespace()
        )));
    }

    let targeting = Targeter::target(map, pipeline);
    let split = SplitPipeline::split(pipeline.stages());
    Ok(DispatchPlan {
        namespace: pipeline.namespace().to_string(),
        version: map.version(),
        shards: targeting.shards,
        interval: targeting.interval,
        shard_stages: split.shard_stages,
        merge_sort: split.merge_sort,
        merge_steps: split.merge_steps,
        batch_size: config.batch_size,
    })
}

/// Load and validate a configuration file, print it with defaults applied
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    write_response(serde_json::to_value(&config)?)
}

fn load_config(path: &Path) -> CliResult<RouterConfig> {
    let config = RouterConfig::load(path)?;
    if let Some(severity) = config.severity() {
        Logger::set_min_severity(severity);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Namespace, Predicate};
    use crate::routing::{Chunk, KeyBound};
    use serde_json::json;
    use uuid::Uuid;

    fn map() -> PartitionMap {
        PartitionMap::new(
            Namespace::new("test", "coll"),
            Some("_id".into()),
            Uuid::new_v4(),
            ChunkVersion::new(2, 1),
            vec![
                Chunk::new(KeyBound::MinKey, KeyBound::Value(json!(0)), "0"),
                Chunk::new(KeyBound::Value(json!(0)), KeyBound::MaxKey, "1"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_plan() {
        let pipeline = SubPipeline::new(
            Namespace::new("test", "coll"),
            vec![
                Stage::Match(vec![Predicate::gte("_id", json!(0))]),
                Stage::Sort(SortSpec::asc("_id")),
            ],
        );
        let plan = build_plan(&map(), &pipeline, &RouterConfig::default()).unwrap();
        assert_eq!(plan.shards.into_iter().collect::<Vec<_>>(), vec![ShardId::new("1")]);
        assert_eq!(plan.merge_sort, Some(SortSpec::asc("_id")));
        assert_eq!(plan.shard_stages.len(), 2);
        assert_eq!(plan.version, ChunkVersion::new(2, 1));
    }

    #[test]
    fn test_plan_rejects_namespace_mismatch() {
        let pipeline = SubPipeline::new(Namespace::new("test", "other"), vec![]);
        let err = build_plan(&map(), &pipeline, &RouterConfig::default()).unwrap_err();
        assert_eq!(err.code_str(), "SHARDUNION_CLI_INPUT_ERROR");
    }

    #[test]
    fn test_plan_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let routing = dir.path().join("routing.json");
        let pipeline = dir.path().join("pipeline.json");
        std::fs::write(&routing, serde_json::to_string(&map()).unwrap()).unwrap();
        std::fs::write(
            &pipeline,
            r#"{"namespace": "test.coll", "stages": [{"limit": 5}]}"#,
        )
        .unwrap();

        assert!(plan(&routing, &pipeline, None).is_ok());
    }

    #[test]
    fn test_check_config_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.json");
        std::fs::write(&path, r#"{"batch_size": 0}"#).unwrap();

        let err = check_config(&path).unwrap_err();
        assert_eq!(err.code_str(), "SHARDUNION_CLI_CONFIG_ERROR");
    }
}
