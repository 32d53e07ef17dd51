use nu_plugin::{EngineInterface, EvaluatedCall, PluginCommand};
use nu_protocol::{Category, Example, LabeledError, PipelineData, Signature, SyntaxShape, Type};

use super::util::output;
use crate::ops;
use crate::ScoutStatsPlugin;

pub struct CacheCmd;

impl PluginCommand for CacheCmd {
    type Plugin = ScoutStatsPlugin;

    fn name(&self) -> &str {
        "scoutstats cache"
    }

    fn description(&self) -> &str {
        "Manage the persistent scoutstats result cache"
    }

    fn signature(&self) -> Signature {
        Signature::build(self.name())
            .input_output_types(vec![(Type::Nothing, Type::record())])
            .required(
                "path",
                SyntaxShape::String,
                "Path to the SQLite cache database",
            )
            .switch(
                "clear",
                "Clear cached entries instead of showing info",
                Some('c'),
            )
            .named(
                "kind",
                SyntaxShape::String,
                "Entry kind to clear: aggregation, categories, table (default: all)",
                Some('k'),
            )
            .category(Category::Experimental)
    }

    fn search_terms(&self) -> Vec<&str> {
        vec!["cache", "clear", "info", "sqlite"]
    }

    fn examples(&self) -> Vec<Example<'_>> {
        vec![
            Example {
                example: "scoutstats cache stats.db",
                description: "Show cache info",
                result: None,
            },
            Example {
                example: "scoutstats cache stats.db --clear --kind table",
                description: "Clear only cached tables",
                result: None,
            },
        ]
    }

    fn run(
        &self,
        _plugin: &ScoutStatsPlugin,
        _engine: &EngineInterface,
        call: &EvaluatedCall,
        _input: PipelineData,
    ) -> Result<PipelineData, LabeledError> {
        let cache_path: String = call.req(0)?;
        let clear: bool = call.has_flag("clear")?;
        let kind: Option<String> = call.get_flag("kind")?;

        let result = if clear {
            ops::op_cache_clear(&cache_path, kind.as_deref())
        } else {
            ops::op_cache_info(&cache_path)
        };

        match result {
            Ok(json_val) => Ok(output(&json_val, call.head)),
            Err(e) => Err(LabeledError::new(e.to_string())),
        }
    }
}
