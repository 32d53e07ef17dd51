use nu_plugin::{EngineInterface, EvaluatedCall, PluginCommand};
use nu_protocol::{Category, Example, LabeledError, PipelineData, Signature, SyntaxShape, Type};

use super::util::{dataset_from_call, output};
use crate::ops;
use crate::ScoutStatsPlugin;

pub struct Villages;

impl PluginCommand for Villages {
    type Plugin = ScoutStatsPlugin;

    fn name(&self) -> &str {
        "scoutstats villages"
    }

    fn description(&self) -> &str {
        "List villages and their scout groups"
    }

    fn signature(&self) -> Signature {
        Signature::build(self.name())
            .input_output_types(vec![
                (Type::Nothing, Type::table()),
                (Type::record(), Type::table()),
                (Type::table(), Type::table()),
            ])
            .named(
                "filter",
                SyntaxShape::String,
                "Case-insensitive search over village and group names",
                Some('f'),
            )
            .named(
                "data",
                SyntaxShape::Filepath,
                "Dataset JSON file, used when nothing is piped in",
                Some('d'),
            )
            .category(Category::Experimental)
    }

    fn search_terms(&self) -> Vec<&str> {
        vec!["villages", "groups", "search", "scout"]
    }

    fn examples(&self) -> Vec<Example<'_>> {
        vec![Example {
            example: "scoutstats villages --filter bromma",
            description: "Villages that host a group named like 'bromma'",
            result: None,
        }]
    }

    fn run(
        &self,
        _plugin: &ScoutStatsPlugin,
        _engine: &EngineInterface,
        call: &EvaluatedCall,
        input: PipelineData,
    ) -> Result<PipelineData, LabeledError> {
        let filter: Option<String> = call.get_flag("filter")?;
        let dataset = dataset_from_call(call, input)?;
        Ok(output(&ops::op_villages(&dataset, filter.as_deref()), call.head))
    }
}
