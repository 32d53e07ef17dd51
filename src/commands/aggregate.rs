use nu_plugin::{EngineInterface, EvaluatedCall, PluginCommand};
use nu_protocol::{Category, Example, LabeledError, PipelineData, Signature, SyntaxShape, Type};

use super::util::{dataset_from_call, groups_flag, output, with_source_flags};
use crate::ops;
use crate::ScoutStatsPlugin;

pub struct Aggregate;

impl PluginCommand for Aggregate {
    type Plugin = ScoutStatsPlugin;

    fn name(&self) -> &str {
        "scoutstats aggregate"
    }

    fn description(&self) -> &str {
        "Aggregate one statistics category across the selected scout groups"
    }

    fn extra_description(&self) -> &str {
        "Numeric answers are summed, free-text lists are concatenated and counted, \
         and per-group string answers are grouped by answer. Flat categories are \
         collected under the `_direct` sub-question."
    }

    fn signature(&self) -> Signature {
        with_source_flags(Signature::build(self.name()))
            .input_output_types(vec![
                (Type::Nothing, Type::record()),
                (Type::record(), Type::record()),
                (Type::table(), Type::record()),
            ])
            .required("category", SyntaxShape::String, "Category to aggregate")
            .named(
                "cache",
                SyntaxShape::Filepath,
                "SQLite cache database for results",
                None,
            )
            .category(Category::Experimental)
    }

    fn search_terms(&self) -> Vec<&str> {
        vec!["aggregate", "statistics", "answers", "survey", "scout"]
    }

    fn examples(&self) -> Vec<Example<'_>> {
        vec![
            Example {
                example: "scoutstats aggregate Resa",
                description: "Travel answers summed over every group",
                result: None,
            },
            Example {
                example: "scoutstats aggregate Resa | get subQuestions.Ankomsttid.groupedByAnswer",
                description: "Which groups arrive at which time",
                result: None,
            },
        ]
    }

    fn run(
        &self,
        _plugin: &ScoutStatsPlugin,
        _engine: &EngineInterface,
        call: &EvaluatedCall,
        input: PipelineData,
    ) -> Result<PipelineData, LabeledError> {
        let category: String = call.req(0)?;
        let groups = groups_flag(call)?;
        let cache_path: Option<String> = call.get_flag("cache")?;
        let dataset = dataset_from_call(call, input)?;
        let result =
            ops::op_aggregate_cached(&dataset, groups.as_deref(), &category, cache_path.as_deref());
        Ok(output(&result, call.head))
    }
}
