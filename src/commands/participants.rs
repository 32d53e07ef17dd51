use nu_plugin::{EngineInterface, EvaluatedCall, PluginCommand};
use nu_protocol::{Category, Example, LabeledError, PipelineData, Signature, Type};

use super::util::{dataset_from_call, groups_flag, output, with_source_flags};
use crate::ops;
use crate::ScoutStatsPlugin;

pub struct Participants;

impl PluginCommand for Participants {
    type Plugin = ScoutStatsPlugin;

    fn name(&self) -> &str {
        "scoutstats participants"
    }

    fn description(&self) -> &str {
        "Total participants over the selected scout groups"
    }

    fn signature(&self) -> Signature {
        with_source_flags(Signature::build(self.name()))
            .input_output_types(vec![
                (Type::Nothing, Type::record()),
                (Type::record(), Type::record()),
                (Type::table(), Type::record()),
            ])
            .category(Category::Experimental)
    }

    fn search_terms(&self) -> Vec<&str> {
        vec!["participants", "total", "count", "scout"]
    }

    fn examples(&self) -> Vec<Example<'_>> {
        vec![Example {
            example: "scoutstats participants --groups [101 201]",
            description: "Participants of two groups",
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
        let groups = groups_flag(call)?;
        let dataset = dataset_from_call(call, input)?;
        Ok(output(&ops::op_participants(&dataset, groups.as_deref()), call.head))
    }
}
