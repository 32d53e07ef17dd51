use nu_plugin::{EngineInterface, EvaluatedCall, PluginCommand};
use nu_protocol::{Category, Example, LabeledError, PipelineData, Signature, SyntaxShape, Type};

use super::util::{dataset_from_call, groups_flag, output, with_source_flags};
use crate::ops;
use crate::ScoutStatsPlugin;

pub struct Categories;

impl PluginCommand for Categories {
    type Plugin = ScoutStatsPlugin;

    fn name(&self) -> &str {
        "scoutstats categories"
    }

    fn description(&self) -> &str {
        "List the statistics categories present in the selected scout groups"
    }

    fn signature(&self) -> Signature {
        with_source_flags(Signature::build(self.name()))
            .input_output_types(vec![
                (Type::Nothing, Type::List(Box::new(Type::String))),
                (Type::record(), Type::List(Box::new(Type::String))),
                (Type::table(), Type::List(Box::new(Type::String))),
            ])
            .named(
                "cache",
                SyntaxShape::Filepath,
                "SQLite cache database for results",
                None,
            )
            .category(Category::Experimental)
    }

    fn search_terms(&self) -> Vec<&str> {
        vec!["categories", "questions", "stats", "scout"]
    }

    fn examples(&self) -> Vec<Example<'_>> {
        vec![
            Example {
                example: "scoutstats categories",
                description: "Categories across every group of the default dataset",
                result: None,
            },
            Example {
                example: "open villages.json | scoutstats categories --groups [101 102]",
                description: "Categories answered by two groups",
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
        let groups = groups_flag(call)?;
        let cache_path: Option<String> = call.get_flag("cache")?;
        let dataset = dataset_from_call(call, input)?;
        let result = ops::op_categories_cached(&dataset, groups.as_deref(), cache_path.as_deref());
        Ok(output(&result, call.head))
    }
}
