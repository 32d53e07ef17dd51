use nu_plugin::{EngineInterface, EvaluatedCall, PluginCommand};
use nu_protocol::{
    Category, Example, LabeledError, PipelineData, Signature, SyntaxShape, Type, Value,
};

use super::util::{dataset_from_call, groups_flag, nu_to_json, output, with_source_flags};
use crate::algo::table::{ColumnFilterSpec, SortSpec, TableQuery};
use crate::ops;
use crate::ScoutStatsPlugin;

pub struct Table;

impl PluginCommand for Table {
    type Plugin = ScoutStatsPlugin;

    fn name(&self) -> &str {
        "scoutstats table"
    }

    fn description(&self) -> &str {
        "Per-group table of statistics leaves with column metadata, filters and sorting"
    }

    fn signature(&self) -> Signature {
        with_source_flags(Signature::build(self.name()))
            .input_output_types(vec![
                (Type::Nothing, Type::record()),
                (Type::record(), Type::record()),
                (Type::table(), Type::record()),
            ])
            .named(
                "columns",
                SyntaxShape::List(Box::new(SyntaxShape::String)),
                "Column ids such as 'Kön§Man' (default: every column)",
                Some('c'),
            )
            .named(
                "sort",
                SyntaxShape::String,
                "Sort column, optionally suffixed with :asc or :desc",
                Some('s'),
            )
            .named(
                "filters",
                SyntaxShape::List(Box::new(SyntaxShape::Any)),
                "Filter records: {column, range: {min, max}} | {column, oneOf: [...]} | {column, contains}",
                Some('f'),
            )
            .named(
                "cache",
                SyntaxShape::Filepath,
                "SQLite cache database for results",
                None,
            )
            .category(Category::Experimental)
    }

    fn search_terms(&self) -> Vec<&str> {
        vec!["table", "columns", "filter", "sort", "scout"]
    }

    fn examples(&self) -> Vec<Example<'_>> {
        vec![
            Example {
                example: "scoutstats table --columns ['Kön§Man' 'Kön§Kvinna'] --sort 'Kön§Man:desc' | get rows",
                description: "Gender columns, largest male count first",
                result: None,
            },
            Example {
                example: "scoutstats table --filters [{column: num_participants, range: {min: 20}}]",
                description: "Only groups with at least 20 participants",
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
        let columns: Vec<String> = call.get_flag("columns")?.unwrap_or_default();
        let sort: Option<String> = call.get_flag("sort")?;
        let filters: Vec<Value> = call.get_flag("filters")?.unwrap_or_default();
        let cache_path: Option<String> = call.get_flag("cache")?;

        let filters = filters
            .iter()
            .map(|f| serde_json::from_value::<ColumnFilterSpec>(nu_to_json(f)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| LabeledError::new(format!("Invalid filter: {e}")))?;
        let query = TableQuery {
            columns,
            filters,
            sort: sort.as_deref().map(SortSpec::parse),
        };

        let dataset = dataset_from_call(call, input)?;
        let result = ops::op_table_cached(&dataset, groups.as_deref(), &query, cache_path.as_deref());
        Ok(output(&result, call.head))
    }
}
