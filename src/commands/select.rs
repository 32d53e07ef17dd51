use nu_plugin::{EngineInterface, EvaluatedCall, PluginCommand};
use nu_protocol::{
    Category, Example, LabeledError, PipelineData, Signature, SyntaxShape, Type, Value,
};

use super::util::{dataset_from_call, nu_to_json, output};
use crate::algo::selection::SelectionState;
use crate::ops::{self, SelectOp};
use crate::ScoutStatsPlugin;

pub struct Select;

/// Command-line operation names mapped to their `op` tags.
const OPERATIONS: &[(&str, &str)] = &[
    ("show", "show"),
    ("toggle-group", "toggleGroup"),
    ("toggle-village", "toggleVillage"),
    ("clear", "clear"),
    ("select-all", "selectAll"),
    ("narrow", "narrow"),
    ("narrow-by-answer", "narrowByAnswer"),
    ("toggle-expansion", "toggleExpansion"),
];

impl PluginCommand for Select {
    type Plugin = ScoutStatsPlugin;

    fn name(&self) -> &str {
        "scoutstats select"
    }

    fn description(&self) -> &str {
        "Apply a selection operation to a selection state"
    }

    fn extra_description(&self) -> &str {
        "Operations: show, toggle-group --id, toggle-village --village, clear, \
         select-all [--filter], narrow --ids [--label], \
         narrow-by-answer --category --sub-question --answer, toggle-expansion --village. \
         The output's `state` field is the input for the next call."
    }

    fn signature(&self) -> Signature {
        Signature::build(self.name())
            .input_output_types(vec![
                (Type::Nothing, Type::record()),
                (Type::record(), Type::record()),
                (Type::table(), Type::record()),
            ])
            .required("operation", SyntaxShape::String, "Operation to apply")
            .named("state", SyntaxShape::Record(vec![]), "Current selection state", Some('s'))
            .named("id", SyntaxShape::Int, "Scout group id", None)
            .named("village", SyntaxShape::Any, "Village id", Some('v'))
            .named(
                "ids",
                SyntaxShape::List(Box::new(SyntaxShape::Int)),
                "Scout group ids to narrow to",
                None,
            )
            .named("label", SyntaxShape::String, "Label for the narrowing step", Some('l'))
            .named("filter", SyntaxShape::String, "Village search term for select-all", Some('f'))
            .named("category", SyntaxShape::String, "Category for narrow-by-answer", None)
            .named("sub-question", SyntaxShape::String, "Sub-question for narrow-by-answer", None)
            .named("answer", SyntaxShape::String, "Answer for narrow-by-answer", None)
            .named(
                "data",
                SyntaxShape::Filepath,
                "Dataset JSON file, used when nothing is piped in",
                Some('d'),
            )
            .category(Category::Experimental)
    }

    fn search_terms(&self) -> Vec<&str> {
        vec!["select", "selection", "narrow", "toggle", "scout"]
    }

    fn examples(&self) -> Vec<Example<'_>> {
        vec![
            Example {
                example: "scoutstats select narrow --ids [101 102 201] --label Ja",
                description: "Start a drill-down from an empty selection",
                result: None,
            },
            Example {
                example: "let s = (scoutstats select toggle-village --village 1 | get state); scoutstats select narrow-by-answer --state $s --category Resa --sub-question Ankomsttid --answer 08:00",
                description: "Select a village, then keep only groups arriving at 08:00",
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
        let name: String = call.req(0)?;
        let tag = OPERATIONS
            .iter()
            .find(|(cli, tag)| *cli == name || *tag == name)
            .map(|(_, tag)| *tag)
            .ok_or_else(|| {
                let known: Vec<&str> = OPERATIONS.iter().map(|(cli, _)| *cli).collect();
                LabeledError::new(format!("Unknown operation '{name}'. Use: {}", known.join(", ")))
            })?;

        let state: SelectionState = match call.get_flag::<Value>("state")? {
            Some(v) => serde_json::from_value(nu_to_json(&v))
                .map_err(|e| LabeledError::new(format!("Invalid selection state: {e}")))?,
            None => SelectionState::default(),
        };
        let dataset = dataset_from_call(call, input)?;

        if tag == "show" {
            return Ok(output(&ops::selection_report(&dataset, &state), call.head));
        }

        let mut op = serde_json::Map::new();
        op.insert("op".into(), tag.into());
        for (flag, field) in [
            ("id", "id"),
            ("village", "village"),
            ("ids", "ids"),
            ("label", "label"),
            ("filter", "filter"),
            ("category", "category"),
            ("sub-question", "subQuestion"),
            ("answer", "answer"),
        ] {
            if let Some(v) = call.get_flag::<Value>(flag)? {
                op.insert(field.into(), nu_to_json(&v));
            }
        }
        let op: SelectOp = serde_json::from_value(serde_json::Value::Object(op))
            .map_err(|e| LabeledError::new(format!("Invalid arguments for '{name}': {e}")))?;

        let result = ops::op_select(&dataset, state, &op)
            .map_err(|e| LabeledError::new(e.to_string()))?;
        Ok(output(&result, call.head))
    }
}
