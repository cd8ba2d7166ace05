//! Paper counting tool

use crate::Tool;
use async_trait::async_trait;
use finder_core::{Error, Result};
use finder_llm::tools::schema;
use serde_json::{Value, json};

/// Registered name of the counting tool
pub const COUNT_PAPERS_TOOL: &str = "count_papers";

/// Count the papers in a list of search results
///
/// Total over its input: every slice, including the empty one, has a count.
pub fn count_papers(papers: &[String]) -> usize {
    papers.len()
}

/// [`count_papers`] exposed as a [`Tool`]
///
/// Input: `{"papers": [string, ...]}`. Output: the count as a JSON integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountPapersTool;

impl CountPapersTool {
    fn papers_param(params: &Value) -> Result<Vec<String>> {
        let papers = params.get("papers").ok_or_else(|| {
            Error::InvalidParameters("missing required parameter 'papers'".to_string())
        })?;
        let items = papers.as_array().ok_or_else(|| {
            Error::InvalidParameters("'papers' must be an array of strings".to_string())
        })?;

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Error::InvalidParameters(format!(
                        "'papers[{index}]' must be a string, got {item}"
                    ))
                })
            })
            .collect()
    }
}

#[async_trait]
impl Tool for CountPapersTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let papers = Self::papers_param(&params)?;
        Ok(json!(count_papers(&papers)))
    }

    fn name(&self) -> &str {
        COUNT_PAPERS_TOOL
    }

    fn description(&self) -> &str {
        "Counts the number of papers in a list of strings, \
         where each string is a research paper result."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "papers": schema::array(
                    "A list of strings, where each string is a research paper result",
                    schema::string("One research paper result"),
                ),
            }),
            vec!["papers"],
        )
    }
}
