//! Prompt assembly for the generative query
//!
//! The prompt is a list of typed fragments (header, one data-dictionary entry
//! per explore, the fixed few-shot examples, the question) rendered by
//! [`render`]. Escaping and size budgets are applied around that, so the
//! LLM-facing layout can be tested on its own.

use crate::config::{BudgetPolicy, PromptBudget};
use crate::error::{PipelineError, Result};
use crate::metadata::{ExploreMetadata, FieldMetadata};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Characters backslash-escaped before metadata is embedded in the prompt
const ESCAPED_CHARACTERS: [char; 3] = ['\'', '"', '`'];

/// Anchors the output schema. Must stay byte-for-byte stable across requests.
pub const FEW_SHOT_EXAMPLES: &str = r#"input: Listar total de alunos por grupo de série e UF dos 10 primeiros estados com maior quantidade de alunos com probabilidade de evadir maior que 90%.
output: {"model": "poc-results", "view": "results_prediction_evasao_v4", "fields": ["results_prediction_evasao_v4.estado_aluno", "results_prediction_evasao_v4.agg_serie", "results_prediction_evasao_v4.count"], filters=>{:"results_prediction_evasao_v4.predicted_score"=>0.9}, "sorts": ["results_prediction_evasao_v4.count desc"], "pivots": null, "limit": "10"}
input: Total de alunos por região com previsão real de evadirem
output: {"model": "poc-results", "view": "results_prediction_evasao_v4", "fields": ["results_prediction_evasao_v4.regiao_aluno", "results_prediction_evasao_v4.count"], "filters": {"results_prediction_evasao_v4.predicted_label": "evasao", "results_prediction_evasao_v4.prediction": "true_positive"}, "sorts": ["results_prediction_evasao_v4.count desc"], "pivots": null, "limit": "50"}
input: Total de alunos por região com previsão real de evadirem que estão no primeiro quartil da base de predicao
output: {"model": "poc-results", "view": "results_prediction_evasao_v4", "fields": ["results_prediction_evasao_v4.regiao_aluno", "results_prediction_evasao_v4.count"], "filters": {"results_prediction_evasao_v4.predicted_label": "evasao", "results_prediction_evasao_v4.prediction": "true_positive", "results_prediction_evasao_v4.quartil": "1st"}, "sorts": ["results_prediction_evasao_v4.count desc"], "pivots": null, "limit": "50"}
input: Média de ticket mensal por alunos com previsão de evadirem
output: {"model": "poc-results", "view": "results_prediction_evasao_v4", "fields": ["results_prediction_evasao_v4.avg_tk_mensal"], "filters":  {"results_prediction_evasao_v4.predicted_label": "evasao"}, "sorts": null, "pivots": null, "limit": "500"}
input: Qual a quantidade de alunos por modalidade? Mostre as informacoes fazendo um pivot por quartil.
output: {"model": "poc-results", "view": "results_prediction_evasao_v4", "fields": ["results_prediction_evasao_v4.modalidade", "results_prediction_evasao_v4.quartil", "results_prediction_evasao_v4.count"], "filters": null, "sorts": ["results_prediction_evasao_v4.count desc"], "pivots": ["results_prediction_evasao_v4.quartil"], "limit": "50"}
input: Liste as 5 variaveis mais importantes para a previsão de evasão de um aluno
output: {"model": "poc-results", "view": "evasao_features_attribution", "fields": ["evasao_features_attribution.field", "evasao_features_attribution.importance"], "filters":  null, "sorts": ["evasao_features_attribution.importance desc"], "pivots": null, "limit": "5"}
input: Qual a quantidade de alunos agrupado por modalidade e tipo de aluno?
output: {"model": "poc-results", "view": "results_prediction_evasao_v4", "fields": ["results_prediction_evasao_v4.modalidade", "results_prediction_evasao_v4.tipo_aluno", "results_prediction_evasao_v4.count"], "filters": null, "sorts": ["results_prediction_evasao_v4.count desc"], "pivots": null, "limit": "50"}"#;

/// Backslash-escapes quote characters for embedding inside a SQL string.
///
/// A quote already preceded by an odd run of backslashes is treated as
/// escaped, so applying this twice gives the same result as applying it once.
pub fn escape_special_characters(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    let mut backslashes = 0usize;
    for ch in input.chars() {
        if ESCAPED_CHARACTERS.contains(&ch) && backslashes % 2 == 0 {
            out.push('\\');
        }
        out.push(ch);
        if ch == '\\' {
            backslashes += 1;
        } else {
            backslashes = 0;
        }
    }
    out
}

/// Serializes `text` as a JSON string literal with single quotes escaped,
/// ready to sit between `'...'` in a SQL statement.
pub fn to_sql_literal(text: &str) -> Result<String> {
    let json = serde_json::to_string(text)?;
    Ok(json.replace('\'', "\\'"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptFragment {
    Header {
        model_name: String,
        explore_names: String,
    },
    Dictionary {
        explore_name: String,
        escaped_metadata: String,
    },
    Examples(&'static str),
    Question(String),
}

/// Single formatting function for the LLM-facing layout
pub fn render(fragments: &[PromptFragment]) -> String {
    let mut lines = Vec::with_capacity(fragments.len() + 2);
    for fragment in fragments {
        match fragment {
            PromptFragment::Header {
                model_name,
                explore_names,
            } => {
                lines.push("Escreva uma saída simples seguindo os exemplos fornecidos a seguir. Use os seguintes dicionarios de dados para obter os campos, filtros e pivots necessários para a consulta.".to_string());
                lines.push(format!(
                    "Sempre retorne o modelo: {}  e views: {}.",
                    model_name, explore_names
                ));
            }
            PromptFragment::Dictionary {
                explore_name,
                escaped_metadata,
            } => lines.push(format!(
                "Dicionário de dados dos campos da view {}: {}",
                explore_name, escaped_metadata
            )),
            PromptFragment::Examples(examples) => lines.push(examples.to_string()),
            PromptFragment::Question(question) => {
                lines.push(format!("input: {}", question));
                lines.push("output:".to_string());
            }
        }
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// `" ou a ou b"` with the leading three-character connective removed
fn explore_names_fragment(explores: &[ExploreMetadata]) -> String {
    let joined: String = explores
        .iter()
        .map(|explore| format!(" ou {}", explore.name))
        .collect();
    joined
        .get(3..)
        .unwrap_or_default()
        .replace('\'', "\\'")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
    literal: String,
}

impl Prompt {
    /// Composed prompt before SQL quoting
    pub fn text(&self) -> &str {
        &self.text
    }

    /// JSON-quoted, SQL-safe form of the prompt
    pub fn literal(&self) -> &str {
        &self.literal
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    budget: PromptBudget,
}

impl PromptBuilder {
    pub fn new(budget: PromptBudget) -> Self {
        Self { budget }
    }

    pub fn fragments(
        &self,
        model_name: &str,
        explores: &[ExploreMetadata],
        question: &str,
    ) -> Vec<PromptFragment> {
        let mut fragments = Vec::with_capacity(explores.len() + 3);
        fragments.push(PromptFragment::Header {
            model_name: model_name.to_string(),
            explore_names: explore_names_fragment(explores),
        });
        for explore in explores {
            fragments.push(PromptFragment::Dictionary {
                explore_name: explore.name.clone(),
                escaped_metadata: escape_special_characters(&explore.field_metadata),
            });
        }
        fragments.push(PromptFragment::Examples(FEW_SHOT_EXAMPLES));
        fragments.push(PromptFragment::Question(question.to_string()));
        fragments
    }

    pub fn build(
        &self,
        model_name: &str,
        explores: &[ExploreMetadata],
        question: &str,
    ) -> Result<Prompt> {
        let explores = self.fit_to_budget(model_name, explores, question)?;

        let text = render(&self.fragments(model_name, &explores, question));
        let length = text.chars().count();
        if length > self.budget.max_prompt_chars {
            return Err(PipelineError::PromptTooLarge {
                subject: "prompt".to_string(),
                actual: length,
                budget: self.budget.max_prompt_chars,
            });
        }

        let literal = to_sql_literal(&text)?;
        debug!("The generated prompt is {}", literal);

        Ok(Prompt { text, literal })
    }

    /// Applies the per-explore budget according to the configured policy
    fn fit_to_budget<'e>(
        &self,
        model_name: &str,
        explores: &'e [ExploreMetadata],
        question: &str,
    ) -> Result<Cow<'e, [ExploreMetadata]>> {
        match self.budget.policy {
            BudgetPolicy::Reject => {
                for explore in explores {
                    let length = escaped_len(&explore.field_metadata);
                    if length > self.budget.max_tile_chars {
                        return Err(PipelineError::PromptTooLarge {
                            subject: format!("explore {}", explore.name),
                            actual: length,
                            budget: self.budget.max_tile_chars,
                        });
                    }
                }
                Ok(Cow::Borrowed(explores))
            }
            BudgetPolicy::Truncate => {
                if explores.is_empty() {
                    return Ok(Cow::Borrowed(explores));
                }

                // Everything except the metadata itself counts as overhead
                let skeleton: Vec<ExploreMetadata> = explores
                    .iter()
                    .map(|e| ExploreMetadata {
                        name: e.name.clone(),
                        field_metadata: String::new(),
                    })
                    .collect();
                let overhead = render(&self.fragments(model_name, &skeleton, question))
                    .chars()
                    .count();
                let share = self.budget.max_prompt_chars.saturating_sub(overhead) / explores.len();
                let tile_budget = share.min(self.budget.max_tile_chars);
                if tile_budget < self.budget.min_tile_chars {
                    return Err(PipelineError::PromptTooLarge {
                        subject: format!("per-explore share across {} explores", explores.len()),
                        actual: tile_budget,
                        budget: self.budget.min_tile_chars,
                    });
                }

                let fitted = explores
                    .iter()
                    .map(|explore| truncate_explore(explore, tile_budget))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Cow::Owned(fitted))
            }
        }
    }
}

fn escaped_len(metadata: &str) -> usize {
    escape_special_characters(metadata).chars().count()
}

/// Keeps the longest prefix of the explore's fields whose escaped
/// serialization fits in `tile_budget`
fn truncate_explore(explore: &ExploreMetadata, tile_budget: usize) -> Result<ExploreMetadata> {
    if escaped_len(&explore.field_metadata) <= tile_budget {
        return Ok(explore.clone());
    }

    let fields: Vec<FieldMetadata> = explore.fields()?;
    let fits = |count: usize| -> Result<bool> {
        let serialized = serde_json::to_string(&fields[..count])?;
        Ok(escaped_len(&serialized) <= tile_budget)
    };

    // Serialized length grows with the prefix, so binary search the cut
    let (mut low, mut high) = (0usize, fields.len());
    while low < high {
        let mid = (low + high + 1) / 2;
        if fits(mid)? {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    warn!(
        "Truncated explore {} metadata from {} to {} fields",
        explore.name,
        fields.len(),
        low
    );
    ExploreMetadata::new(explore.name.clone(), &fields[..low])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, description: &str) -> FieldMetadata {
        FieldMetadata {
            label: name.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    fn explore(name: &str, fields: &[FieldMetadata]) -> ExploreMetadata {
        ExploreMetadata::new(name, fields).unwrap()
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_special_characters(r#"it's "x""#), r#"it\'s \"x\""#);
        assert_eq!(escape_special_characters("a`b"), "a\\`b");
        assert_eq!(escape_special_characters("plain"), "plain");
    }

    #[test]
    fn test_escape_is_idempotent() {
        let inputs = [
            r#"[{"label":"Count","name":"v.count","description":"it's"}]"#,
            r#"already \' escaped"#,
            r#"double \\' backslash"#,
            r#"trailing \"#,
            "",
        ];
        for input in inputs {
            let once = escape_special_characters(input);
            assert_eq!(escape_special_characters(&once), once, "input: {}", input);
        }
    }

    #[test]
    fn test_escape_even_backslash_run_still_escapes() {
        // `\\` is an escaped backslash, so the quote after it is bare
        assert_eq!(escape_special_characters(r#"\\'"#), r#"\\\'"#);
    }

    #[test]
    fn test_explore_names_fragment() {
        let explores = vec![explore("a", &[]), explore("b's", &[])];
        assert_eq!(explore_names_fragment(&explores), " a ou b\\'s");
        assert_eq!(explore_names_fragment(&[]), "");
    }

    #[test]
    fn test_render_layout() {
        let builder = PromptBuilder::default();
        let explores = vec![explore("orders", &[field("orders.count", "n")])];
        let text = render(&builder.fragments("shop", &explores, "How many orders?"));

        assert!(text.starts_with("Escreva uma saída simples"));
        assert!(text.contains("Sempre retorne o modelo: shop  e views:  orders."));
        assert!(text.contains(
            r#"Dicionário de dados dos campos da view orders: [{\"label\":\"orders.count\",\"name\":\"orders.count\",\"description\":\"n\"}]"#
        ));
        assert!(text.contains(FEW_SHOT_EXAMPLES));
        assert!(text.ends_with("input: How many orders?\noutput:\n"));
    }

    #[test]
    fn test_prompt_contains_question_once_and_all_explores() {
        let builder = PromptBuilder::default();
        let explores = vec![
            explore("orders", &[field("orders.count", "")]),
            explore("customers", &[field("customers.city", "")]),
            explore("inventory_items", &[]),
        ];
        let question = "Quantos pedidos por cidade em 2023?";
        let prompt = builder.build("shop", &explores, question).unwrap();

        assert_eq!(prompt.text().matches(question).count(), 1);
        assert_eq!(prompt.literal().matches(question).count(), 1);
        for e in &explores {
            assert!(prompt.literal().contains(&e.name));
        }
    }

    #[test]
    fn test_literal_is_sql_safe() {
        let builder = PromptBuilder::default();
        let explores = vec![explore("orders", &[field("orders.count", "it's")])];
        let prompt = builder.build("shop", &explores, "what's up?\nnext").unwrap();
        let literal = prompt.literal();

        assert!(literal.starts_with('"') && literal.ends_with('"'));
        assert!(!literal.contains('\n'));
        // every single quote is escaped by an odd backslash run
        let chars: Vec<char> = literal.chars().collect();
        for (i, ch) in chars.iter().enumerate() {
            if *ch == '\'' {
                let run = chars[..i].iter().rev().take_while(|c| **c == '\\').count();
                assert_eq!(run % 2, 1, "bare quote at {}", i);
            }
        }
    }

    #[test]
    fn test_reject_oversized_prompt() {
        let builder = PromptBuilder::new(PromptBudget {
            max_prompt_chars: 100,
            ..PromptBudget::default()
        });
        let err = builder.build("shop", &[explore("orders", &[])], "q").unwrap_err();
        assert!(matches!(err, PipelineError::PromptTooLarge { ref subject, .. } if subject == "prompt"));
    }

    #[test]
    fn test_reject_oversized_tile() {
        let builder = PromptBuilder::new(PromptBudget {
            max_tile_chars: 10,
            ..PromptBudget::default()
        });
        let explores = vec![explore("orders", &[field("orders.count", "long description")])];
        let err = builder.build("shop", &explores, "q").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PromptTooLarge { ref subject, budget: 10, .. } if subject == "explore orders"
        ));
    }

    #[test]
    fn test_truncate_drops_trailing_fields() {
        let fields: Vec<FieldMetadata> = (0..200)
            .map(|i| field(&format!("orders.field_{}", i), "some description text"))
            .collect();
        let explores = vec![explore("orders", &fields)];
        let budget = PromptBudget {
            max_prompt_chars: 8000,
            max_tile_chars: 2000,
            min_tile_chars: 500,
            policy: BudgetPolicy::Truncate,
        };
        let builder = PromptBuilder::new(budget);

        let fitted = builder.fit_to_budget("shop", &explores, "q").unwrap();
        let kept = fitted[0].fields().unwrap();
        assert!(!kept.is_empty() && kept.len() < fields.len());
        assert_eq!(kept[..], fields[..kept.len()]);
        assert!(escaped_len(&fitted[0].field_metadata) <= 2000);

        let prompt = builder.build("shop", &explores, "q").unwrap();
        assert!(prompt.text().chars().count() <= 8000);
    }

    #[test]
    fn test_truncate_rejects_share_below_minimum() {
        let explores: Vec<ExploreMetadata> = (0..50)
            .map(|i| explore(&format!("explore_{}", i), &[field("x", "y")]))
            .collect();
        let builder = PromptBuilder::new(PromptBudget {
            policy: BudgetPolicy::Truncate,
            ..PromptBudget::default()
        });
        let err = builder.build("shop", &explores, "q").unwrap_err();
        assert!(matches!(err, PipelineError::PromptTooLarge { budget: 6000, .. }));
    }
}
