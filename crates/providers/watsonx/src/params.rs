//! Generation and embedding parameter objects.
//!
//! Every field is optional; `merged` layers per-call overrides over the
//! instance defaults and unset fields are omitted from the request so the
//! provider default applies. Ranges are not validated locally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// `per_call.field.or(default.field)` for every listed field.
macro_rules! merge_optional {
    ($overrides:expr, $defaults:expr; $($field:ident),+ $(,)?) => {
        Self {
            $($field: $overrides.$field.clone().or_else(|| $defaults.$field.clone()),)+
        }
    };
}

/// Options for `text/chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    /// e.g. `{"type":"json_object"}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<JsonValue>,
    /// Force a specific function: `{"type":"function","function":{"name":..}}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<JsonValue>,
    /// `auto`, `none` or `required`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice_option: Option<String>,
}

impl ChatParams {
    pub fn merged(defaults: &ChatParams, overrides: &ChatParams) -> ChatParams {
        merge_optional!(overrides, defaults;
            max_tokens, temperature, top_p, frequency_penalty, presence_penalty, n,
            logprobs, top_logprobs, seed, stop, time_limit, response_format,
            tool_choice, tool_choice_option,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodingMethod {
    Greedy,
    Sample,
}

/// Exponential penalty on length once `start_index` tokens are generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthPenalty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<u32>,
}

/// Extra fields echoed back in text-generation results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_tokens: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_logprobs: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ranks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n_tokens: Option<u32>,
}

/// Options for `text/generation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextGenParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoding_method: Option<DecodingMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_penalty: Option<LengthPenalty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_new_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_options: Option<ReturnOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_stop_sequence: Option<bool>,
    /// Only meaningful for deployments: values substituted into the prompt template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_variables: Option<BTreeMap<String, String>>,
}

impl TextGenParameters {
    pub fn merged(defaults: &TextGenParameters, overrides: &TextGenParameters) -> TextGenParameters {
        merge_optional!(overrides, defaults;
            decoding_method, length_penalty, max_new_tokens, min_new_tokens, random_seed,
            stop_sequences, temperature, time_limit, top_k, top_p, repetition_penalty,
            truncate_input_tokens, return_options, include_stop_sequence, prompt_variables,
        )
    }

    /// Parameters for a deployment call with `input` bound to the prompt.
    pub fn with_prompt_input(mut self, prompt: &str) -> TextGenParameters {
        self.prompt_variables
            .get_or_insert_with(BTreeMap::new)
            .insert("input".to_string(), prompt.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingReturnOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<bool>,
}

/// Options for `text/embeddings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_options: Option<EmbeddingReturnOptions>,
}

impl EmbeddingParameters {
    pub fn is_empty(&self) -> bool {
        self.truncate_input_tokens.is_none() && self.return_options.is_none()
    }
}
