//! Model metadata stored next to each artifact

use crate::error::PredictError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Input key and default field name of SMILES models
pub const SMILES_KEY: &str = "SMILES";

/// How a model expects its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum InputType {
    /// Pre-computed numeric feature values; also used when metadata names no type
    #[default]
    #[serde(rename = "descriptors_values")]
    DescriptorsValues,
    /// Text lines of SMILES plus optional numeric and solvent fields
    #[serde(rename = "SMILES")]
    Smiles,
}

impl InputType {
    const NAMES: &'static [&'static str] = &["descriptors_values", "SMILES"];
}

/// Absent, `null` and empty input types select the default variant; any other
/// unknown tag is rejected.
fn deserialize_input_type<'de, D>(deserializer: D) -> Result<InputType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") | Some("descriptors_values") => Ok(InputType::DescriptorsValues),
        Some("SMILES") => Ok(InputType::Smiles),
        Some(other) => Err(D::Error::unknown_variant(other, InputType::NAMES)),
    }
}

/// Output port description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outport {
    pub name: String,
}

/// Metadata describing how to dispatch a model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default, deserialize_with = "deserialize_input_type")]
    pub input_type: InputType,

    /// Ordered field names of SMILES models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_spec: Option<Vec<String>>,

    #[serde(default)]
    pub outports: Vec<Outport>,
}

impl ModelMetadata {
    /// Declared fields, `["SMILES"]` when none are given
    pub fn fields(&self) -> Vec<String> {
        match &self.input_spec {
            Some(spec) if !spec.is_empty() => spec.clone(),
            _ => vec![SMILES_KEY.to_string()],
        }
    }

    /// Display name of the predicted quantity
    pub fn output_name(&self) -> Result<&str, PredictError> {
        self.outports
            .first()
            .map(|o| o.name.as_str())
            .ok_or(PredictError::MissingOutport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_null_and_empty_input_type_use_default() {
        for json in [
            r#"{"outports": [{"name": "Tg"}]}"#,
            r#"{"input_type": null, "outports": []}"#,
            r#"{"input_type": "", "outports": []}"#,
            r#"{"input_type": "descriptors_values"}"#,
        ] {
            let meta: ModelMetadata = serde_json::from_str(json).unwrap();
            assert_eq!(meta.input_type, InputType::DescriptorsValues, "{json}");
        }
    }

    #[test]
    fn test_smiles_metadata() {
        let meta: ModelMetadata = serde_json::from_str(
            r#"{"input_type": "SMILES", "input_spec": ["SMILES", "Solvent"], "outports": [{"name": "logK"}]}"#,
        )
        .unwrap();
        assert_eq!(meta.input_type, InputType::Smiles);
        assert_eq!(meta.fields(), vec!["SMILES", "Solvent"]);
        assert_eq!(meta.output_name().unwrap(), "logK");
    }

    #[test]
    fn test_default_fields_and_missing_outport() {
        let meta: ModelMetadata = serde_json::from_str(r#"{"input_type": "SMILES"}"#).unwrap();
        assert_eq!(meta.fields(), vec!["SMILES"]);
        assert!(matches!(meta.output_name(), Err(PredictError::MissingOutport)));
    }

    #[test]
    fn test_unknown_input_type_is_rejected() {
        let result: Result<ModelMetadata, _> =
            serde_json::from_str(r#"{"input_type": "graph"}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("graph"));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let meta = ModelMetadata {
            input_type: InputType::Smiles,
            input_spec: Some(vec!["SMILES".into()]),
            outports: vec![Outport { name: "y".into() }],
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains(r#""input_type":"SMILES""#));
        let back: ModelMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
