use serde::{Deserialize, Serialize};

/// One-way group comparison request, as submitted manually or as upload metadata.
///
/// Every field is optional so that "missing" is reported by the ordered
/// validation rules rather than by the deserializer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnovaInput {
    pub case_name: Option<String>,
    pub dependent_name: Option<String>,
    pub independent_name: Option<String>,
    pub alpha: Option<f64>,
    pub input_method: Option<String>,
    pub group_names: Option<Vec<Option<String>>>,
    pub group_values: Option<Vec<Option<Vec<Option<f64>>>>>,
}

#[cfg(test)]
impl AnovaInput {
    pub fn with_groups(groups: &[(&str, &[f64])]) -> Self {
        Self {
            case_name: Some("case".to_string()),
            dependent_name: Some("value".to_string()),
            independent_name: Some("group".to_string()),
            alpha: Some(0.05),
            input_method: Some("manual".to_string()),
            group_names: Some(groups.iter().map(|(n, _)| Some(n.to_string())).collect()),
            group_values: Some(
                groups
                    .iter()
                    .map(|(_, v)| Some(v.iter().map(|x| Some(*x)).collect()))
                    .collect(),
            ),
        }
    }
}

/// Bivariate correlation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationInput {
    pub case_name: Option<String>,
    pub x_name: Option<String>,
    pub y_name: Option<String>,
    pub alpha: Option<f64>,
    pub input_method: Option<String>,
    pub x_values: Option<Vec<Option<f64>>>,
    pub y_values: Option<Vec<Option<f64>>>,
}

#[cfg(test)]
impl CorrelationInput {
    pub fn with_pairs(x: &[f64], y: &[f64]) -> Self {
        Self {
            case_name: Some("case".to_string()),
            x_name: Some("x".to_string()),
            y_name: Some("y".to_string()),
            alpha: Some(0.05),
            input_method: Some("manual".to_string()),
            x_values: Some(x.iter().map(|v| Some(*v)).collect()),
            y_values: Some(y.iter().map(|v| Some(*v)).collect()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupValue {
    pub group: String,
    pub value: f64,
}

/// Grouped dataset as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredGrouped {
    pub id: i64,
    pub case_name: String,
    pub dependent_name: String,
    pub independent_name: String,
    pub alpha: f64,
    pub input_method: String,
    pub n: i64,
    pub k: i64,
    pub groups: Vec<GroupValue>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Paired dataset as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPaired {
    pub id: i64,
    pub case_name: String,
    pub x_name: String,
    pub y_name: String,
    pub alpha: f64,
    pub input_method: String,
    pub n: i64,
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anova_input_camel_case_and_nulls() {
        let json = r#"{
            "caseName": "Fertilizer",
            "dependentName": "Yield",
            "alpha": 0.05,
            "groupNames": ["A", null],
            "groupValues": [[1.0, null], null]
        }"#;
        let input: AnovaInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.case_name.as_deref(), Some("Fertilizer"));
        assert_eq!(input.independent_name, None);
        assert_eq!(input.input_method, None);
        assert_eq!(input.group_names, Some(vec![Some("A".to_string()), None]));
        assert_eq!(
            input.group_values,
            Some(vec![Some(vec![Some(1.0), None]), None])
        );
    }

    #[test]
    fn test_correlation_input_field_names() {
        let json = r#"{"caseName":"c","xName":"Height","yName":"Weight","alpha":0.01,
            "inputMethod":"manual","xValues":[1,2],"yValues":[3,4]}"#;
        let input: CorrelationInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.x_name.as_deref(), Some("Height"));
        assert_eq!(input.y_values, Some(vec![Some(3.0), Some(4.0)]));
    }
}
