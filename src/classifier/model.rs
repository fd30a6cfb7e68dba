use serde::Deserialize;

use crate::model::Classification;

/// Wire shape of the classification gateway response.
#[derive(Debug, Deserialize)]
pub struct ClassifyResp {
    #[serde(rename = "cropType")]
    pub crop_type: String,
    #[serde(rename = "isHealthy")]
    pub is_healthy: bool,
    #[serde(rename = "diseaseName")]
    pub disease_name: Option<String>,
    #[serde(rename = "diseaseType")]
    pub disease_type: Option<String>,
    pub confidence: f64,
    pub observations: Option<String>,
}

impl ClassifyResp {
    pub fn into_classification(self) -> Classification {
        Classification {
            crop_type: self.crop_type,
            is_healthy: self.is_healthy,
            disease_name: self.disease_name,
            disease_type: self.disease_type,
            confidence: self.confidence,
            observations: self.observations,
        }
    }
}
