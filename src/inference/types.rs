//! Tipos de dados da API REST de predição (formato TensorFlow Serving).
//!
//! `GET /v1/models/{model}` devolve o estado das versões carregadas e
//! `POST /v1/models/{model}:predict` recebe instâncias e devolve predições.

use serde::{Deserialize, Serialize};

/// Uma face pré-processada: linhas × colunas × 1 canal, valores em `[0, 1]`.
pub type FaceTensor = Vec<Vec<[f32; 1]>>;

/// Corpo da requisição para `:predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub instances: Vec<FaceTensor>,
}

/// Resposta de `:predict`: um vetor de probabilidades por instância.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Vec<f32>>,
}

/// Resposta do endpoint de status do modelo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatusResponse {
    pub model_version_status: Vec<ModelVersionStatus>,
}

/// Estado de uma versão do modelo no servidor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersionStatus {
    pub version: String,
    /// `START`, `LOADING`, `AVAILABLE`, `UNLOADING` ou `END`.
    pub state: String,
    #[serde(default)]
    pub status: StatusDetail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusDetail {
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
}

impl ModelStatusResponse {
    /// A versão numericamente mais alta em estado `AVAILABLE`, se houver.
    pub fn available_version(&self) -> Option<&ModelVersionStatus> {
        self.model_version_status
            .iter()
            .filter(|v| v.state == "AVAILABLE")
            .max_by_key(|v| v.version.parse::<u64>().unwrap_or(0))
    }

    /// Mensagem de erro mais informativa entre as versões reportadas.
    pub fn describe_unavailable(&self) -> String {
        self.model_version_status
            .iter()
            .find(|v| !v.status.error_message.is_empty())
            .map(|v| format!("version {} is {}: {}", v.version, v.state, v.status.error_message))
            .or_else(|| {
                self.model_version_status
                    .first()
                    .map(|v| format!("version {} is {}", v.version, v.state))
            })
            .unwrap_or_else(|| "no versions loaded".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(json: &str) -> ModelStatusResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn deserialize_from_server_format() {
        let resp = status(
            r#"{"model_version_status": [{
                "version": "3",
                "state": "AVAILABLE",
                "status": {"error_code": "OK", "error_message": ""}
            }]}"#,
        );
        assert_eq!(resp.model_version_status.len(), 1);
        assert_eq!(resp.available_version().unwrap().version, "3");
    }

    #[test]
    fn picks_highest_available_version() {
        let resp = status(
            r#"{"model_version_status": [
                {"version": "2", "state": "AVAILABLE"},
                {"version": "10", "state": "AVAILABLE"},
                {"version": "11", "state": "LOADING"}
            ]}"#,
        );
        assert_eq!(resp.available_version().unwrap().version, "10");
    }

    #[test]
    fn describes_failed_load() {
        let resp = status(
            r#"{"model_version_status": [{
                "version": "1",
                "state": "END",
                "status": {"error_code": "NOT_FOUND", "error_message": "could not find SavedModel"}
            }]}"#,
        );
        assert!(resp.available_version().is_none());
        assert_eq!(
            resp.describe_unavailable(),
            "version 1 is END: could not find SavedModel"
        );
    }

    #[test]
    fn describes_empty_status() {
        let resp = status(r#"{"model_version_status": []}"#);
        assert_eq!(resp.describe_unavailable(), "no versions loaded");
    }

    #[test]
    fn face_tensor_serializes_as_nested_channels() {
        let req = PredictRequest {
            instances: vec![vec![vec![[0.0], [1.0]]]],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"instances":[[[[0.0],[1.0]]]]}"#);
    }
}
