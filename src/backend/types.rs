//! Tipos de dados trocados com a API HTTP do backend de try-on.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` e usam nomes de
//! campo em camelCase, conforme o formato JSON do serviço.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::state_machine::{JobId, MediaRef};

/// Uma imagem no formato aceito pelo endpoint `POST /jobs`.
///
/// Blobs binários viajam codificados em base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WireMedia {
    Url { value: String },
    DataUri { value: String },
    Base64 { content_type: String, data: String },
}

impl From<&MediaRef> for WireMedia {
    fn from(media: &MediaRef) -> Self {
        match media {
            MediaRef::Url { url } => WireMedia::Url { value: url.clone() },
            MediaRef::DataUri { uri } => WireMedia::DataUri { value: uri.clone() },
            MediaRef::Blob {
                content_type,
                bytes,
            } => WireMedia::Base64 {
                content_type: content_type.clone(),
                data: STANDARD.encode(bytes),
            },
        }
    }
}

/// Corpo da requisição de submissão de um job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    /// Peça de roupa escolhida.
    pub garment: WireMedia,
    /// Foto capturada do usuário.
    pub photo: WireMedia,
}

/// Resposta de `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: JobId,
}

/// Resposta de `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_is_base64_encoded() {
        let media = MediaRef::Blob {
            content_type: "image/jpeg".into(),
            bytes: b"hello".to_vec(),
        };
        let wire = WireMedia::from(&media);
        assert_eq!(
            wire,
            WireMedia::Base64 {
                content_type: "image/jpeg".into(),
                data: "aGVsbG8=".into(),
            }
        );
    }

    #[test]
    fn wire_media_uses_type_tag() {
        let wire = WireMedia::from(&MediaRef::url("https://cdn/shirt.png"));
        let json = serde_json::to_string(&wire).unwrap();
        assert_eq!(json, r#"{"type":"url","value":"https://cdn/shirt.png"}"#);

        let blob = WireMedia::Base64 {
            content_type: "image/png".into(),
            data: "AA==".into(),
        };
        let json = serde_json::to_string(&blob).unwrap();
        assert!(json.contains(r#""contentType":"image/png""#));
    }

    #[test]
    fn submit_response_deserializes() {
        let resp: SubmitJobResponse = serde_json::from_str(r#"{"jobId":"job-42"}"#).unwrap();
        assert_eq!(resp.job_id, JobId::new("job-42"));
    }
}
