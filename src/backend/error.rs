//! Tipos de erro para o backend de processamento de try-on.
//!
//! Define [`ApiError`] com variantes para erros HTTP, falhas de rede e
//! respostas que não puderam ser decodificadas. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao falar com o backend.
///
/// Uma falha de rede ou um status 429/5xx numa consulta de status é
/// transitória: o canal de polling tenta de novo dentro do limite de tentativas.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Erro retornado pela API (ex.: 404 job inexistente, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// O corpo da resposta não tem o formato esperado.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Indica se repetir a mesma requisição mais tarde pode dar certo.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Decode(_) => false,
        }
    }
}
