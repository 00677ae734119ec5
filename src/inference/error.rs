//! Tipos de erro para o cliente do servidor de inferência.
//!
//! Define [`InferenceError`] com variantes para rate limiting, erros HTTP
//! e erros de rede. Usa `thiserror` para derivar `Display` e `Error`
//! automaticamente a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao consultar o servidor de modelos.
///
/// - [`RateLimited`](InferenceError::RateLimited) — o servidor retornou HTTP 429
/// - [`ApiError`](InferenceError::ApiError) — qualquer outro erro HTTP (4xx/5xx)
/// - [`NetworkError`](InferenceError::NetworkError) — falha na camada de rede
#[derive(Debug, Error)]
pub enum InferenceError {
    /// O servidor retornou HTTP 429.
    /// O campo `retry_after_ms` indica quantos milissegundos esperar antes de retentar.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro retornado pelo servidor (ex.: 404 modelo desconhecido, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, corpo inválido).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = InferenceError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn api_error_display() {
        let err = InferenceError::ApiError {
            status: 404,
            message: "Servable not found".into(),
        };
        assert_eq!(err.to_string(), "API error (status 404): Servable not found");
    }
}
