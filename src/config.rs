//! Configuração do actionsm carregada a partir de `actionsm.toml`.
//!
//! A struct [`ActionsmConfig`] contém todos os parâmetros configuráveis,
//! divididos nas seções `[executor]` e `[recognition]`.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `ACTIONSM_ENDPOINT` tem precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::executor::ExecutorConfig;

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "actionsm.toml";

/// Variável de ambiente que sobrescreve `recognition.endpoint`.
pub const ENDPOINT_ENV: &str = "ACTIONSM_ENDPOINT";

/// Configuração de nível superior carregada de `actionsm.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsmConfig {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub recognition: RecognitionConfig,
}

/// Seção `[executor]`: orçamento de tempo e de recuperação.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// Tempo máximo de uma execução, em segundos.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Máximo de entradas em RECOVERING antes de marcar a execução como falha.
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,
}

/// Seção `[recognition]`: onde está o modelo e como interpretar sua saída.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionConfig {
    /// URL base do servidor de inferência.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Nome do modelo no servidor.
    #[serde(default = "default_model")]
    pub model: String,

    /// Rótulo de cada classe, na ordem de saída do modelo.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    /// Largura e altura da entrada do modelo, em pixels.
    #[serde(default = "default_image_size")]
    pub image_size: [u32; 2],
}

// Valor padrão para o timeout: 120 segundos.
fn default_timeout_secs() -> f64 {
    120.0
}

// Valor padrão para tentativas de recuperação: 1.
fn default_max_recovery_attempts() -> u32 {
    1
}

fn default_endpoint() -> String {
    "http://localhost:8501".to_string()
}

fn default_model() -> String {
    "gender".to_string()
}

fn default_labels() -> Vec<String> {
    vec!["female".to_string(), "male".to_string()]
}

fn default_image_size() -> [u32; 2] {
    [64, 64]
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_recovery_attempts: default_max_recovery_attempts(),
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            labels: default_labels(),
            image_size: default_image_size(),
        }
    }
}

impl ExecutorSection {
    /// Converte a seção para [`ExecutorConfig`], rejeitando timeouts negativos ou não finitos.
    pub fn to_executor_config(&self) -> Result<ExecutorConfig> {
        let timeout = parse_timeout(self.timeout_secs)?;
        Ok(ExecutorConfig {
            timeout,
            max_recovery_attempts: self.max_recovery_attempts,
        })
    }
}

impl RecognitionConfig {
    pub fn input_size(&self) -> (u32, u32) {
        (self.image_size[0], self.image_size[1])
    }
}

/// Converte segundos em [`Duration`], com erro legível para valores inválidos.
pub fn parse_timeout(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        bail!("timeout must be a finite, non-negative number of seconds, got {secs}");
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("timeout {secs}s is out of range"))
}

impl ActionsmConfig {
    /// Carrega a configuração de `actionsm.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de `path`, aplicando a variável de ambiente por cima.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<ActionsmConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para o endpoint.
        Ok(config.with_endpoint_override(std::env::var(ENDPOINT_ENV).ok()))
    }

    fn with_endpoint_override(mut self, endpoint: Option<String>) -> Self {
        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            self.recognition.endpoint = endpoint;
        }
        self
    }
}
