//! Configuração do tryon carregada a partir de `tryon.toml`.
//!
//! A struct [`TryOnConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `TRYON_API_URL`, `TRYON_API_KEY` e `TRYON_PUSH_URL`
//! têm precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::channels::PollSettings;
use crate::error::{Result, TryOnError};

/// Configuração de nível superior carregada de `tryon.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TryOnConfig {
    /// URL base da API de processamento.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Chave de acesso à API, enviada como bearer token.
    #[serde(default)]
    pub api_key: String,

    /// URL WebSocket dos eventos de job; sem ela o canal push fica mudo.
    #[serde(default)]
    pub push_url: Option<String>,

    /// Atraso em milissegundos antes da primeira consulta de status.
    #[serde(default = "default_poll_delay_ms")]
    pub poll_initial_delay_ms: u64,

    /// Intervalo em milissegundos entre consultas de status.
    #[serde(default = "default_poll_delay_ms")]
    pub poll_interval_ms: u64,

    /// Máximo de consultas antes de oferecer a verificação manual.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Diretório onde ficam os snapshots de sessão por aba.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
}

// Valor padrão da URL da API: servidor local.
fn default_api_base_url() -> String {
    "http://localhost:8080".to_string()
}

// 3 segundos entre consultas.
fn default_poll_delay_ms() -> u64 {
    3000
}

// 60 tentativas × 3s ≈ 3 minutos de espera sem atenção.
fn default_poll_max_attempts() -> u32 {
    60
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".tryon/sessions")
}

impl Default for TryOnConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: String::new(),
            push_url: None,
            poll_initial_delay_ms: default_poll_delay_ms(),
            poll_interval_ms: default_poll_delay_ms(),
            poll_max_attempts: default_poll_max_attempts(),
            session_dir: default_session_dir(),
        }
    }
}

impl TryOnConfig {
    /// Carrega a configuração de um caminho explícito, normalmente
    /// `tryon.toml` no diretório atual. Usa valores padrão se o arquivo
    /// não existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TryOnConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variáveis de ambiente têm precedência sobre o arquivo.
        if let Ok(url) = std::env::var("TRYON_API_URL")
            && !url.is_empty()
        {
            config.api_base_url = url;
        }
        if let Ok(key) = std::env::var("TRYON_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }
        if let Ok(url) = std::env::var("TRYON_PUSH_URL")
            && !url.is_empty()
        {
            config.push_url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejeita combinações que deixariam o polling sem sentido.
    pub fn validate(&self) -> Result<()> {
        if self.poll_max_attempts == 0 {
            return Err(TryOnError::Config(
                "poll_max_attempts must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(TryOnError::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Parâmetros do canal de polling derivados desta configuração.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            initial_delay: Duration::from_millis(self.poll_initial_delay_ms),
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.poll_max_attempts,
        }
    }
}
