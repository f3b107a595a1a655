use anyhow::{Context as _, Result};
use std::path::PathBuf;

use crate::bots::BotIdentity;

/// Configuración del proceso, cargada de variables de entorno.
#[derive(Debug, Clone)]
pub struct Config {
    pub bots: Vec<BotIdentity>,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        // DISCORD_BOTS = lista de identidades en JSON. Si no está, se
        // arma una identidad única con DISCORD_TOKEN.
        let bots = match std::env::var("DISCORD_BOTS") {
            Ok(raw) => serde_json::from_str(&raw).context("DISCORD_BOTS no es un JSON válido")?,
            Err(_) => {
                let token = std::env::var("DISCORD_TOKEN")
                    .context("falta DISCORD_BOTS o DISCORD_TOKEN en el entorno")?;
                vec![BotIdentity {
                    nickname: std::env::var("BOT_NICKNAME")
                        .unwrap_or_else(|_| "ensemble".to_string()),
                    token,
                    default_prefix: std::env::var("DEFAULT_PREFIX")
                        .unwrap_or_else(|_| "!".to_string()),
                }]
            }
        };

        let config = Self {
            bots,
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
        };

        std::fs::create_dir_all(&config.data_dir)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bots.is_empty() {
            anyhow::bail!("Debe configurarse al menos una identidad de bot");
        }
        for (index, bot) in self.bots.iter().enumerate() {
            if bot.nickname.trim().is_empty() {
                anyhow::bail!("La identidad #{} no tiene apodo", index + 1);
            }
            if bot.token.trim().is_empty() {
                anyhow::bail!("La identidad {:?} no tiene token", bot.nickname);
            }
            if bot.default_prefix.is_empty() {
                anyhow::bail!(
                    "La identidad {:?} no tiene prefijo por defecto",
                    bot.nickname
                );
            }
        }

        let mut nicknames: Vec<&str> = self.bots.iter().map(|bot| bot.nickname.as_str()).collect();
        nicknames.sort_unstable();
        nicknames.dedup();
        if nicknames.len() != self.bots.len() {
            anyhow::bail!("Hay apodos de bot duplicados");
        }

        Ok(())
    }

    /// Ruta del documento de prefijos compartido por todos los bots.
    pub fn prefix_document_path(&self) -> PathBuf {
        self.data_dir.join("prefixes.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(nickname: &str) -> BotIdentity {
        BotIdentity {
            nickname: nickname.to_string(),
            token: "token-de-prueba".to_string(),
            default_prefix: "!".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_distinct_identities() {
        let config = Config {
            bots: vec![identity("uno"), identity("dos")],
            data_dir: "./data".into(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_nicknames() {
        let config = Config {
            bots: vec![identity("uno"), identity("uno")],
            data_dir: "./data".into(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let mut bot = identity("uno");
        bot.token = "  ".to_string();
        let config = Config {
            bots: vec![bot],
            data_dir: "./data".into(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_no_bots() {
        let config = Config {
            bots: Vec::new(),
            data_dir: "./data".into(),
        };
        assert!(config.validate().is_err());
    }
}
