//! Interface de linha de comando do tryon baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`]
//! (run, resume, confirm-order, check, status, reset, demo) e flags globais
//! (--config, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tryon: entrega de resultados de try-on virtual.
#[derive(Debug, Parser)]
#[command(name = "tryon", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração.
    #[arg(long, global = true, default_value = "tryon.toml")]
    pub config: PathBuf,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Dados de contato opcionais; quando ausentes são pedidos no terminal.
#[derive(Debug, Clone, Default, Args)]
pub struct ContactArgs {
    /// Nome do cliente.
    #[arg(long)]
    pub name: Option<String>,

    /// E-mail do cliente.
    #[arg(long)]
    pub email: Option<String>,

    /// Telefone do cliente.
    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia um job de try-on e acompanha até o pedido.
    Run {
        /// Imagem da peça: URL, data URI ou caminho de arquivo.
        #[arg(long)]
        garment: String,

        /// Foto do cliente: URL, data URI ou caminho de arquivo.
        #[arg(long)]
        photo: String,

        #[command(flatten)]
        contact: ContactArgs,

        /// Chave da aba; uma nova é gerada se omitida.
        #[arg(long)]
        tab: Option<String>,
    },

    /// Retoma o fluxo salvo de uma aba.
    Resume {
        #[arg(long)]
        tab: String,

        #[command(flatten)]
        contact: ContactArgs,
    },

    /// Resolve um pedido de resultado desconhecido após recarregar a aba.
    ///
    /// Com `--order-id` registra o pedido encontrado; sem ele declara que o
    /// pedido não existe e libera uma nova tentativa via `resume`.
    ConfirmOrder {
        #[arg(long)]
        tab: String,

        /// Identificador do pedido encontrado no armazenamento de pedidos.
        #[arg(long)]
        order_id: Option<String>,
    },

    /// Consulta o status de um job diretamente, sem afetar nenhuma aba.
    Check {
        /// Identificador do job.
        job_id: String,
    },

    /// Mostra o snapshot salvo de uma aba.
    Status {
        #[arg(long)]
        tab: String,
    },

    /// Apaga o snapshot de uma aba.
    Reset {
        #[arg(long)]
        tab: String,
    },

    /// Executa a demonstração embutida com backend simulado.
    Demo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from([
            "tryon",
            "run",
            "--garment",
            "https://cdn/shirt.png",
            "--photo",
            "me.jpg",
            "--name",
            "Ana",
            "--email",
            "ana@example.com",
        ]);
        match cli.command {
            Command::Run {
                garment,
                photo,
                contact,
                tab,
            } => {
                assert_eq!(garment, "https://cdn/shirt.png");
                assert_eq!(photo, "me.jpg");
                assert_eq!(contact.name.as_deref(), Some("Ana"));
                assert_eq!(contact.email.as_deref(), Some("ana@example.com"));
                assert!(contact.phone.is_none());
                assert!(tab.is_none());
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["tryon", "--config", "other.toml", "--verbose", "demo"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(matches!(cli.command, Command::Demo));
    }

    #[test]
    fn cli_requires_tab_for_status() {
        assert!(Cli::try_parse_from(["tryon", "status"]).is_err());
        let cli = Cli::parse_from(["tryon", "status", "--tab", "tab-1"]);
        assert!(matches!(cli.command, Command::Status { ref tab } if tab == "tab-1"));
    }

    #[test]
    fn cli_parses_check_subcommand() {
        let cli = Cli::parse_from(["tryon", "check", "job-42"]);
        assert!(matches!(cli.command, Command::Check { ref job_id } if job_id == "job-42"));
    }

    #[test]
    fn cli_parses_confirm_order_subcommand() {
        let cli = Cli::parse_from(["tryon", "confirm-order", "--tab", "tab-1"]);
        assert!(matches!(
            cli.command,
            Command::ConfirmOrder { ref tab, order_id: None } if tab == "tab-1"
        ));

        let cli = Cli::parse_from([
            "tryon",
            "confirm-order",
            "--tab",
            "tab-1",
            "--order-id",
            "ord-7",
        ]);
        assert!(matches!(
            cli.command,
            Command::ConfirmOrder { order_id: Some(ref id), .. } if id == "ord-7"
        ));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
