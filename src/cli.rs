//! Interface de linha de comando do actionsm baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status, demo)
//! e flags globais (--config, --timeout, --max-recovery-attempts, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// actionsm — executor de ações com timeout e recuperação limitada.
#[derive(Debug, Parser)]
#[command(name = "actionsm", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo de configuração (padrão: ./actionsm.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Timeout da execução em segundos; sobrescreve o arquivo.
    #[arg(long, global = true)]
    pub timeout: Option<f64>,

    /// Número máximo de tentativas de recuperação; sobrescreve o arquivo.
    #[arg(long, global = true)]
    pub max_recovery_attempts: Option<u32>,

    /// Habilita saída detalhada (logs em nível debug).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconhece o gênero de cada face descrita em um arquivo de goal JSON.
    Run {
        /// Arquivo JSON com `image` (bgr8) e `bounding_boxes`.
        goal: PathBuf,

        /// URL do servidor de inferência; sobrescreve configuração e ambiente.
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Mostra a configuração efetiva e consulta o estado do modelo.
    Status,

    /// Executa uma ação simulada para demonstrar o ciclo de vida.
    Demo {
        /// Quantas vezes o corpo da tarefa falha antes de ter sucesso.
        #[arg(long, default_value_t = 1)]
        fail_times: u32,

        /// Duração de cada execução do corpo da tarefa, em milissegundos.
        #[arg(long, default_value_t = 300)]
        task_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["actionsm", "run", "goal.json"]);
        match cli.command {
            Command::Run { goal, endpoint } => {
                assert_eq!(goal, PathBuf::from("goal.json"));
                assert!(endpoint.is_none());
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "actionsm",
            "--timeout",
            "0.5",
            "--max-recovery-attempts",
            "3",
            "--verbose",
            "demo",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.timeout, Some(0.5));
        assert_eq!(cli.max_recovery_attempts, Some(3));
        match cli.command {
            Command::Demo {
                fail_times,
                task_ms,
            } => {
                assert_eq!(fail_times, 1);
                assert_eq!(task_ms, 300);
            }
            _ => panic!("expected Demo command"),
        }
    }

    #[test]
    fn cli_parses_run_with_endpoint() {
        let cli = Cli::parse_from([
            "actionsm",
            "run",
            "faces.json",
            "--endpoint",
            "http://gpu:8501",
            "--config",
            "robot.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("robot.toml")));
        assert!(matches!(
            cli.command,
            Command::Run { endpoint: Some(ref e), .. } if e == "http://gpu:8501"
        ));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
