//! Interface de terminal do actionsm — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`ActionProgress`] acompanha visualmente
//! os estados de uma execução no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use actionsm::{ActionResult, AuditRecord, State};

/// Indicador visual de progresso para uma execução no terminal.
///
/// Exibe um spinner animado com o estado ativo e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e recuperação (amarelo).
pub struct ActionProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Nome da ação exibido ao lado do estado.
    action: String,
    green: Style,
    red: Style,
    yellow: Style,
}

impl ActionProgress {
    /// Inicia o spinner com o nome da ação e retorna a instância de progresso.
    pub fn start(action: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{}: {action}", State::Uninitialized));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            action: action.to_string(),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Callback para `ActionExecutor::on_transition` que mantém o spinner
    /// sincronizado com o estado ativo.
    pub fn hook(&self) -> impl Fn(State, State) + Send + Sync + 'static {
        let pb = self.pb.clone();
        let action = self.action.clone();
        let yellow = self.yellow.clone();
        move |from, to| {
            if to == State::Recovering {
                pb.println(format!(
                    "  {} {from} failed, recovering",
                    yellow.apply_to("↻")
                ));
            }
            pb.set_message(format!("{to}: {action}"));
        }
    }

    /// Finaliza o spinner e exibe o resultado final da execução.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X.
    pub fn complete<P: Serialize>(&self, result: &ActionResult<P>) {
        self.pb.finish_and_clear();
        match (&result.payload, &result.failure) {
            (Some(payload), _) => {
                let payload = serde_json::to_string(payload).unwrap_or_default();
                println!(
                    "  {} {} done: {payload}",
                    self.green.apply_to("✓"),
                    self.action
                );
            }
            (None, Some(kind)) => {
                println!("  {} {} failed: {kind}", self.red.apply_to("✗"), self.action);
            }
            (None, None) => {
                println!("  {} {} failed", self.red.apply_to("✗"), self.action);
            }
        }
    }

    /// Imprime o registro de auditoria formatado em JSON com estilo colorido.
    pub fn print_audit(&self, record: &AuditRecord) {
        let status_style = match record.final_state {
            State::Done => &self.green,
            State::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Audit Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}
