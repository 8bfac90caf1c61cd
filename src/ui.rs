//! Interface de terminal do tryon: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`TryOnProgress`] acompanha visualmente
//! a espera pelo resultado de um job no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::coordinator::StateChange;
use crate::session::TabSession;
use crate::state_machine::Phase;

/// Indicador visual de progresso para um job de try-on no terminal.
///
/// Exibe um spinner animado enquanto o job processa e mensagens
/// coloridas para resultado exibido (verde), falha (vermelho) e portão
/// fechado ou verificação manual (amarelo).
#[derive(Clone)]
pub struct TryOnProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para avisos.
    yellow: Style,
}

impl TryOnProgress {
    /// Inicia o spinner com uma mensagem inicial e retorna a instância de progresso.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Reflete uma notificação do coordenador no terminal.
    pub fn handle(&self, change: &StateChange) {
        match change {
            StateChange::Submitted { job_id } => {
                self.pb.set_message(format!("{}: job {job_id}", Phase::AwaitingResult));
            }
            StateChange::Progress { job_id, progress } => {
                let pct = progress.map(|p| format!(" {p}%")).unwrap_or_default();
                self.pb.set_message(format!("{}: job {job_id}{pct}", Phase::AwaitingResult));
            }
            StateChange::Gated { job_id } => {
                self.pb.println(format!(
                    "  {} Result for {job_id} is ready; contact details needed to show it",
                    self.yellow.apply_to("⏸")
                ));
                self.pb.set_message(format!("{}: waiting for contact details", Phase::Gated));
            }
            StateChange::Displayed { result_url, .. } => {
                self.pb.println(format!(
                    "  {} Result: {result_url}",
                    self.green.apply_to("✓")
                ));
                self.pb.set_message(format!("{}: creating order", Phase::OrderPending));
            }
            StateChange::OrderCreated { order } => {
                self.pb.finish_and_clear();
                println!("  {} Order {} created", self.green.apply_to("✓"), order.id);
            }
            StateChange::OrderFailed { error, .. } => {
                self.pb.finish_and_clear();
                println!("  {} Order not created: {error}", self.red.apply_to("✗"));
            }
            StateChange::Failed { job_id, error } => {
                self.pb.finish_and_clear();
                println!("  {} Job {job_id} failed: {error}", self.red.apply_to("✗"));
            }
            StateChange::ManualCheckAvailable { job_id } => {
                self.pb.println(format!(
                    "  {} Still processing {job_id}; checking manually",
                    self.yellow.apply_to("↻")
                ));
            }
            StateChange::Reset => self.pb.finish_and_clear(),
        }
    }

    /// Para o spinner sem imprimir nada.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Imprime o snapshot de sessão de uma aba formatado em JSON com estilo colorido.
pub fn print_session(tab_key: &str, session: &TabSession) {
    let style = match session.state.phase {
        Phase::Complete | Phase::Displayed => Style::new().green().bold(),
        Phase::Failed => Style::new().red().bold(),
        _ => Style::new().yellow(),
    };
    println!(
        "{}",
        style.apply_to(format!("─── Tab {tab_key}: {} ───", session.state.phase))
    );
    println!(
        "{}",
        serde_json::to_string_pretty(session).unwrap_or_default()
    );
}
