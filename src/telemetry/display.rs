//! Display Handler (C9): renders telemetry samples as they arrive.
//!
//! A closed sum type rather than a trait object — exactly three presentations exist and
//! the set is chosen once at startup, so there is no need for open-ended dynamic
//! dispatch here.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use log::info;
use tokio_util::sync::CancellationToken;

use crate::error::PiclError;
use crate::node::Node;

use super::AgentResponse;

const KEY_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// One of the three ways a monitor run can present incoming telemetry.
pub enum DisplayHandler {
    Table(TableHandler),
    Line(LineHandler),
    Silent(SilentHandler),
}

impl DisplayHandler {
    pub fn handle(&mut self, response: &AgentResponse) -> Result<(), PiclError> {
        match self {
            DisplayHandler::Table(h) => h.handle(response),
            DisplayHandler::Line(h) => h.handle(response),
            DisplayHandler::Silent(h) => h.handle(response),
        }
    }

    pub fn close(&mut self) {
        match self {
            DisplayHandler::Table(h) => h.close(),
            DisplayHandler::Line(h) => h.close(),
            DisplayHandler::Silent(h) => h.close(),
        }
    }

    /// Spawns the terminal key-event watcher for the Table handler only; the Line and
    /// Silent handlers never put the terminal in raw mode, so their Ctrl-C is already
    /// delivered as a normal signal and needs no polling loop here.
    pub fn watch_keys(&self, token: CancellationToken) -> Option<tokio::task::JoinHandle<()>> {
        match self {
            DisplayHandler::Table(_) => Some(tokio::task::spawn_blocking(move || watch_keys(token))),
            DisplayHandler::Line(_) | DisplayHandler::Silent(_) => None,
        }
    }
}

/// Polls for `q` (graceful cancel, same path as Ctrl-C outside of raw mode) and Ctrl-C
/// (immediate exit) while the table's raw terminal mode is active. Raw mode disables
/// signal generation, so Ctrl-C arrives here as a key event rather than `SIGINT`.
fn watch_keys(token: CancellationToken) {
    while !token.is_cancelled() {
        match event::poll(KEY_POLL_INTERVAL) {
            Ok(true) => {
                let Ok(Event::Key(key)) = event::read() else {
                    continue;
                };
                if key.code == KeyCode::Char('q') {
                    token.cancel();
                    return;
                }
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    ratatui::restore();
                    std::process::exit(130);
                }
            }
            Ok(false) => {}
            Err(_) => return,
        }
    }
}

/// One row per node, rendered with `ratatui`; redraws the whole table after every
/// sample. `q` or Ctrl-C requests cancellation via [`DisplayHandler::watch_keys`]'s
/// terminal event loop, not here — this type only owns render state.
pub struct TableHandler {
    names: Vec<String>,
    rows: Vec<Option<super::TelemetrySample>>,
    terminal: Option<ratatui::DefaultTerminal>,
}

impl TableHandler {
    pub fn new(nodes: &[Node]) -> std::io::Result<Self> {
        Ok(Self {
            names: nodes.iter().map(|n| n.name.clone()).collect(),
            rows: vec![None; nodes.len()],
            terminal: Some(ratatui::init()),
        })
    }

    fn handle(&mut self, response: &AgentResponse) -> Result<(), PiclError> {
        if let Some(slot) = self.rows.get_mut(response.index) {
            *slot = response.result.clone().ok();
        }
        if let Some(terminal) = self.terminal.as_mut() {
            let names = &self.names;
            let rows = &self.rows;
            terminal
                .draw(|frame| render_table(frame, names, rows))
                .map_err(|e| PiclError::ConfigError(e.to_string()))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.terminal.take().is_some() {
            ratatui::restore();
        }
    }
}

fn render_table(
    frame: &mut ratatui::Frame,
    names: &[String],
    rows: &[Option<super::TelemetrySample>],
) {
    use ratatui::layout::Constraint;
    use ratatui::widgets::{Block, Borders, Row, Table};

    let header = Row::new(vec!["Name", "Temp", "CPU Usage", "RAM Usage"]);
    let body = names.iter().zip(rows.iter()).map(|(name, sample)| match sample {
        Some(s) => Row::new(vec![
            name.clone(),
            format!("{:.2}", s.cpu_temp / 1000.0),
            format!("{:.2}%", s.cpu_usage),
            format!("{:.2}%", s.mem_usage),
        ]),
        None => Row::new(vec![
            name.clone(),
            "N/A".to_string(),
            "N/A".to_string(),
            "N/A".to_string(),
        ]),
    });
    let widths = [
        Constraint::Percentage(40),
        Constraint::Percentage(20),
        Constraint::Percentage(20),
        Constraint::Percentage(20),
    ];
    let table = Table::new(body, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("picl monitor"));
    frame.render_widget(table, frame.area());
}

/// Prints one line per sample to stdout.
#[derive(Default)]
pub struct LineHandler;

impl LineHandler {
    fn handle(&mut self, response: &AgentResponse) -> Result<(), PiclError> {
        match &response.result {
            Ok(sample) => println!(
                "{:2}. {:>10}   Tmp: {:4.2}   CPU: {:4.2}%   Mem: {:4.2}%",
                response.index,
                response.name,
                sample.cpu_temp / 1000.0,
                sample.cpu_usage,
                sample.mem_usage,
            ),
            Err(e) => println!("{:2}. {:>10}   error: {e}", response.index, response.name),
        }
        Ok(())
    }

    fn close(&mut self) {
        info!("monitor stopped");
    }
}

/// Discards samples. Useful for integration tests that exercise the pipeline without a
/// terminal.
#[derive(Default)]
pub struct SilentHandler {
    pub received: Vec<AgentResponse>,
}

impl SilentHandler {
    fn handle(&mut self, response: &AgentResponse) -> Result<(), PiclError> {
        self.received.push(response.clone());
        Ok(())
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetrySample;

    #[test]
    fn silent_handler_records_every_response() {
        let mut handler = SilentHandler::default();
        let response = AgentResponse {
            index: 0,
            name: "nodeA".into(),
            result: Ok(TelemetrySample {
                cpu_temp: 45000.0,
                cpu_usage: 12.5,
                mem_usage: 33.0,
            }),
        };
        handler.handle(&response).unwrap();
        assert_eq!(handler.received.len(), 1);
    }

    #[test]
    fn silent_handler_records_errors_too() {
        let mut handler = SilentHandler::default();
        let response = AgentResponse {
            index: 1,
            name: "nodeB".into(),
            result: Err("timeout".into()),
        };
        handler.handle(&response).unwrap();
        assert_eq!(handler.received.len(), 1);
    }
}
