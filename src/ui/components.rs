//! Panels of the terminal dashboard

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;
use std::collections::VecDeque;

use super::{LogLevel, Phase, Progress};

/// Current phase, info line and batch counters
pub struct StatusPanel {
    phase: Phase,
    info: String,
    processed: u64,
    failed: u64,
}

impl StatusPanel {
    pub fn new() -> Self {
        Self {
            phase: Phase::Scanning,
            info: String::new(),
            processed: 0,
            failed: 0,
        }
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn set_info(&mut self, info: impl Into<String>) {
        self.info = info.into();
    }

    pub fn count(&mut self, level: LogLevel) {
        match level {
            LogLevel::Error => self.failed += 1,
            LogLevel::Success => self.processed += 1,
            LogLevel::Info | LogLevel::Warn => {}
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let phase_style = match self.phase {
            Phase::Complete => Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            _ => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        };

        let phase_indicator = match self.phase {
            Phase::Scanning => "◐",
            Phase::Processing => "⚙",
            Phase::Exporting => "⤷",
            Phase::Complete => "✓",
        };

        let failed_style = if self.failed > 0 {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Gray)
        };

        let lines = vec![
            Line::from(vec![
                Span::styled(format!(" {} ", phase_indicator), phase_style),
                Span::styled(self.phase.to_string(), phase_style),
            ]),
            Line::from(vec![
                Span::raw("   "),
                Span::styled(&self.info, Style::default().fg(Color::Gray)),
            ]),
            Line::from(vec![
                Span::raw("   "),
                Span::styled(
                    format!("{} processed", self.processed),
                    Style::default().fg(Color::Green),
                ),
                Span::raw("  "),
                Span::styled(format!("{} failed", self.failed), failed_style),
            ]),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" SQL Lineage ")
            .border_style(Style::default().fg(Color::Blue));

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

/// Progress bar over the scripts of a batch
pub struct ProgressPanel {
    progress: Option<Progress>,
}

impl ProgressPanel {
    pub fn new() -> Self {
        Self { progress: None }
    }

    pub fn set_progress(&mut self, progress: Progress) {
        self.progress = Some(progress);
    }

    pub fn clear(&mut self) {
        self.progress = None;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::LEFT | Borders::RIGHT)
            .border_style(Style::default().fg(Color::Blue));

        let Some(progress) = &self.progress else {
            frame.render_widget(Paragraph::new("").block(block), area);
            return;
        };

        let label = if progress.total > 0 {
            format!(
                "{}: {}/{} scripts",
                progress.label, progress.current, progress.total
            )
        } else {
            progress.label.clone()
        };

        let gauge = Gauge::default()
            .block(block)
            .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
            .ratio(progress.ratio().min(1.0))
            .label(label);

        frame.render_widget(gauge, area);
    }
}

/// Scrolling activity log, colored by level
pub struct LogPanel {
    entries: VecDeque<(LogLevel, String)>,
    max_entries: usize,
}

impl LogPanel {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: 200,
        }
    }

    pub fn add(&mut self, level: LogLevel, message: impl Into<String>) {
        self.entries.push_back((level, message.into()));
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Scripts ")
            .border_style(Style::default().fg(Color::Blue));

        let visible_height = area.height.saturating_sub(2) as usize;
        let start = self.entries.len().saturating_sub(visible_height);

        let items: Vec<ListItem> = self
            .entries
            .iter()
            .skip(start)
            .map(|(level, entry)| {
                let (marker, color) = match level {
                    LogLevel::Info => (" ", Color::Gray),
                    LogLevel::Success => ("✓", Color::Green),
                    LogLevel::Warn => ("!", Color::Yellow),
                    LogLevel::Error => ("✗", Color::Red),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(format!(" {} ", marker), Style::default().fg(color)),
                    Span::raw(entry.as_str()),
                ]))
            })
            .collect();

        frame.render_widget(List::new(items).block(block), area);
    }
}
