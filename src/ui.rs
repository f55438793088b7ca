use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use writeoff_recon::{kpi_cards, FieldValue, ReconciliationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    All,
    Matched,
    Unmatched,
}

impl FilterType {
    pub fn title(&self) -> &str {
        match self {
            FilterType::All => "All",
            FilterType::Matched => "Matched",
            FilterType::Unmatched => "Unmatched",
        }
    }
}

pub struct App {
    pub report: ReconciliationReport,
    /// Row indices into `report.augmented` after filtering.
    pub visible_rows: Vec<usize>,
    pub state: TableState,
    pub filter: FilterType,
    pub show_detail: bool,
    pub export_path: PathBuf,
    pub status_message: Option<String>,
    key_column: Option<usize>,
    amount_column: Option<usize>,
}

impl App {
    pub fn new(report: ReconciliationReport, export_path: PathBuf, key_header: &str, amount_header: &str) -> Self {
        let key_column = report.augmented.column_index(key_header);
        let amount_column = report.augmented.column_index(amount_header);

        let mut app = Self {
            report,
            visible_rows: Vec::new(),
            state: TableState::default(),
            filter: FilterType::All,
            show_detail: false,
            export_path,
            status_message: None,
            key_column,
            amount_column,
        };
        app.apply_filter(FilterType::All);
        app
    }

    fn match_count_column(&self) -> usize {
        self.report.augmented.headers.len() - 2
    }

    fn amount_repaid_column(&self) -> usize {
        self.report.augmented.headers.len() - 1
    }

    fn is_matched(&self, row: usize) -> bool {
        matches!(
            self.report.augmented.cell(row, self.match_count_column()),
            FieldValue::Integer(n) if *n > 0
        )
    }

    pub fn apply_filter(&mut self, filter: FilterType) {
        self.filter = filter;
        self.visible_rows = (0..self.report.augmented.len())
            .filter(|&row| match filter {
                FilterType::All => true,
                FilterType::Matched => self.is_matched(row),
                FilterType::Unmatched => !self.is_matched(row),
            })
            .collect();

        if self.visible_rows.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.state
            .selected()
            .and_then(|i| self.visible_rows.get(i))
            .copied()
    }

    pub fn next(&mut self) {
        let len = self.visible_rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible_rows.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map(|i| (i + 20).min(len - 1)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn last(&mut self) {
        if !self.visible_rows.is_empty() {
            self.state.select(Some(self.visible_rows.len() - 1));
        }
    }

    /// Write the full augmented table (not just the filtered view).
    pub fn export(&mut self) {
        let message = match self.report.augmented.write_csv(&self.export_path) {
            Ok(()) => format!("Saved {}", self.export_path.display()),
            Err(e) => format!("Export failed: {}", e),
        };
        self.status_message = Some(message);
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Char('m') => app.apply_filter(FilterType::Matched),
                KeyCode::Char('u') => app.apply_filter(FilterType::Unmatched),
                KeyCode::Char('c') => app.apply_filter(FilterType::All),
                KeyCode::Char('d') => app.export(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let warning_height = app.report.warnings.len().min(3) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),              // Title + filters
            Constraint::Length(4),              // KPI cards
            Constraint::Length(warning_height), // Column warnings
            Constraint::Min(0),                 // Table
            Constraint::Length(3),              // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_cards(f, chunks[1], app);
    render_warnings(f, chunks[2], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[3]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[3], app);
    }

    render_status_bar(f, chunks[4], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        " Write-offs vs Repayments Analysis ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw("  |  "));

    for (i, filter) in [FilterType::All, FilterType::Matched, FilterType::Unmatched]
        .iter()
        .enumerate()
    {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *filter == app.filter {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(filter.title(), style));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(header, area);
}

fn render_cards(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(area);

    for (card, slot) in kpi_cards(&app.report.totals).iter().zip(columns.iter()) {
        let widget = Paragraph::new(Line::from(Span::styled(
            card.value.clone(),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", card.label)),
        );
        f.render_widget(widget, *slot);
    }
}

fn render_warnings(f: &mut Frame, area: Rect, app: &App) {
    if area.height == 0 {
        return;
    }
    let lines: Vec<Line> = app
        .report
        .warnings
        .iter()
        .map(|w| {
            Line::from(Span::styled(
                format!(" ⚠ {}", w),
                Style::default().fg(Color::Yellow),
            ))
        })
        .collect();
    f.render_widget(Paragraph::new(lines), area);
}

fn cell_text(app: &App, row: usize, column: Option<usize>) -> String {
    column
        .map(|c| app.report.augmented.cell(row, c).to_csv_string())
        .unwrap_or_default()
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["#", "Mobile", "Written Off", "Matches", "Amount Repaid"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .visible_rows
        .iter()
        .map(|&row| {
            let color = if app.is_matched(row) {
                Color::Green
            } else {
                Color::Red
            };

            let cells = vec![
                Cell::from(format!("{}", row + 1)),
                Cell::from(truncate(&cell_text(app, row, app.key_column), 20)),
                Cell::from(cell_text(app, row, app.amount_column)),
                Cell::from(cell_text(app, row, Some(app.match_count_column())))
                    .style(Style::default().fg(color)),
                Cell::from(cell_text(app, row, Some(app.amount_repaid_column())))
                    .style(Style::default().fg(color)),
            ];

            Row::new(cells).height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Length(22),
            Constraint::Length(16),
            Constraint::Length(9),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Write-offs with Repayment Phone Match Counts "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Write-off Details ");

    let row = match app.selected_row() {
        Some(r) => r,
        None => {
            f.render_widget(Paragraph::new("No write-off selected").block(block), area);
            return;
        }
    };

    let lines: Vec<Line> = app
        .report
        .augmented
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            Line::from(vec![
                Span::styled(format!("{}: ", header), Style::default().fg(Color::Cyan)),
                Span::raw(app.report.augmented.cell(row, col).to_csv_string()),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.visible_rows.len();

    let mut status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, total),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled(
            format!("{} matched", app.report.matched_rows),
            Style::default().fg(Color::Green),
        ),
    ];

    if let Some(message) = &app.status_message {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(message.clone(), Style::default().fg(Color::Magenta)));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("m/u/c", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Filter | "));
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Details | "));
    status_spans.push(Span::styled("d", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Download CSV | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
