//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Paragraph, Row, Table, Wrap},
};

use crate::{
    events::Screen,
    form::{self, Answer, SIGNATURE_TOKEN, TableRow},
    input,
    invoice::{InvoiceEditor, totals},
    jobs::JobStatus,
    layout,
    shortcuts::Shortcuts,
    template::{Column, Field, FieldType},
};

use super::App;

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    // ウィザード画面は専用描画で処理する。
    if app.ui.screen == Screen::InitialSetup {
        draw_wizard_screen(f, app);
        // 入力ボックスが開いていれば重ねて描画する。
        if let Some(input_state) = &app.input_box {
            input::render_input_box(f, input_state, &app.theme);
        }
        return;
    }

    // メインレイアウト（Body + HELP + STATUS）を作る。
    let main_layout = layout::create_main_layout(f.area());
    let body_layout = layout::create_body_layout(main_layout.body);

    // 画面ごとに本体領域を描画する。
    match app.ui.screen {
        Screen::Main | Screen::Settings => draw_jobs_table(f, app, body_layout.primary),
        Screen::JobForm => draw_form_body(f, app, body_layout.primary),
        Screen::Invoice => draw_invoice_body(f, app, body_layout.primary),
        Screen::InitialSetup => unreachable!(),
    }

    // 右パネル：画面に応じた補足情報を出す。
    let info_text = match app.ui.screen {
        Screen::Settings => build_settings_info_text(app),
        Screen::JobForm => build_form_info_text(app),
        Screen::Invoice => build_invoice_info_text(app),
        _ => build_main_info_text(app),
    };

    // INFOパネルとして描画する。
    let info_panel = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL).title("INFO"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body_layout.info_panel);

    // HELPバー（画面ごとのショートカット）を描画する。
    let help_text = get_help_text(&app.ui.screen, &app.shortcuts);
    let help_bar = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    // STATUSバー（画面名・ジョブ情報・エラー）を描画する。
    let status_bar = build_status_bar(app);
    f.render_widget(status_bar, main_layout.status_bar);

    // 入力ボックスが開いていれば重ねて描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state, &app.theme);
    }
}

/// ジョブ一覧テーブルを描画する。
fn draw_jobs_table(f: &mut Frame, app: &App, area: Rect) {
    // ジョブ一覧からテーブル行を組み立てる。
    let rows = app.jobs.iter().enumerate().map(|(i, j)| {
        Row::new(vec![
            format!("{}", i + 1),
            j.title.clone(),
            j.location.clone(),
            j.scheduled_date.clone().unwrap_or_else(|| "-".into()),
            status_str(&j.status),
        ])
    });

    // ジョブテーブルのウィジェットを構築する。
    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(16),
            Constraint::Min(12),
            Constraint::Length(12),
            Constraint::Length(14),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title("JOBS"))
    .header(Row::new(vec!["#", "title", "location", "date", "status"]).bold())
    .row_highlight_style(
        Style::default()
            .bg(app.theme.highlight_bg())
            .fg(app.theme.highlight_fg())
            .add_modifier(Modifier::BOLD),
    );

    // 選択中の行をハイライトする。
    let mut table_state = ratatui::widgets::TableState::default();
    if !app.jobs.is_empty() {
        table_state.select(Some(app.ui.selected));
    }
    // テーブルを描画する。
    f.render_stateful_widget(table, area, &mut table_state);
}

/// 点検フォームの本体（現在セクションのフィールド一覧）を描画する。
fn draw_form_body(f: &mut Frame, app: &App, area: Rect) {
    let Some(session) = app.session.as_ref() else {
        return;
    };

    let title = session
        .current_section(&app.ui)
        .map(|s| {
            format!(
                "FORM [{}/{}] {}",
                app.ui.section_idx + 1,
                session.template.sections.len(),
                s.title
            )
        })
        .unwrap_or_else(|| "FORM".into());

    // フィールド一覧の各行を組み立てる。
    let mut lines: Vec<String> = Vec::new();
    if let Some(section) = session.current_section(&app.ui) {
        for (i, field) in section.fields.iter().enumerate() {
            // 現在選択中のフィールドに印を付ける。
            let marker = if i == app.ui.field_idx { "→" } else { " " };
            let required = if field.required { "*" } else { " " };
            let answer = session.form.get(&section.id, &field.id);
            let display =
                field_answer_display(field, answer, session.media.for_field(&field.id).len());
            lines.push(format!("{marker}{required} {}: {display}", field.label));

            // 選択中のテーブルフィールドは行の中身も展開する。
            if i == app.ui.field_idx && field.field_type == FieldType::Table {
                let rows = session.form.table_rows(&section.id, &field.id);
                for (ri, line) in table_lines(&rows, &field.columns).into_iter().enumerate() {
                    let row_marker = if ri == app.ui.row_idx && !rows.is_empty() {
                        ">"
                    } else {
                        " "
                    };
                    lines.push(format!("    {row_marker} {line}"));
                }
            }
        }
    }

    let body = Paragraph::new(lines.join("\n"))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(body, area);
}

/// 請求書エディタの本体を描画する。
fn draw_invoice_body(f: &mut Frame, app: &App, area: Rect) {
    let Some(invoice) = app.session.as_ref().and_then(|s| s.invoice.as_ref()) else {
        return;
    };

    // 明細行をテーブルウィジェットにする。
    let rows = invoice.items.iter().map(|item| {
        // 不完全な行は提出時に落ちる旨を印で示す。
        let valid = if item.is_valid() { " " } else { "!" };
        Row::new(vec![
            valid.to_string(),
            item.name.clone(),
            format!("{:.2}", item.quantity),
            format!("{:.2}", item.rate),
            format!("{:.2}", item.amount),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Min(16),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title("INVOICE"))
    .header(Row::new(vec!["", "item", "qty", "rate", "amount"]).bold())
    .row_highlight_style(
        Style::default()
            .bg(app.theme.highlight_bg())
            .fg(app.theme.highlight_fg())
            .add_modifier(Modifier::BOLD),
    );

    let mut table_state = ratatui::widgets::TableState::default();
    if !invoice.items.is_empty() {
        table_state.select(Some(app.ui.invoice_idx));
    }
    f.render_stateful_widget(table, area, &mut table_state);
}

/// メイン画面用の情報テキストを構築する。
fn build_main_info_text(app: &App) -> String {
    // 選択中のジョブ情報（またはプレースホルダ）を用意する。
    let (sel_title, sel_id, sel_loc) = if let Some(j) = app.jobs.get(app.ui.selected) {
        (j.title.clone(), j.remote_id.clone(), j.location.clone())
    } else {
        ("-".into(), "-".into(), "-".into())
    };

    format!(
        "Selected: {}\nJob ID: {}\nLocation: {}\n\nBackend: {}\nName: {}\n\nLog:\n{}",
        sel_title,
        sel_id,
        sel_loc,
        app.cfg.backend.base_url,
        app.cfg.technician.full_name,
        app.ui
            .log
            .iter()
            .rev()
            .take(8)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// 設定画面用の情報テキストを構築する。
fn build_settings_info_text(app: &App) -> String {
    // トークンは値を出さず入力済みかどうかだけ示す。
    let token_state = if app.token_value.is_empty() {
        "(unchanged)"
    } else {
        "(entered, saved on Enter)"
    };
    format!(
        "Backend URL: {}\nToken path: {}\nToken: {}\nFull name: {}\n\nEnter: save | ESC: cancel",
        app.backend_url, app.token_path, token_state, app.full_name,
    )
}

/// フォーム画面用の情報テキスト（選択フィールドの詳細）を構築する。
fn build_form_info_text(app: &App) -> String {
    let Some(session) = app.session.as_ref() else {
        return "No job open".into();
    };
    let mut lines: Vec<String> = Vec::new();

    if let Some(field) = session.current_field(&app.ui) {
        lines.push(format!("Field: {}", field.label));
        if let Some(help) = &field.help_text {
            lines.push(help.clone());
        }
        // 選択肢フィールドは番号付きで候補を並べる。
        let options = field.effective_options();
        if !options.is_empty() {
            lines.push(String::new());
            lines.push("Options (press 1-9):".into());
            let current = session.form.get(
                &session.current_section(&app.ui).map(|s| s.id.clone()).unwrap_or_default(),
                &field.id,
            );
            for (i, o) in options.iter().enumerate() {
                let mark = match current {
                    Some(Answer::Text(v)) if *v == o.value => "[x]",
                    Some(Answer::Multi(vs)) if vs.contains(&o.value) => "[x]",
                    _ => "[ ]",
                };
                lines.push(format!("  {} {} {}", i + 1, mark, o.label));
            }
        }
        // テーブルフィールドは列カーソルを示す。
        if field.field_type == FieldType::Table
            && let Some(col) = field.columns.get(app.ui.col_idx)
        {
            lines.push(String::new());
            lines.push(format!("Column: {} (c to cycle)", col.label));
        }
    }

    // 添付・メモ・必須の残数といったセッション全体の情報を続ける。
    lines.push(String::new());
    match &session.report {
        Some(r) => lines.push(format!("Report: {} ({} bytes)", r.name, r.size)),
        None => lines.push("Report: none".into()),
    }
    lines.push(format!(
        "Invoice: {}",
        if session.invoice.is_some() { "enabled" } else { "off" }
    ));
    if !session.form.notes.is_empty() {
        lines.push(format!("Notes: {}", session.form.notes));
    }
    let unanswered = session.unanswered_required();
    if unanswered > 0 {
        lines.push(format!("Required unanswered: {unanswered}"));
    }
    if !session.editable {
        lines.push("(read-only)".into());
    }

    lines.join("\n")
}

/// 請求書画面用の情報テキスト（合計と付随情報）を構築する。
fn build_invoice_info_text(app: &App) -> String {
    let Some(invoice) = app.session.as_ref().and_then(|s| s.invoice.as_ref()) else {
        return "Invoice disabled".into();
    };
    invoice_summary(invoice)
}

/// 請求書の合計サマリを文字列にする。
fn invoice_summary(invoice: &InvoiceEditor) -> String {
    // 合計は現在の全行に対して毎回再計算する。
    let t = totals(&invoice.items, invoice.tax_percentage);
    let valid = invoice.valid_items().len();
    format!(
        "Description: {}\n\nSubtotal: {:.2}\nTax ({:.1}%): {:.2}\nTotal: {:.2}\n\nRows: {} ({} valid)\nNotes: {}",
        invoice.description,
        t.subtotal,
        invoice.tax_percentage,
        t.tax_amount,
        t.total,
        invoice.items.len(),
        valid,
        invoice.notes,
    )
}

/// フィールドの回答を一覧表示用の1行テキストへ変換する。
/// 未知のフィールド型も落ちずにプレースホルダを返す。
fn field_answer_display(field: &Field, answer: Option<&Answer>, media_count: usize) -> String {
    match &field.field_type {
        FieldType::Text | FieldType::Textarea => match answer {
            Some(Answer::Text(s)) => s.clone(),
            _ => "-".into(),
        },
        FieldType::Number => match answer {
            Some(Answer::Number(n)) => format!("{n}"),
            _ => "-".into(),
        },
        FieldType::Date => match answer {
            // 保存値が日付として読めない場合は空欄で描画する。
            Some(Answer::Text(s)) => {
                let shown = form::display_date(s);
                if shown.is_empty() { "-".into() } else { shown }
            }
            _ => "-".into(),
        },
        FieldType::Boolean => match answer {
            Some(Answer::Bool(true)) => "[x]".into(),
            Some(Answer::Bool(false)) => "[ ]".into(),
            _ => "[ ] (unanswered)".into(),
        },
        FieldType::Select | FieldType::YesNo | FieldType::YesNoNa | FieldType::PassFail => {
            match answer {
                // 保存値に対応するラベルを探して表示する。
                Some(Answer::Text(v)) => field
                    .effective_options()
                    .iter()
                    .find(|o| o.value == *v)
                    .map(|o| o.label.clone())
                    .unwrap_or_else(|| v.clone()),
                _ => "-".into(),
            }
        }
        FieldType::MultiSelect => match answer {
            Some(Answer::Multi(vs)) if !vs.is_empty() => vs.join(", "),
            _ => "-".into(),
        },
        FieldType::Signature => match answer {
            Some(Answer::Text(s)) if s == SIGNATURE_TOKEN => "[signed]".into(),
            _ => "[not signed]".into(),
        },
        FieldType::Table => match answer {
            Some(Answer::Table(rows)) if !rows.is_empty() => {
                format!("{} record(s)", rows.len())
            }
            _ => "no records yet".into(),
        },
        FieldType::Photo | FieldType::PhotoMulti => {
            if media_count == 0 {
                "no photos".into()
            } else {
                format!("{media_count} photo(s)")
            }
        }
        FieldType::Unknown(tag) => format!("(field type \"{tag}\" not supported)"),
    }
}

/// テーブルフィールドの行を表示用テキストへ展開する。
fn table_lines(rows: &[TableRow], columns: &[Column]) -> Vec<String> {
    if rows.is_empty() {
        return vec!["no records yet".into()];
    }
    rows.iter()
        .map(|row| {
            // 列定義の順でセルを並べる（未入力セルは空欄）。
            columns
                .iter()
                .map(|c| {
                    let cell = row.get(&c.id).map(String::as_str).unwrap_or("");
                    format!("{}={}", c.label, cell)
                })
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect()
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    let screen_name = match app.ui.screen {
        Screen::Main => "Main",
        Screen::JobForm => "Form",
        Screen::Invoice => "Invoice",
        Screen::Settings => "Settings",
        Screen::InitialSetup => "Setup",
    };

    // ジョブ件数と完了数を集計する。
    let job_info = format!(
        "Jobs: {} total, {} done",
        app.jobs.len(),
        app.jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Completed))
            .count()
    );

    // エラーの有無でステータス文字列を切り替える。
    let status_text = if let Some(err) = &app.ui.error {
        format!("[{}] {} | ERROR: {}", screen_name, job_info, err)
    } else {
        format!("[{}] {} | {}", screen_name, job_info, app.ui.status)
    };

    // ステータスバーのウィジェットを生成する。
    let mut status_bar = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });

    // エラー時は強調色で表示する。
    if app.ui.error.is_some() {
        status_bar = status_bar.style(Style::default().fg(app.theme.error_fg()));
    }

    status_bar
}

/// ウィザード画面を描画する。
fn draw_wizard_screen(f: &mut Frame, app: &App) {
    // 余白込みで縦方向に3分割する。
    let outer_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(20), // 上部マージン
            Constraint::Min(10),        // 本文領域
            Constraint::Percentage(20), // 下部マージン
        ])
        .split(f.area());

    // ステップ番号と総数、プロンプトを取得する。
    let step_num = app.wizard_state.get_step_number();
    let total_steps = app.wizard_state.total_steps;
    let prompt = app.wizard_state.get_prompt();

    // 表示するテキストを組み立てる。
    let content_text = format!(
        "=== Initial Setup Wizard ===\n\nStep {}/{}\n\n{}\n\nPress Enter to proceed, ESC to skip step.",
        step_num, total_steps, prompt
    );

    // メインの本文を描画する。
    let content = Paragraph::new(content_text)
        .block(Block::default().borders(Borders::ALL).title("Setup"))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(content, outer_layout[1]);

    // エラーがあれば下部に表示する。
    if let Some(err) = &app.ui.error {
        // エラー表示用のレイアウトを作成する。
        let error_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(f.area());

        // エラー用のパネルを構成する。
        let error_text = Paragraph::new(format!("ERROR: {}", err))
            .block(Block::default().borders(Borders::ALL).title("Error"))
            .style(Style::default().fg(app.theme.error_fg()))
            .wrap(Wrap { trim: true });

        // エラー表示を描画する。
        f.render_widget(error_text, error_layout[1]);
    }
}

/// 現在画面に応じたヘルプ文字列を返す。
fn get_help_text(screen: &Screen, shortcuts: &Shortcuts) -> String {
    match screen {
        Screen::Main => format!(
            "{}: quit | {}: refresh | {}: claim | {}: open | {}: settings | {}/{}: navigate",
            format_keys(&shortcuts.main.quit),
            format_keys(&shortcuts.main.refresh),
            format_keys(&shortcuts.main.claim),
            format_keys(&shortcuts.main.open),
            format_keys(&shortcuts.main.settings),
            format_keys(&shortcuts.main.up),
            format_keys(&shortcuts.main.down)
        ),
        Screen::JobForm => format!(
            "{}: edit | Space: toggle | 1-9: options | {}: +row | {}: -row | {}: photo | {}: report | {}: notes | {}: invoice | {}: submit | {}: close",
            format_keys(&shortcuts.form.edit),
            format_keys(&shortcuts.form.add_row),
            format_keys(&shortcuts.form.remove_row),
            format_keys(&shortcuts.form.add_photo),
            format_keys(&shortcuts.form.report),
            format_keys(&shortcuts.form.notes),
            format_keys(&shortcuts.form.invoice),
            format_keys(&shortcuts.form.submit),
            format_keys(&shortcuts.form.cancel)
        ),
        Screen::Invoice => format!(
            "{}: +item | {}: -item | {}: name | {}: qty | {}: rate | {}: tax | {}: description | {}: notes | {}: disable | {}: back",
            format_keys(&shortcuts.invoice.add_item),
            format_keys(&shortcuts.invoice.remove_item),
            format_keys(&shortcuts.invoice.name),
            format_keys(&shortcuts.invoice.quantity),
            format_keys(&shortcuts.invoice.rate),
            format_keys(&shortcuts.invoice.tax),
            format_keys(&shortcuts.invoice.description),
            format_keys(&shortcuts.invoice.notes),
            format_keys(&shortcuts.invoice.disable),
            format_keys(&shortcuts.invoice.back)
        ),
        Screen::Settings => format!(
            "{}: url | {}: token path | {}: token | {}: name | {}: save | {}: cancel",
            format_keys(&shortcuts.settings.backend_url),
            format_keys(&shortcuts.settings.token_path),
            format_keys(&shortcuts.settings.token),
            format_keys(&shortcuts.settings.name),
            format_keys(&shortcuts.settings.save),
            format_keys(&shortcuts.settings.cancel)
        ),
        Screen::InitialSetup => format!(
            "Follow wizard steps | {}: proceed | {}: skip step",
            format_keys(&shortcuts.wizard.proceed),
            format_keys(&shortcuts.wizard.skip)
        ),
    }
}

/// ショートカットキーの配列を表示用文字列に変換する。
fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}

/// ジョブ状態を一覧表示用の短いラベルへ変換する。
fn status_str(s: &JobStatus) -> String {
    match s {
        JobStatus::Available => "Available".into(),
        JobStatus::Claiming => "Claiming".into(),
        JobStatus::Assigned => "Assigned".into(),
        JobStatus::Validating => "Validating".into(),
        JobStatus::Submitting => "Submitting".into(),
        JobStatus::Completed => "Completed".into(),
        JobStatus::Failed(e) => format!("Failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::FieldOption;

    fn field(id: &str, field_type: FieldType) -> Field {
        Field {
            id: id.into(),
            field_type,
            label: id.into(),
            placeholder: None,
            help_text: None,
            required: false,
            options: vec![],
            columns: vec![],
        }
    }

    #[test]
    fn test_unknown_field_type_renders_placeholder() {
        // 未知の型はクラッシュせずプレースホルダ表示になる。
        let f = field("x", FieldType::Unknown("hologram".into()));
        let line = field_answer_display(&f, None, 0);
        assert_eq!(line, "(field type \"hologram\" not supported)");
    }

    #[test]
    fn test_select_shows_label_for_stored_value() {
        // 保存されるのはvalueでも、表示はlabelを使う。
        let mut f = field("cond", FieldType::Select);
        f.options = vec![FieldOption {
            value: "good".into(),
            label: "Good condition".into(),
        }];
        let a = Answer::Text("good".into());
        assert_eq!(field_answer_display(&f, Some(&a), 0), "Good condition");
    }

    #[test]
    fn test_signature_displays_only_token_state() {
        // 署名はトークンの有無だけを表示する。
        let f = field("sig", FieldType::Signature);
        let signed = Answer::Text(SIGNATURE_TOKEN.into());
        assert_eq!(field_answer_display(&f, Some(&signed), 0), "[signed]");
        assert_eq!(field_answer_display(&f, None, 0), "[not signed]");
    }

    #[test]
    fn test_unparsable_date_renders_blank_dash() {
        // 日付として読めない保存値は空欄扱いで描画する。
        let f = field("d", FieldType::Date);
        let a = Answer::Text("not-a-date".into());
        assert_eq!(field_answer_display(&f, Some(&a), 0), "-");
    }

    #[test]
    fn test_empty_table_shows_no_records_message() {
        let lines = table_lines(&[], &[]);
        assert_eq!(lines, vec!["no records yet".to_string()]);
    }

    #[test]
    fn test_table_lines_follow_column_order() {
        // セルは列定義の順で並び、未入力セルは空欄になる。
        let columns = vec![
            Column {
                id: "part".into(),
                label: "Part".into(),
                column_type: crate::template::ColumnType::Text,
                required: false,
                options: vec![],
                placeholder: None,
            },
            Column {
                id: "qty".into(),
                label: "Qty".into(),
                column_type: crate::template::ColumnType::Number,
                required: false,
                options: vec![],
                placeholder: None,
            },
        ];
        let mut row = TableRow::new();
        row.insert("qty".into(), "3".into());
        let lines = table_lines(&[row], &columns);
        assert_eq!(lines, vec!["Part= | Qty=3".to_string()]);
    }
}
