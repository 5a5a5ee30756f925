//! キー入力ハンドラー関数。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::{
    api::completion::{self, CompletionRequest},
    auth::TokenStore,
    events::Screen,
    form::{Answer, SIGNATURE_TOKEN},
    input::{InputBoxState, InputCallbackId},
    invoice::InvoiceEditor,
    media::CaptureSource,
    shortcuts,
    template::{ColumnType, Field, FieldType},
    wizard::WizardStep,
    worker::WorkerCmd,
};

use super::{App, request_refresh};

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }

    // 画面ごとのハンドラへ委譲する。
    match app.ui.screen {
        Screen::Main => handle_main_key(app, k).await,
        Screen::JobForm => handle_form_key(app, k).await,
        Screen::Invoice => handle_invoice_key(app, k).await,
        Screen::Settings => handle_settings_key(app, k).await,
        Screen::InitialSetup => handle_wizard_key(app, k).await,
    }
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// メイン画面のキー処理。
async fn handle_main_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // メイン画面のショートカットを参照する。
    let sc = app.shortcuts.main.clone();

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.settings) {
        // 設定画面へ遷移し、編集バッファを更新する。
        reload_settings_buffers(app);
        app.ui.screen = Screen::Settings;
        app.ui.status = "Settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.refresh) {
        // ジョブ一覧の再取得を依頼する。
        request_refresh(app).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.down) {
        // 次の行へ移動する。
        if app.ui.selected + 1 < app.jobs.len() {
            app.ui.selected += 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.up) {
        // 前の行へ移動する。
        if app.ui.selected > 0 {
            app.ui.selected -= 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.claim) {
        // 未割り当てのジョブだけクレームできる。
        if let Some(job) = app.jobs.get(app.ui.selected)
            && job.status == crate::jobs::JobStatus::Available
        {
            app.worker_tx
                .send(WorkerCmd::ClaimJob {
                    job_id: job.id,
                    remote_id: job.remote_id.clone(),
                })
                .await?;
            app.ui.status = format!("Claiming: {}", job.title);
        }
    } else if shortcuts::matches_shortcut(&k, &sc.open)
        && let Some(job) = app.jobs.get(app.ui.selected)
    {
        // テンプレートを取得してフォーム画面を開く。
        app.worker_tx
            .send(WorkerCmd::OpenJob {
                job_id: job.id,
                remote_id: job.remote_id.clone(),
            })
            .await?;
        app.ui.status = format!("Loading form: {}", job.title);
    }

    Ok(false)
}

/// 点検フォーム画面のキー処理。
async fn handle_form_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = app.shortcuts.form.clone();

    if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // セッションを破棄してメイン画面へ戻る（下書きは保存しない）。
        app.session = None;
        app.ui.screen = Screen::Main;
        app.ui.status = "Closed without submitting (entries discarded)".into();
        return Ok(false);
    }

    // セッションが無ければフォーム画面に留まれない。
    if app.session.is_none() {
        app.ui.screen = Screen::Main;
        return Ok(false);
    }

    if shortcuts::matches_shortcut(&k, &sc.next_field) {
        // セクション内の次のフィールドへ移動する。
        let count = current_section_len(app);
        if app.ui.field_idx + 1 < count {
            app.ui.field_idx += 1;
            app.ui.row_idx = 0;
            app.ui.col_idx = 0;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.prev_field) {
        if app.ui.field_idx > 0 {
            app.ui.field_idx -= 1;
            app.ui.row_idx = 0;
            app.ui.col_idx = 0;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.next_section) {
        // 次のセクションへ移動してカーソルを戻す。
        let sections = app.session.as_ref().map(|s| s.template.sections.len());
        if let Some(n) = sections
            && app.ui.section_idx + 1 < n
        {
            app.ui.section_idx += 1;
            app.ui.field_idx = 0;
            app.ui.row_idx = 0;
            app.ui.col_idx = 0;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.prev_section) {
        if app.ui.section_idx > 0 {
            app.ui.section_idx -= 1;
            app.ui.field_idx = 0;
            app.ui.row_idx = 0;
            app.ui.col_idx = 0;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.edit) {
        edit_current_field(app);
    } else if shortcuts::matches_shortcut(&k, &sc.toggle) {
        toggle_current_field(app);
    } else if shortcuts::matches_shortcut(&k, &sc.add_row) {
        table_add_row(app);
    } else if shortcuts::matches_shortcut(&k, &sc.remove_row) {
        table_remove_row(app);
    } else if shortcuts::matches_shortcut(&k, &sc.row_down) {
        table_move_row(app, 1);
    } else if shortcuts::matches_shortcut(&k, &sc.row_up) {
        table_move_row(app, -1);
    } else if shortcuts::matches_shortcut(&k, &sc.next_col) {
        table_next_col(app);
    } else if shortcuts::matches_shortcut(&k, &sc.add_photo) {
        photo_add_from_library(app);
    } else if shortcuts::matches_shortcut(&k, &sc.add_photo_camera) {
        photo_add_from_camera(app).await;
    } else if shortcuts::matches_shortcut(&k, &sc.remove_photo) {
        photo_remove_last(app);
    } else if shortcuts::matches_shortcut(&k, &sc.report) {
        // 添付するPDFレポートのパス入力を促す。
        if editable(app) {
            app.input_box = Some(InputBoxState::open(
                "Report PDF path (max 10MB):",
                String::new(),
                InputCallbackId::ReportPath,
            ));
        }
    } else if shortcuts::matches_shortcut(&k, &sc.notes) {
        // 完了メモの入力ボックスを開く。
        if editable(app)
            && let Some(session) = app.session.as_ref()
        {
            app.input_box = Some(InputBoxState::open(
                "Completion notes:",
                session.form.notes.clone(),
                InputCallbackId::CompletionNotes,
            ));
        }
    } else if shortcuts::matches_shortcut(&k, &sc.invoice) {
        // 請求書パネルを開く（未作成なら有効化する）。
        if editable(app)
            && let Some(session) = app.session.as_mut()
        {
            if session.invoice.is_none() {
                session.invoice = Some(InvoiceEditor::new());
            }
            app.ui.invoice_idx = 0;
            app.ui.screen = Screen::Invoice;
            app.ui.status = "Invoice".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.submit) {
        submit_completion(app).await?;
    } else if let KeyCode::Char(c) = k.code
        && c.is_ascii_digit()
        && c != '0'
    {
        // 数字キーで選択肢を直接選ぶ（単一選択は上書き、複数選択はトグル）。
        choose_option_by_digit(app, c as usize - '1' as usize);
    }

    Ok(false)
}

/// 現在セクションのフィールド数。
fn current_section_len(app: &App) -> usize {
    app.session
        .as_ref()
        .and_then(|s| s.current_section(&app.ui))
        .map(|s| s.fields.len())
        .unwrap_or(0)
}

/// フォームが編集可能か（完了済みジョブは読み取り専用）。
fn editable(app: &App) -> bool {
    app.session.as_ref().is_some_and(|s| s.editable)
}

/// 現在フィールドのクローンを取得する。
fn current_field_cloned(app: &App) -> Option<(String, Field)> {
    let session = app.session.as_ref()?;
    let section = session.current_section(&app.ui)?;
    let field = session.current_field(&app.ui)?;
    Some((section.id.clone(), field.clone()))
}

/// 編集キー：フィールド型に応じた編集操作を開始する。
fn edit_current_field(app: &mut App) {
    if !editable(app) {
        app.ui.status = "Read-only".into();
        return;
    }
    let Some((section_id, field)) = current_field_cloned(app) else {
        return;
    };
    let (section, field_idx) = (app.ui.section_idx, app.ui.field_idx);
    let current = app
        .session
        .as_ref()
        .and_then(|s| s.form.get(&section_id, &field.id))
        .cloned();

    match &field.field_type {
        FieldType::Text | FieldType::Textarea => {
            // 現在値を初期値にしてテキスト入力を開く。
            let value = match current {
                Some(Answer::Text(s)) => s,
                _ => String::new(),
            };
            app.input_box = Some(InputBoxState::open(
                format!("{}:", field.label),
                value,
                InputCallbackId::FieldText {
                    section,
                    field: field_idx,
                },
            ));
        }
        FieldType::Number => {
            let value = match current {
                Some(Answer::Number(n)) => format_number(n),
                _ => String::new(),
            };
            app.input_box = Some(InputBoxState::open(
                format!("{} (number):", field.label),
                value,
                InputCallbackId::FieldNumber {
                    section,
                    field: field_idx,
                },
            ));
        }
        FieldType::Date => {
            let value = match current {
                Some(Answer::Text(s)) => s,
                _ => String::new(),
            };
            app.input_box = Some(InputBoxState::open(
                format!("{} (YYYY-MM-DD):", field.label),
                value,
                InputCallbackId::FieldDate {
                    section,
                    field: field_idx,
                },
            ));
        }
        FieldType::Boolean | FieldType::Signature => toggle_current_field(app),
        FieldType::Select | FieldType::YesNo | FieldType::YesNoNa | FieldType::PassFail => {
            toggle_current_field(app)
        }
        FieldType::MultiSelect => {
            app.ui.status = "Press 1-9 to toggle options".into();
        }
        FieldType::Table => table_edit_cell(app),
        FieldType::Photo | FieldType::PhotoMulti => {
            app.ui.status = "p: add photo | o: camera | x: remove".into();
        }
        FieldType::Unknown(tag) => {
            // 未知のフィールド型は編集せず通知だけ出す。
            app.ui.status = format!("Field type \"{tag}\" is not supported");
        }
    }
}

/// トグルキー：真偽値の切り替え、署名、単一選択の巡回。
fn toggle_current_field(app: &mut App) {
    if !editable(app) {
        return;
    }
    let Some((section_id, field)) = current_field_cloned(app) else {
        return;
    };
    let Some(session) = app.session.as_mut() else {
        return;
    };
    match &field.field_type {
        FieldType::Boolean => session.form.toggle_bool(&section_id, &field.id),
        FieldType::Signature => {
            // 署名はプレースホルダートークンの記録のみ（取り消しは無し）。
            session
                .form
                .set_value(&section_id, &field.id, Answer::Text(SIGNATURE_TOKEN.into()));
            app.ui.status = "Signature captured".into();
        }
        FieldType::Select | FieldType::YesNo | FieldType::YesNoNa | FieldType::PassFail => {
            // 現在値の次の選択肢へ巡回する（上書きのみ、未選択へは戻らない）。
            let options = field.effective_options();
            if options.is_empty() {
                return;
            }
            let current = match session.form.get(&section_id, &field.id) {
                Some(Answer::Text(v)) => Some(v.clone()),
                _ => None,
            };
            let next_idx = match current.and_then(|v| options.iter().position(|o| o.value == v)) {
                Some(i) => (i + 1) % options.len(),
                None => 0,
            };
            session
                .form
                .select_option(&section_id, &field.id, &options[next_idx].value);
        }
        FieldType::MultiSelect => {
            app.ui.status = "Press 1-9 to toggle options".into();
        }
        _ => {}
    }
}

/// 数字キーで選択肢を選ぶ。
fn choose_option_by_digit(app: &mut App, idx: usize) {
    if !editable(app) {
        return;
    }
    let Some((section_id, field)) = current_field_cloned(app) else {
        return;
    };
    let options = field.effective_options();
    let Some(option) = options.get(idx) else {
        return;
    };
    let Some(session) = app.session.as_mut() else {
        return;
    };
    match &field.field_type {
        FieldType::Select | FieldType::YesNo | FieldType::YesNoNa | FieldType::PassFail => {
            session
                .form
                .select_option(&section_id, &field.id, &option.value);
        }
        FieldType::MultiSelect => {
            session
                .form
                .toggle_multi(&section_id, &field.id, &option.value);
        }
        _ => {}
    }
}

/// テーブルフィールドに行を追加する。
fn table_add_row(app: &mut App) {
    if !editable(app) {
        return;
    }
    let Some((section_id, field)) = current_field_cloned(app) else {
        return;
    };
    if field.field_type != FieldType::Table {
        return;
    }
    let column_ids: Vec<String> = field.columns.iter().map(|c| c.id.clone()).collect();
    if let Some(session) = app.session.as_mut() {
        session.form.add_table_row(&section_id, &field.id, &column_ids);
        // 追加した行へカーソルを移す。
        let rows = session.form.table_rows(&section_id, &field.id).len();
        app.ui.row_idx = rows.saturating_sub(1);
        app.ui.col_idx = 0;
    }
}

/// テーブルフィールドからカーソル行を削除する。
fn table_remove_row(app: &mut App) {
    if !editable(app) {
        return;
    }
    let Some((section_id, field)) = current_field_cloned(app) else {
        return;
    };
    if field.field_type != FieldType::Table {
        return;
    }
    let row = app.ui.row_idx;
    if let Some(session) = app.session.as_mut() {
        session.form.remove_table_row(&section_id, &field.id, row);
        // カーソルを残存行の範囲に収める。
        let rows = session.form.table_rows(&section_id, &field.id).len();
        app.ui.row_idx = app.ui.row_idx.min(rows.saturating_sub(1));
    }
}

/// テーブルの行カーソルを移動する。
fn table_move_row(app: &mut App, delta: isize) {
    let Some((section_id, field)) = current_field_cloned(app) else {
        return;
    };
    if field.field_type != FieldType::Table {
        return;
    }
    let rows = app
        .session
        .as_ref()
        .map(|s| s.form.table_rows(&section_id, &field.id).len())
        .unwrap_or(0);
    if rows == 0 {
        return;
    }
    let next = app.ui.row_idx as isize + delta;
    if next >= 0 && (next as usize) < rows {
        app.ui.row_idx = next as usize;
    }
}

/// テーブルの列カーソルを巡回する。
fn table_next_col(app: &mut App) {
    let Some((_, field)) = current_field_cloned(app) else {
        return;
    };
    if field.field_type != FieldType::Table || field.columns.is_empty() {
        return;
    }
    app.ui.col_idx = (app.ui.col_idx + 1) % field.columns.len();
}

/// カーソル位置のセルの入力ボックスを開く。
fn table_edit_cell(app: &mut App) {
    let Some((section_id, field)) = current_field_cloned(app) else {
        return;
    };
    let Some(column) = field.columns.get(app.ui.col_idx) else {
        return;
    };
    let rows = app
        .session
        .as_ref()
        .map(|s| s.form.table_rows(&section_id, &field.id))
        .unwrap_or_default();
    if rows.is_empty() {
        app.ui.status = "No records yet (press a to add a row)".into();
        return;
    }
    let Some(row) = rows.get(app.ui.row_idx) else {
        return;
    };
    let current = row.get(&column.id).cloned().unwrap_or_default();
    // 選択肢列は候補をプロンプトに添える。
    let prompt = if column.column_type == ColumnType::Select {
        let values: Vec<&str> = column.options.iter().map(|o| o.value.as_str()).collect();
        format!("{} ({}):", column.label, values.join("/"))
    } else {
        format!("{}:", column.label)
    };
    app.input_box = Some(InputBoxState::open(
        prompt,
        current,
        InputCallbackId::TableCell {
            section: app.ui.section_idx,
            field: app.ui.field_idx,
            row: app.ui.row_idx,
            col: app.ui.col_idx,
        },
    ));
}

/// ライブラリ（ローカルファイル）からの写真追加を開始する。
fn photo_add_from_library(app: &mut App) {
    if !editable(app) {
        return;
    }
    let Some((_, field)) = current_field_cloned(app) else {
        return;
    };
    if !matches!(field.field_type, FieldType::Photo | FieldType::PhotoMulti) {
        return;
    }
    app.input_box = Some(InputBoxState::open(
        "Photo path:",
        String::new(),
        InputCallbackId::PhotoPath { field_id: field.id },
    ));
}

/// カメラからの写真追加を試みる（権限確認込み）。
async fn photo_add_from_camera(app: &mut App) {
    if !editable(app) {
        return;
    }
    let Some((_, field)) = current_field_cloned(app) else {
        return;
    };
    if !matches!(field.field_type, FieldType::Photo | FieldType::PhotoMulti) {
        return;
    }
    // 権限が拒否された場合は状態を変えずに案内のみ表示する。
    let App {
        session, device, ui, ..
    } = app;
    if let Some(session) = session.as_mut() {
        match session
            .media
            .add_media(device, &field.id, CaptureSource::Camera)
            .await
        {
            Ok(true) => ui.status = "Photo attached".into(),
            Ok(false) => ui.status = "Capture cancelled".into(),
            Err(e) => ui.error = Some(e.to_string()),
        }
    }
}

/// 現在フィールドの末尾の添付写真を取り除く。
fn photo_remove_last(app: &mut App) {
    if !editable(app) {
        return;
    }
    let Some((_, field)) = current_field_cloned(app) else {
        return;
    };
    if let Some(session) = app.session.as_mut() {
        let count = session.media.for_field(&field.id).len();
        if count > 0 {
            session.media.remove_media(&field.id, count - 1);
            app.ui.status = "Photo removed".into();
        }
    }
}

/// 完了提出を組み立ててWorkerへ送る。
async fn submit_completion(app: &mut App) -> Result<()> {
    let Some(session) = app.session.as_ref() else {
        return Ok(());
    };
    if !session.editable {
        app.ui.status = "Read-only".into();
        return Ok(());
    }
    // 進行中は提出キーを無効化して二重送信を防ぐ。
    let in_flight = app
        .jobs
        .iter()
        .find(|j| j.id == session.job_id)
        .is_some_and(|j| j.status.in_flight());
    if in_flight {
        app.ui.status = "Submission already in progress".into();
        return Ok(());
    }

    // ペイロードは毎回新規に組み立てる（ローカルには保存しない）。
    let form_values_json = if session.form.is_empty() {
        None
    } else {
        Some(session.form.to_json()?)
    };
    let request = CompletionRequest {
        job_id: session.remote_id.clone(),
        form_values_json,
        invoice: session.invoice.as_ref().map(|e| e.build_invoice_data()),
        report: session.report.clone(),
        notes: if session.form.notes.trim().is_empty() {
            None
        } else {
            Some(session.form.notes.clone())
        },
    };
    let unanswered = session.unanswered_required();
    app.worker_tx
        .send(WorkerCmd::SubmitCompletion {
            job_id: session.job_id,
            request,
        })
        .await?;
    // 必須未回答はブロックせず件数だけ知らせる。
    app.ui.status = if unanswered > 0 {
        format!("Submitting... ({unanswered} required fields unanswered)")
    } else {
        "Submitting completion...".into()
    };
    Ok(())
}

/// 請求書画面のキー処理。
async fn handle_invoice_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = app.shortcuts.invoice.clone();

    if shortcuts::matches_shortcut(&k, &sc.back) {
        // フォーム画面へ戻る（請求書は有効のまま）。
        app.ui.screen = Screen::JobForm;
        return Ok(false);
    }

    let Some(session) = app.session.as_mut() else {
        app.ui.screen = Screen::Main;
        return Ok(false);
    };
    let Some(invoice) = session.invoice.as_mut() else {
        app.ui.screen = Screen::JobForm;
        return Ok(false);
    };

    if shortcuts::matches_shortcut(&k, &sc.disable) {
        // 請求書を無効化してフォームへ戻る。
        session.invoice = None;
        app.ui.screen = Screen::JobForm;
        app.ui.status = "Invoice disabled".into();
        return Ok(false);
    }

    // 選択行のLineItem idを控えておく。
    let selected_id = invoice.items.get(app.ui.invoice_idx).map(|i| i.id);

    if shortcuts::matches_shortcut(&k, &sc.down) {
        if app.ui.invoice_idx + 1 < invoice.items.len() {
            app.ui.invoice_idx += 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.up) {
        if app.ui.invoice_idx > 0 {
            app.ui.invoice_idx -= 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.add_item) {
        invoice.add_line_item();
        app.ui.invoice_idx = invoice.items.len() - 1;
    } else if shortcuts::matches_shortcut(&k, &sc.remove_item) {
        // 最低1行は残る。
        if let Some(id) = selected_id {
            invoice.remove_line_item(id);
            app.ui.invoice_idx = app.ui.invoice_idx.min(invoice.items.len() - 1);
        }
    } else if shortcuts::matches_shortcut(&k, &sc.name) {
        if let Some(id) = selected_id {
            let value = invoice
                .items
                .iter()
                .find(|i| i.id == id)
                .map(|i| i.name.clone())
                .unwrap_or_default();
            app.input_box = Some(InputBoxState::open(
                "Item name:",
                value,
                InputCallbackId::InvoiceItemName(id),
            ));
        }
    } else if shortcuts::matches_shortcut(&k, &sc.quantity) {
        if let Some(id) = selected_id {
            let value = invoice
                .items
                .iter()
                .find(|i| i.id == id)
                .map(|i| format_number(i.quantity))
                .unwrap_or_default();
            app.input_box = Some(InputBoxState::open(
                "Quantity:",
                value,
                InputCallbackId::InvoiceItemQuantity(id),
            ));
        }
    } else if shortcuts::matches_shortcut(&k, &sc.rate) {
        if let Some(id) = selected_id {
            let value = invoice
                .items
                .iter()
                .find(|i| i.id == id)
                .map(|i| format_number(i.rate))
                .unwrap_or_default();
            app.input_box = Some(InputBoxState::open(
                "Rate:",
                value,
                InputCallbackId::InvoiceItemRate(id),
            ));
        }
    } else if shortcuts::matches_shortcut(&k, &sc.tax) {
        app.input_box = Some(InputBoxState::open(
            "Tax percentage:",
            format_number(invoice.tax_percentage),
            InputCallbackId::InvoiceTaxPercent,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.description) {
        app.input_box = Some(InputBoxState::open(
            "Invoice description:",
            invoice.description.clone(),
            InputCallbackId::InvoiceDescription,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.notes) {
        app.input_box = Some(InputBoxState::open(
            "Invoice notes:",
            invoice.notes.clone(),
            InputCallbackId::InvoiceNotes,
        ));
    }

    Ok(false)
}

/// 設定画面のキー処理。
async fn handle_settings_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 設定画面のショートカットを参照する。
    let sc = app.shortcuts.settings.clone();

    if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 変更を破棄してメイン画面へ戻る。
        reload_settings_buffers(app);
        app.ui.screen = Screen::Main;
    } else if shortcuts::matches_shortcut(&k, &sc.save) {
        // 編集バッファを設定へ反映する。
        app.cfg.backend.base_url = app.backend_url.clone();
        app.cfg.backend.token_path = app.token_path.clone();
        app.cfg.technician.full_name = app.full_name.clone();
        // 設定ファイルを保存する。
        app.cfg.save(&app.cfg_path)?;

        // 新しいトークンが入力されていればファイルへ書き込む。
        if !app.token_value.is_empty() {
            TokenStore::new(&app.cfg.backend.token_path)
                .save(&app.token_value)
                .await?;
            app.token_value.clear();
            // トークン更新で認証切れ状態を解除する。
            app.ui.auth_expired = false;
            app.ui.error = None;
        }

        // Workerにも設定更新を通知する。
        app.worker_tx
            .send(WorkerCmd::SaveSettings(app.cfg.clone()))
            .await?;
        // 画面状態を更新してメインへ戻る。
        app.ui.screen = Screen::Main;
        app.ui.status = "Saved settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.backend_url) {
        // バックエンドURLの入力ボックスを開く。
        app.input_box = Some(InputBoxState::open(
            "Backend base URL:",
            app.backend_url.clone(),
            InputCallbackId::SettingsBackendUrl,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.token_path) {
        app.input_box = Some(InputBoxState::open(
            "Token file path:",
            app.token_path.clone(),
            InputCallbackId::SettingsTokenPath,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.token) {
        // トークンそのものの入力（保存時に書き込む）。
        app.input_box = Some(InputBoxState::open(
            "Bearer token:",
            String::new(),
            InputCallbackId::SettingsToken,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.name) {
        app.input_box = Some(InputBoxState::open(
            "Full name:",
            app.full_name.clone(),
            InputCallbackId::SettingsFullName,
        ));
    }

    Ok(false)
}

/// 初期設定ウィザード画面のキー処理。
async fn handle_wizard_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // ウィザード画面のショートカットを参照する。
    let sc = app.shortcuts.wizard.clone();

    if shortcuts::matches_shortcut(&k, &sc.proceed) {
        match &app.wizard_state.current_step {
            WizardStep::Welcome => {
                // 次のステップへ進む。
                app.wizard_state.next_step();
            }
            WizardStep::BackendUrl => {
                // バックエンドURL入力を促す。
                app.input_box = Some(InputBoxState::open(
                    "Backend base URL:",
                    app.backend_url.clone(),
                    InputCallbackId::WizardBackendUrl,
                ));
            }
            WizardStep::Token => {
                // トークン入力を促す。
                app.input_box = Some(InputBoxState::open(
                    "Bearer token:",
                    String::new(),
                    InputCallbackId::WizardToken,
                ));
            }
            WizardStep::TechnicianName => {
                // 氏名入力を促す。
                app.input_box = Some(InputBoxState::open(
                    "Your full name:",
                    app.full_name.clone(),
                    InputCallbackId::WizardFullName,
                ));
            }
            WizardStep::Complete => {
                // 必須項目が揃っているか検証する。
                if app.backend_url.is_empty() {
                    app.ui.error = Some("Backend URL is required.".into());
                    app.wizard_state.current_step = WizardStep::BackendUrl;
                    return Ok(false);
                }

                // 設定を保存する。
                app.cfg.backend.base_url = app.backend_url.clone();
                app.cfg.technician.full_name = app.full_name.clone();
                app.cfg.save(&app.cfg_path)?;

                // トークンが入力されていれば書き込む。
                if !app.token_value.is_empty() {
                    TokenStore::new(&app.cfg.backend.token_path)
                        .save(&app.token_value)
                        .await?;
                    app.token_value.clear();
                }

                // Workerへ設定更新を通知する。
                app.worker_tx
                    .send(WorkerCmd::SaveSettings(app.cfg.clone()))
                    .await?;

                // メイン画面へ移動して一覧を更新する。
                app.ui.screen = Screen::Main;
                app.ui.status = "Setup complete!".into();
                request_refresh(app).await?;
            }
        }
    } else if shortcuts::matches_shortcut(&k, &sc.skip) {
        // 現在のステップをスキップする。
        app.wizard_state.next_step();
    }

    Ok(false)
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが無ければ何もしない。
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };

    // 入力ボックス用ショートカットを参照する。
    let sc = app.shortcuts.input_box.clone();

    // 入力ボックス中でもCtrl+Cで終了できるようにする。
    if is_ctrl_c(&k) {
        return Ok(true);
    }

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 入力ボックスを閉じる前に値とコールバック種別を保存する。
        let value = input_state.value.clone();
        let callback_id = input_state.callback_id.clone();
        app.input_box = None;

        // コールバック種別に応じて値を反映する。
        apply_input_callback(app, callback_id, value).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 入力を破棄して入力ボックスを閉じる。
        app.input_box = None;
    } else if shortcuts::matches_shortcut(&k, &sc.backspace) {
        input_state.backspace();
    } else if shortcuts::matches_shortcut(&k, &sc.delete) {
        input_state.delete();
    } else if shortcuts::matches_shortcut(&k, &sc.left) {
        input_state.move_left();
    } else if shortcuts::matches_shortcut(&k, &sc.right) {
        input_state.move_right();
    } else if shortcuts::matches_shortcut(&k, &sc.home) {
        input_state.move_home();
    } else if shortcuts::matches_shortcut(&k, &sc.end) {
        input_state.move_end();
    } else if shortcuts::matches_shortcut(&k, &sc.clear_line) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code {
        // 通常の文字入力を処理する（コントロールキー以外）。
        if !k.modifiers.contains(KeyModifiers::CONTROL) {
            input_state.insert_char(c);
        }
    }

    Ok(false)
}

/// 入力ボックスのコールバックを適用する。
async fn apply_input_callback(
    app: &mut App,
    callback_id: InputCallbackId,
    value: String,
) -> Result<()> {
    match callback_id {
        InputCallbackId::SettingsBackendUrl => app.backend_url = value,
        InputCallbackId::SettingsTokenPath => app.token_path = value,
        InputCallbackId::SettingsToken => app.token_value = value,
        InputCallbackId::SettingsFullName => app.full_name = value,

        InputCallbackId::WizardBackendUrl => {
            // ウィザードのバックエンドURLを更新し次へ進む。
            app.backend_url = value;
            app.wizard_state.next_step();
        }
        InputCallbackId::WizardToken => {
            app.token_value = value;
            app.wizard_state.next_step();
        }
        InputCallbackId::WizardFullName => {
            app.full_name = value;
            app.wizard_state.next_step();
        }

        InputCallbackId::FieldText { section, field } => {
            apply_field_text(app, section, field, value, false);
        }
        InputCallbackId::FieldDate { section, field } => {
            apply_field_text(app, section, field, value.trim().to_string(), false);
        }
        InputCallbackId::FieldNumber { section, field } => {
            apply_field_text(app, section, field, value, true);
        }
        InputCallbackId::TableCell {
            section,
            field,
            row,
            col,
        } => {
            apply_table_cell(app, section, field, row, col, value);
        }
        InputCallbackId::PhotoPath { field_id } => {
            apply_photo_path(app, &field_id, value).await;
        }
        InputCallbackId::ReportPath => {
            // 選択時点でサイズ上限を検査し、超過ファイルは状態へ入れない。
            match completion::select_report_file(value.trim()).await {
                Ok(report) => {
                    if let Some(session) = app.session.as_mut() {
                        app.ui.status = format!("Report attached: {}", report.name);
                        session.report = Some(report);
                    }
                }
                Err(e) => app.ui.error = Some(e.to_string()),
            }
        }
        InputCallbackId::CompletionNotes => {
            if let Some(session) = app.session.as_mut() {
                session.form.notes = value;
            }
        }

        InputCallbackId::InvoiceDescription => {
            if let Some(invoice) = invoice_mut(app) {
                invoice.description = value;
            }
        }
        InputCallbackId::InvoiceNotes => {
            if let Some(invoice) = invoice_mut(app) {
                invoice.notes = value;
            }
        }
        InputCallbackId::InvoiceItemName(id) => {
            if let Some(invoice) = invoice_mut(app) {
                invoice.set_name(id, value);
            }
        }
        InputCallbackId::InvoiceItemQuantity(id) => {
            // 数量の編集はamountの再計算を伴う。
            let qty = crate::form::parse_number_input(&value).unwrap_or(0.0);
            if let Some(invoice) = invoice_mut(app) {
                invoice.set_quantity(id, qty);
            }
        }
        InputCallbackId::InvoiceItemRate(id) => {
            let rate = crate::form::parse_number_input(&value).unwrap_or(0.0);
            if let Some(invoice) = invoice_mut(app) {
                invoice.set_rate(id, rate);
            }
        }
        InputCallbackId::InvoiceTaxPercent => {
            let tax = crate::form::parse_number_input(&value).unwrap_or(0.0);
            if let Some(invoice) = invoice_mut(app) {
                invoice.tax_percentage = tax;
            }
        }
    }
    Ok(())
}

/// テキスト系コールバックの反映。numberはパースしてから保存する。
fn apply_field_text(app: &mut App, section: usize, field: usize, value: String, number: bool) {
    let Some(session) = app.session.as_mut() else {
        return;
    };
    let Some((section_id, field_id)) = session
        .template
        .sections
        .get(section)
        .and_then(|s| s.fields.get(field).map(|f| (s.id.clone(), f.id.clone())))
    else {
        return;
    };
    if number {
        session.form.set_number_input(&section_id, &field_id, &value);
    } else if value.is_empty() {
        // 空入力は未回答へ戻す。
        session.form.clear_value(&section_id, &field_id);
    } else {
        session
            .form
            .set_value(&section_id, &field_id, Answer::Text(value));
    }
}

/// テーブルセルのコールバック反映。数値列は数字以外を取り除く。
fn apply_table_cell(
    app: &mut App,
    section: usize,
    field: usize,
    row: usize,
    col: usize,
    value: String,
) {
    let Some(session) = app.session.as_mut() else {
        return;
    };
    let Some((section_id, field_def)) = session
        .template
        .sections
        .get(section)
        .and_then(|s| s.fields.get(field).map(|f| (s.id.clone(), f)))
    else {
        return;
    };
    let Some(column) = field_def.columns.get(col) else {
        return;
    };
    let cell = if column.column_type == ColumnType::Number {
        // 数値列は編集時に数字・小数点・符号以外を落とす。
        value
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect()
    } else {
        value
    };
    let (field_id, column_id) = (field_def.id.clone(), column.id.clone());
    session
        .form
        .update_table_cell(&section_id, &field_id, row, &column_id, cell);
}

/// 入力されたパスからライブラリ取り込みを実行する。
async fn apply_photo_path(app: &mut App, field_id: &str, value: String) {
    let path = value.trim().to_string();
    if path.is_empty() {
        return;
    }
    let App {
        session, device, ui, ..
    } = app;
    let Some(session) = session.as_mut() else {
        return;
    };
    // パスをデバイスへ渡してから取り込みを実行する。
    device.pending_path = Some(path);
    match session
        .media
        .add_media(device, field_id, CaptureSource::Library)
        .await
    {
        Ok(true) => ui.status = "Photo attached".into(),
        Ok(false) => ui.status = "Capture cancelled".into(),
        Err(e) => ui.error = Some(e.to_string()),
    }
    device.pending_path = None;
}

/// 請求書エディタへの可変参照を取得する。
fn invoice_mut(app: &mut App) -> Option<&mut InvoiceEditor> {
    app.session.as_mut()?.invoice.as_mut()
}

/// 表示用の数値整形（整数は小数点以下を省く）。
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// 設定画面用の編集バッファを設定値から再読み込みする。
fn reload_settings_buffers(app: &mut App) {
    // 設定の現在値を編集用バッファへ反映する。
    app.backend_url = app.cfg.backend.base_url.clone();
    app.token_path = app.cfg.backend.token_path.clone();
    app.full_name = app.cfg.technician.full_name.clone();
    app.token_value.clear();
}
