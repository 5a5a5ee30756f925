//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    api::completion::ReportFile,
    config::Config,
    events::{Screen, UiState},
    form::FormState,
    input::InputBoxState,
    invoice::InvoiceEditor,
    jobs::{Job, JobStatus},
    media::{LocalFileDevice, MediaStore},
    shortcuts::Shortcuts,
    template::{Field, InspectionTemplate, Section},
    theme::Theme,
    ui::Tui,
    wizard,
    worker::{self, WorkerCmd, WorkerEvent},
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// 1件のジョブ完了入力セッション。ジョブを開くたびに作り直し、
/// 閉じるか完了したら破棄する（下書きの永続化はしない）。
pub struct FormSession {
    /// 対象ジョブのローカルID。
    pub job_id: Uuid,
    /// バックエンドのジョブID。
    pub remote_id: String,
    /// 編集可能かどうか。完了済みジョブは読み取り専用で開く。
    pub editable: bool,
    /// サーバー提供の点検テンプレート（読み取り専用）。
    pub template: InspectionTemplate,
    /// 全セクションの回答。
    pub form: FormState,
    /// 写真フィールドの添付一覧。
    pub media: MediaStore,
    /// 請求書エディタ（Someなら請求書有効）。
    pub invoice: Option<InvoiceEditor>,
    /// 添付済みPDFレポート。
    pub report: Option<ReportFile>,
}

impl FormSession {
    /// 現在カーソルが指すセクションを返す。
    pub fn current_section(&self, ui: &UiState) -> Option<&Section> {
        self.template.sections.get(ui.section_idx)
    }

    /// 現在カーソルが指すフィールドを返す。
    pub fn current_field(&self, ui: &UiState) -> Option<&Field> {
        self.current_section(ui)?.fields.get(ui.field_idx)
    }

    /// 未回答の必須フィールド数を数える（提出はブロックしない）。
    pub fn unanswered_required(&self) -> usize {
        self.template
            .sections
            .iter()
            .flat_map(|s| s.fields.iter().map(move |f| (s, f)))
            .filter(|(s, f)| f.required && self.form.get(&s.id, &f.id).is_none())
            .count()
    }
}

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// 永続化された設定ファイルのパス。
    pub cfg_path: PathBuf,
    /// メモリ上の現在設定。
    pub cfg: Config,
    /// 描画関数へ明示的に渡す配色テーマ。
    pub theme: Theme,
    /// 選択位置やステータスなどUI固有の状態。
    pub ui: UiState,
    /// バックエンドから読み込んだジョブ一覧。
    pub jobs: Vec<Job>,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,

    /// 設定画面で編集するバックエンドURL。
    pub backend_url: String,
    /// 設定画面で編集するトークンファイルパス。
    pub token_path: String,
    /// 設定画面で入力された新しいトークン（保存時に書き込む）。
    pub token_value: String,
    /// 設定画面で編集する氏名。
    pub full_name: String,

    /// 開いているジョブの完了入力セッション。
    pub session: Option<FormSession>,
    /// 写真取り込みに使うローカルデバイス。
    pub device: LocalFileDevice,

    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,

    /// 初期設定ウィザードの状態。
    pub wizard_state: wizard::WizardState,

    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut Tui) -> Result<()> {
    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg_path = PathBuf::from("config.toml");
    let cfg = Config::load_or_default(&cfg_path)?;

    // ショートカットとテーマを読み込む（無ければデフォルト）。
    let shortcuts = Shortcuts::load_or_default("shortcut.toml")?;
    let theme = Theme::load_or_default("theme.toml")?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 初期設定スナップショットでWorkerを起動する。
    tokio::spawn(worker::run(rx_cmd, tx_ev, cfg.clone()));

    // 設定の充足度に応じて初期画面を決める。
    let initial_screen = if cfg.needs_setup() {
        Screen::InitialSetup
    } else {
        Screen::Main
    };

    // アプリ状態を初期化する。
    let mut app = App {
        cfg_path,
        cfg: cfg.clone(),
        theme,
        ui: UiState::new(initial_screen.clone()),
        jobs: vec![],
        worker_tx: tx_cmd,
        worker_rx: rx_ev,
        backend_url: cfg.backend.base_url.clone(),
        token_path: cfg.backend.token_path.clone(),
        token_value: String::new(),
        full_name: cfg.technician.full_name.clone(),
        session: None,
        device: LocalFileDevice { pending_path: None },
        input_box: None,
        wizard_state: wizard::WizardState::new(),
        shortcuts,
    };

    // ウィザード以外なら起動時に一覧を更新する。
    if initial_screen == Screen::Main {
        request_refresh(&mut app).await?;
    }

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev).await?;
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            // どのフェーズでもCtrl+Cで終了できるようにする。
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
async fn handle_worker_event(app: &mut App, ev: WorkerEvent) -> Result<()> {
    match ev {
        WorkerEvent::JobsLoaded(jobs) => {
            // ジョブ一覧を更新し選択を先頭に戻す。
            app.jobs = jobs;
            app.ui.selected = 0;
            app.ui.status = format!("Loaded {} jobs", app.jobs.len());
        }
        WorkerEvent::JobUpdated { job_id, status } => {
            // 完了したジョブのセッションは破棄してメイン画面へ戻る。
            let completed = status == JobStatus::Completed;
            if let Some(j) = app.jobs.iter_mut().find(|j| j.id == job_id) {
                j.status = status;
            }
            if completed && app.session.as_ref().is_some_and(|s| s.job_id == job_id) {
                // サーバーが完了後の正とするため、再取得で同期する。
                app.session = None;
                app.ui.screen = Screen::Main;
                app.ui.status = "Job completed".into();
                request_refresh(app).await?;
            }
        }
        WorkerEvent::TemplateLoaded { job_id, template } => {
            // テンプレートが届いたらセッションを開始する。
            let Some(job) = app.jobs.iter().find(|j| j.id == job_id) else {
                return Ok(());
            };
            let editable = job.status.editable();
            app.session = Some(FormSession {
                job_id,
                remote_id: job.remote_id.clone(),
                editable,
                template,
                form: FormState::new(),
                media: MediaStore::new(),
                invoice: None,
                report: None,
            });
            app.ui.reset_form_cursors();
            app.ui.screen = Screen::JobForm;
            app.ui.status = if editable {
                format!("Editing: {}", job.title)
            } else {
                format!("Viewing (read-only): {}", job.title)
            };
        }
        WorkerEvent::Log(s) => {
            // ログを追加する。
            app.ui.log.push(s);
        }
        WorkerEvent::Error(s) => {
            // ステータスにエラーを表示する。
            app.ui.status = format!("Error: {s}");
        }
        WorkerEvent::AuthExpired => {
            // 認証切れは再認証が必要な状態として区別して表示する。
            app.ui.auth_expired = true;
            app.ui.error = Some("Authentication expired. Update the token in Settings.".into());
        }
    }
    Ok(())
}

/// 必須設定が揃っていればWorkerへリフレッシュ要求する。
pub async fn request_refresh(app: &mut App) -> Result<()> {
    // バックエンドURLが未設定なら案内メッセージを出す。
    if app.cfg.backend.base_url.is_empty() {
        app.ui.status = "Settings required (press t)".into();
        tracing::warn!("refresh skipped: settings required");
    } else {
        // Workerへリフレッシュを依頼する。
        tracing::info!("refresh requested");
        app.worker_tx.send(WorkerCmd::RefreshJobs).await?;
        app.ui.status = "Refreshing jobs...".into();
    }
    Ok(())
}
