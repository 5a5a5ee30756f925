//! 画面遷移用のUI状態と画面種別。

/// TUIで現在表示中の画面。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// メインのジョブ一覧画面。
    Main,
    /// 選択ジョブの点検フォーム画面。
    JobForm,
    /// 請求書エディタ画面。
    Invoice,
    /// 設定編集画面。
    Settings,
    /// 初期設定ウィザード画面。
    InitialSetup,
}

/// 描画側と共有するUI状態。
#[derive(Clone, Debug)]
pub struct UiState {
    /// 現在の画面。
    pub screen: Screen,
    /// ジョブ一覧の選択行。
    pub selected: usize,
    /// フォームで表示中のセクション位置。
    pub section_idx: usize,
    /// セクション内で選択中のフィールド位置。
    pub field_idx: usize,
    /// テーブルフィールド内の行カーソル。
    pub row_idx: usize,
    /// テーブルフィールド内の列カーソル。
    pub col_idx: usize,
    /// 請求書エディタの選択行。
    pub invoice_idx: usize,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// エラーメッセージ（強調表示用）。
    pub error: Option<String>,
    /// 認証切れフラグ。立っている間はAPI操作を促さない。
    pub auth_expired: bool,
}

impl UiState {
    /// 初期画面を指定してUI状態を作成する。
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            selected: 0,
            section_idx: 0,
            field_idx: 0,
            row_idx: 0,
            col_idx: 0,
            invoice_idx: 0,
            log: vec![],
            status: "Ready".into(),
            error: None,
            auth_expired: false,
        }
    }

    /// フォーム内のカーソル類をまとめて先頭へ戻す。
    pub fn reset_form_cursors(&mut self) {
        self.section_idx = 0;
        self.field_idx = 0;
        self.row_idx = 0;
        self.col_idx = 0;
        self.invoice_idx = 0;
    }
}
