//! 初期設定ウィザードのステート管理。

/// ウィザードの各ステップ
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardStep {
    /// ウェルカムメッセージ
    Welcome,
    /// バックエンドURL
    BackendUrl,
    /// アクセストークン
    Token,
    /// 技術者名
    TechnicianName,
    /// 完了
    Complete,
}

/// ウィザードの状態管理
#[derive(Clone, Debug)]
pub struct WizardState {
    /// 現在のステップ
    pub current_step: WizardStep,
    /// 全ステップ数
    pub total_steps: usize,
}

impl WizardState {
    /// 新しいウィザード状態を作成
    pub fn new() -> Self {
        // 最初はWelcomeステップから開始する。
        Self {
            current_step: WizardStep::Welcome,
            total_steps: 5,
        }
    }

    /// 次のステップへ進む
    pub fn next_step(&mut self) {
        // 現在のステップに応じて次のステップを決定する。
        self.current_step = match self.current_step {
            WizardStep::Welcome => WizardStep::BackendUrl,
            WizardStep::BackendUrl => WizardStep::Token,
            WizardStep::Token => WizardStep::TechnicianName,
            WizardStep::TechnicianName => WizardStep::Complete,
            WizardStep::Complete => WizardStep::Complete,
        };
    }

    /// 現在のステップのプロンプトメッセージを取得
    pub fn get_prompt(&self) -> String {
        // ステップごとの説明文を返す。
        match self.current_step {
            WizardStep::Welcome => {
                "fieldwork_tuiへようこそ！\n\nこのウィザードでは、アプリケーションの初期設定を行います。\nEnterキーを押して開始してください。".to_string()
            }
            WizardStep::BackendUrl => {
                "バックエンドURLの設定\n\nディスパッチAPIのベースURLを入力してください。\nEnterキーで入力画面を開きます。".to_string()
            }
            WizardStep::Token => {
                "アクセストークンの設定\n\n発行済みのベアラートークンを入力してください。\nEnterキーで入力画面を開きます。".to_string()
            }
            WizardStep::TechnicianName => {
                "技術者名の設定\n\nあなたの氏名を入力してください。\nEnterキーで入力画面を開きます。".to_string()
            }
            WizardStep::Complete => {
                "設定完了！\n\nすべての設定が完了しました。\nEnterキーを押してメイン画面に移動します。".to_string()
            }
        }
    }

    /// 現在のステップ番号を取得（1始まり）
    pub fn get_step_number(&self) -> usize {
        // ステップを番号へ対応付ける。
        match self.current_step {
            WizardStep::Welcome => 1,
            WizardStep::BackendUrl => 2,
            WizardStep::Token => 3,
            WizardStep::TechnicianName => 4,
            WizardStep::Complete => 5,
        }
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}
