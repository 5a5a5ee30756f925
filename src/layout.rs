//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// メイン画面の3つの領域
pub struct MainLayout {
    /// Body（一覧/フォーム + INFO Panel）の領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// ボディ部の2つの領域（左パネル + INFO Panel）
pub struct BodyLayout {
    /// ジョブ一覧またはフォーム本体の領域
    pub primary: Rect,
    /// INFO Panelの領域
    pub info_panel: Rect,
}

/// メイン画面を3つの領域に分割（Body + HELP + STATUS）
pub fn create_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Body
            Constraint::Length(3), // HELPバー
            Constraint::Length(3), // STATUSバー
        ])
        .split(area);

    MainLayout {
        body: chunks[0],
        help_bar: chunks[1],
        status_bar: chunks[2],
    }
}

/// Body領域を2つに分割（本体 65% + INFO Panel 35%）
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(65), // 本体
            Constraint::Percentage(35), // INFO Panel
        ])
        .split(area);

    BodyLayout {
        primary: chunks[0],
        info_panel: chunks[1],
    }
}
