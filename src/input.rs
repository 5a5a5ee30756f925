//! TUI内での文字列入力コンポーネント（InputBox）。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::theme::Theme;

/// InputBox入力状態
#[derive(Clone, Debug)]
pub struct InputBoxState {
    /// プロンプトメッセージ
    pub prompt: String,
    /// 現在の入力値
    pub value: String,
    /// カーソル位置（文字単位）
    pub cursor: usize,
    /// 入力完了時のコールバック識別子
    pub callback_id: InputCallbackId,
}

/// 入力完了時のコールバック識別子
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputCallbackId {
    // Settings画面用
    SettingsBackendUrl,
    SettingsTokenPath,
    SettingsToken,
    SettingsFullName,

    // Wizard画面用
    WizardBackendUrl,
    WizardToken,
    WizardFullName,

    // JobForm画面用（セクション/フィールドはインデックスで指す）
    FieldText { section: usize, field: usize },
    FieldNumber { section: usize, field: usize },
    FieldDate { section: usize, field: usize },
    TableCell {
        section: usize,
        field: usize,
        row: usize,
        col: usize,
    },
    PhotoPath { field_id: String },
    ReportPath,
    CompletionNotes,

    // Invoice画面用（行はLineItemのidで指す）
    InvoiceDescription,
    InvoiceNotes,
    InvoiceItemName(u64),
    InvoiceItemQuantity(u64),
    InvoiceItemRate(u64),
    InvoiceTaxPercent,
}

impl InputBoxState {
    /// 現在値とプロンプトから、カーソルを末尾に置いた状態を作る。
    pub fn open(prompt: impl Into<String>, value: String, callback_id: InputCallbackId) -> Self {
        let cursor = value.chars().count();
        Self {
            prompt: prompt.into(),
            value,
            cursor,
            callback_id,
        }
    }

    /// 文字を挿入
    pub fn insert_char(&mut self, c: char) {
        // カーソル位置で分割して挿入し、文字列を再構成する。
        let chars: Vec<char> = self.value.chars().collect();
        let mut rebuilt: Vec<char> = chars[..self.cursor].to_vec();
        rebuilt.push(c);
        rebuilt.extend_from_slice(&chars[self.cursor..]);
        self.value = rebuilt.into_iter().collect();
        self.cursor += 1;
    }

    /// Backspace（カーソル前の文字を削除）
    pub fn backspace(&mut self) {
        // カーソルが先頭なら何もしない。
        if self.cursor == 0 {
            return;
        }
        self.remove_char_at(self.cursor - 1);
        self.cursor -= 1;
    }

    /// Delete（カーソル位置の文字を削除）
    pub fn delete(&mut self) {
        // カーソルが末尾なら何もしない。
        if self.cursor < self.value.chars().count() {
            self.remove_char_at(self.cursor);
        }
    }

    /// 指定位置の文字を取り除いて再構成する。
    fn remove_char_at(&mut self, idx: usize) {
        self.value = self
            .value
            .chars()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, c)| c)
            .collect();
    }

    /// カーソルを左に移動
    pub fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    /// カーソルを右に移動
    pub fn move_right(&mut self) {
        // 末尾を超えないようにする。
        if self.cursor < self.value.chars().count() {
            self.cursor += 1;
        }
    }

    /// カーソルを先頭に移動
    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// カーソルを末尾に移動
    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// 行全体をクリア
    pub fn clear_line(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }
}

/// InputBoxをポップアップとして描画
pub fn render_input_box(f: &mut Frame, state: &InputBoxState, theme: &Theme) {
    // 中央に配置されたポップアップ領域を計算する。
    let popup_area = centered_popup(f.area(), 70, 7);

    // 既存の描画を消してポップアップ用の背景にする。
    f.render_widget(Clear, popup_area);

    // ポップアップの外枠とスタイルを描画する。
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Input")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    // 内部レイアウト（プロンプト + 入力フィールド + ヘルプ）を定義する。
    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // プロンプト
            Constraint::Length(1), // 入力フィールド
            Constraint::Length(1), // 空行
            Constraint::Length(1), // ヘルプ
        ])
        .split(popup_area);

    // プロンプトメッセージを描画する。
    let prompt_widget = Paragraph::new(state.prompt.clone()).style(
        Style::default()
            .fg(theme.accent_fg())
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(prompt_widget, inner_layout[0]);

    // カーソル位置が表示幅を超えた場合のスクロール量を算出する。
    let display_width = inner_layout[1].width as usize;
    let scroll_offset = if state.cursor > display_width.saturating_sub(2) {
        state.cursor.saturating_sub(display_width - 2)
    } else {
        0
    };

    // 現在の入力値を可視範囲に切り出す。
    let chars: Vec<char> = state.value.chars().collect();
    let visible_text: String = chars
        .iter()
        .skip(scroll_offset)
        .take(display_width)
        .collect();

    // カーソル位置を視覚的に表現（|を挿入）する。
    let cursor_pos_in_visible = state.cursor.saturating_sub(scroll_offset);
    let visible_chars: Vec<char> = visible_text.chars().collect();
    let split = cursor_pos_in_visible.min(visible_chars.len());
    let before: String = visible_chars[..split].iter().collect();
    let after: String = visible_chars[split..].iter().collect();
    let visible_with_cursor = format!("{}|{}", before, after);

    // 文字列とカーソルを含む入力欄を描画する。
    let input_widget = Paragraph::new(visible_with_cursor).style(Style::default().fg(Color::Green));
    f.render_widget(input_widget, inner_layout[1]);

    // ヘルプテキストを描画する。
    let help = Paragraph::new("Enter=確定 | ESC=キャンセル | Ctrl+U=クリア")
        .style(Style::default().fg(theme.dim_fg()))
        .alignment(Alignment::Center);
    f.render_widget(help, inner_layout[3]);
}

/// 中央配置のポップアップ領域を計算
fn centered_popup(area: Rect, width_percent: u16, height: u16) -> Rect {
    // 縦方向の余白を作り、中央行を取り出す。
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    // 横方向も中央に寄せてポップアップ領域を返す。
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete_round_trip() {
        // 挿入と削除でカーソルと値が整合することを検証する。
        let mut s = InputBoxState::open("p", "ab".into(), InputCallbackId::ReportPath);
        assert_eq!(s.cursor, 2);
        s.insert_char('c');
        assert_eq!(s.value, "abc");
        s.backspace();
        s.move_home();
        s.delete();
        assert_eq!(s.value, "b");
        assert_eq!(s.cursor, 0);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        // カーソルが値の範囲外へ出ないことを検証する。
        let mut s = InputBoxState::open("p", "あい".into(), InputCallbackId::ReportPath);
        s.move_right();
        assert_eq!(s.cursor, 2);
        s.move_home();
        s.move_left();
        assert_eq!(s.cursor, 0);
    }
}
