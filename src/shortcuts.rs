//! ショートカット設定の管理。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ショートカット設定の全体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortcuts {
    pub main: MainShortcuts,
    pub form: FormShortcuts,
    pub invoice: InvoiceShortcuts,
    pub settings: SettingsShortcuts,
    pub wizard: WizardShortcuts,
    pub input_box: InputBoxShortcuts,
}

/// メイン画面（ジョブ一覧）のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainShortcuts {
    pub quit: Vec<String>,
    pub settings: Vec<String>,
    pub refresh: Vec<String>,
    pub open: Vec<String>,
    pub claim: Vec<String>,
    pub down: Vec<String>,
    pub up: Vec<String>,
}

/// 点検フォーム画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormShortcuts {
    pub cancel: Vec<String>,
    pub next_field: Vec<String>,
    pub prev_field: Vec<String>,
    pub next_section: Vec<String>,
    pub prev_section: Vec<String>,
    pub edit: Vec<String>,
    pub toggle: Vec<String>,
    pub add_row: Vec<String>,
    pub remove_row: Vec<String>,
    pub row_down: Vec<String>,
    pub row_up: Vec<String>,
    pub next_col: Vec<String>,
    pub add_photo: Vec<String>,
    pub add_photo_camera: Vec<String>,
    pub remove_photo: Vec<String>,
    pub report: Vec<String>,
    pub notes: Vec<String>,
    pub invoice: Vec<String>,
    pub submit: Vec<String>,
}

/// 請求書エディタのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceShortcuts {
    pub back: Vec<String>,
    pub add_item: Vec<String>,
    pub remove_item: Vec<String>,
    pub down: Vec<String>,
    pub up: Vec<String>,
    pub name: Vec<String>,
    pub quantity: Vec<String>,
    pub rate: Vec<String>,
    pub tax: Vec<String>,
    pub description: Vec<String>,
    pub notes: Vec<String>,
    pub disable: Vec<String>,
}

/// 設定画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsShortcuts {
    pub cancel: Vec<String>,
    pub save: Vec<String>,
    pub backend_url: Vec<String>,
    pub token_path: Vec<String>,
    pub token: Vec<String>,
    pub name: Vec<String>,
}

/// ウィザード画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardShortcuts {
    pub proceed: Vec<String>,
    pub skip: Vec<String>,
}

/// InputBoxのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBoxShortcuts {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub backspace: Vec<String>,
    pub delete: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub home: Vec<String>,
    pub end: Vec<String>,
    pub clear_line: Vec<String>,
}

impl Shortcuts {
    /// TOMLから読み込み、無ければデフォルトを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            // 既存ファイルを読み込んでパースする。
            let content = std::fs::read_to_string(path)?;
            let shortcuts: Shortcuts = toml::from_str(&content)?;
            Ok(shortcuts)
        } else {
            // 未作成の場合は既定値を利用する。
            Ok(Self::default())
        }
    }

    /// TOMLとして保存する。
    #[allow(dead_code)]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // 文字列にシリアライズする。
        let content = toml::to_string_pretty(self)?;
        // ファイルへ書き込む。
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            main: MainShortcuts {
                quit: vec!["q".into()],
                settings: vec!["t".into()],
                refresh: vec!["r".into()],
                open: vec!["Enter".into()],
                claim: vec!["c".into()],
                down: vec!["Down".into(), "j".into()],
                up: vec!["Up".into(), "k".into()],
            },
            form: FormShortcuts {
                cancel: vec!["Esc".into()],
                next_field: vec!["Down".into(), "Tab".into()],
                prev_field: vec!["Up".into()],
                next_section: vec!["Right".into()],
                prev_section: vec!["Left".into()],
                edit: vec!["e".into()],
                toggle: vec![" ".into()],
                add_row: vec!["a".into()],
                remove_row: vec!["d".into()],
                row_down: vec!["]".into()],
                row_up: vec!["[".into()],
                next_col: vec!["c".into()],
                add_photo: vec!["p".into()],
                add_photo_camera: vec!["o".into()],
                remove_photo: vec!["x".into()],
                report: vec!["f".into()],
                notes: vec!["n".into()],
                invoice: vec!["i".into()],
                submit: vec!["s".into()],
            },
            invoice: InvoiceShortcuts {
                back: vec!["Esc".into()],
                add_item: vec!["a".into()],
                remove_item: vec!["d".into()],
                down: vec!["Down".into(), "j".into()],
                up: vec!["Up".into(), "k".into()],
                name: vec!["e".into()],
                quantity: vec!["q".into()],
                rate: vec!["r".into()],
                tax: vec!["t".into()],
                description: vec!["c".into()],
                notes: vec!["n".into()],
                disable: vec!["x".into()],
            },
            settings: SettingsShortcuts {
                cancel: vec!["Esc".into()],
                save: vec!["Enter".into()],
                backend_url: vec!["u".into()],
                token_path: vec!["p".into()],
                token: vec!["k".into()],
                name: vec!["n".into()],
            },
            wizard: WizardShortcuts {
                proceed: vec!["Enter".into()],
                skip: vec!["Esc".into()],
            },
            input_box: InputBoxShortcuts {
                confirm: vec!["Enter".into()],
                cancel: vec!["Esc".into()],
                backspace: vec!["Backspace".into()],
                delete: vec!["Delete".into()],
                left: vec!["Left".into()],
                right: vec!["Right".into()],
                home: vec!["Home".into()],
                end: vec!["End".into()],
                clear_line: vec!["Ctrl+u".into()],
            },
        }
    }
}

/// KeyEventがいずれかのショートカット文字列と一致するか判定する。
pub fn matches_shortcut(key: &KeyEvent, shortcuts: &[String]) -> bool {
    shortcuts.iter().any(|s| matches_single_shortcut(key, s))
}

/// KeyEventが単一のショートカット文字列と一致するか判定する。
fn matches_single_shortcut(key: &KeyEvent, shortcut: &str) -> bool {
    // スペースキーは分割前に特別扱いする。
    if shortcut == " " {
        return key.modifiers.is_empty() && key.code == KeyCode::Char(' ');
    }

    // ショートカット文字列を分解する（例: "Ctrl+u", "a", "Enter"）。
    let parts: Vec<&str> = shortcut.split('+').collect();

    let (modifiers_str, key_str) = if parts.len() > 1 {
        // 修飾キー付きの形式（例: "Ctrl+u"）。
        (&parts[0..parts.len() - 1], parts[parts.len() - 1])
    } else {
        // 修飾キーなしの形式（例: "a", "Enter"）。
        (&[][..], parts[0])
    };

    // 修飾キーを解析して期待値を作る。
    let mut expected_modifiers = KeyModifiers::empty();
    for modifier in modifiers_str {
        match *modifier {
            "Ctrl" | "ctrl" => expected_modifiers |= KeyModifiers::CONTROL,
            "Alt" | "alt" => expected_modifiers |= KeyModifiers::ALT,
            "Shift" | "shift" => expected_modifiers |= KeyModifiers::SHIFT,
            _ => return false,
        }
    }

    // 修飾キーが一致しなければ即座に不一致とする。
    if key.modifiers != expected_modifiers {
        return false;
    }

    // キーコードの種別ごとに一致判定を行う。
    match key_str {
        "Enter" | "enter" => key.code == KeyCode::Enter,
        "Esc" | "esc" => key.code == KeyCode::Esc,
        "Tab" | "tab" => key.code == KeyCode::Tab,
        "Backspace" | "backspace" => key.code == KeyCode::Backspace,
        "Delete" | "delete" => key.code == KeyCode::Delete,
        "Up" | "up" => key.code == KeyCode::Up,
        "Down" | "down" => key.code == KeyCode::Down,
        "Left" | "left" => key.code == KeyCode::Left,
        "Right" | "right" => key.code == KeyCode::Right,
        "Home" | "home" => key.code == KeyCode::Home,
        "End" | "end" => key.code == KeyCode::End,
        // 単一文字は Char として比較する。
        s if s.len() == 1 => {
            if let Some(c) = s.chars().next() {
                key.code == KeyCode::Char(c)
            } else {
                false
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_shortcut_simple_char() {
        // 単一文字の一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("q")]));
        assert!(!matches_shortcut(&key, &[String::from("w")]));
    }

    #[test]
    fn test_matches_shortcut_special_key() {
        // 特殊キーの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("Enter")]));
        assert!(!matches_shortcut(&key, &[String::from("Esc")]));
    }

    #[test]
    fn test_matches_shortcut_with_modifier() {
        // 修飾キー付きの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert!(matches_shortcut(&key, &[String::from("Ctrl+u")]));
        assert!(!matches_shortcut(&key, &[String::from("u")]));
    }

    #[test]
    fn test_matches_shortcut_space() {
        // スペースキー（トグル用）の一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from(" ")]));
    }

    #[test]
    fn test_matches_shortcut_multiple_keys() {
        // 複数キーバインドの一致判定を検証する。
        let key_down = KeyEvent::new(KeyCode::Down, KeyModifiers::empty());
        let key_j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::empty());
        let shortcuts = vec![String::from("Down"), String::from("j")];

        assert!(matches_shortcut(&key_down, &shortcuts));
        assert!(matches_shortcut(&key_j, &shortcuts));

        let key_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::empty());
        assert!(!matches_shortcut(&key_x, &shortcuts));
    }
}
