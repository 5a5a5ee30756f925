//! 配色テーマの読み込みと明示的な受け渡し。
//!
//! テーマはグローバル変数ではなく、Appが保持して描画関数へ引数として
//! 渡す。永続化は`theme.toml`に対して行う。

use anyhow::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `theme.toml`に保存する配色設定。色は名前か`#rrggbb`で指定する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    /// 選択行の背景色。
    pub highlight_bg: String,
    /// 選択行の文字色。
    pub highlight_fg: String,
    /// エラー表示の文字色。
    pub error_fg: String,
    /// 見出しなど強調の文字色。
    pub accent_fg: String,
    /// 補足テキストの文字色。
    pub dim_fg: String,
}

impl Theme {
    /// TOMLから読み込み、無ければデフォルトを書き出して返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let theme = Self::default();
            theme.save(path)?;
            Ok(theme)
        }
    }

    /// TOMLとして保存する。
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn highlight_bg(&self) -> Color {
        parse_color(&self.highlight_bg).unwrap_or(Color::Rgb(255, 140, 0))
    }

    pub fn highlight_fg(&self) -> Color {
        parse_color(&self.highlight_fg).unwrap_or(Color::Black)
    }

    pub fn error_fg(&self) -> Color {
        parse_color(&self.error_fg).unwrap_or(Color::Red)
    }

    pub fn accent_fg(&self) -> Color {
        parse_color(&self.accent_fg).unwrap_or(Color::Cyan)
    }

    pub fn dim_fg(&self) -> Color {
        parse_color(&self.dim_fg).unwrap_or(Color::Gray)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            highlight_bg: "#ff8c00".into(),
            highlight_fg: "black".into(),
            error_fg: "red".into(),
            accent_fg: "cyan".into(),
            dim_fg: "gray".into(),
        }
    }
}

/// 色指定文字列をratatuiのColorへ変換する。
fn parse_color(s: &str) -> Option<Color> {
    // 16進表記（#rrggbb）を先に試す。
    if let Some(hex) = s.strip_prefix('#')
        && hex.len() == 6
        && let Ok(v) = u32::from_str_radix(hex, 16)
    {
        return Some(Color::Rgb(
            ((v >> 16) & 0xff) as u8,
            ((v >> 8) & 0xff) as u8,
            (v & 0xff) as u8,
        ));
    }
    // 色名での指定を判定する。
    match s.to_ascii_lowercase().as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "gray" | "grey" => Some(Color::Gray),
        "white" => Some(Color::White),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_color() {
        // 色名の解決を検証する。
        assert_eq!(parse_color("cyan"), Some(Color::Cyan));
        assert_eq!(parse_color("Grey"), Some(Color::Gray));
        assert_eq!(parse_color("nonsense"), None);
    }

    #[test]
    fn test_parse_hex_color() {
        // 16進表記の解決を検証する。
        assert_eq!(parse_color("#ff8c00"), Some(Color::Rgb(255, 140, 0)));
        assert_eq!(parse_color("#zzzzzz"), None);
    }

    #[test]
    fn test_defaults_always_resolve() {
        // デフォルトテーマの全色が解決できることを検証する。
        let t = Theme::default();
        let _ = (
            t.highlight_bg(),
            t.highlight_fg(),
            t.error_fg(),
            t.accent_fg(),
            t.dim_fg(),
        );
    }
}
