use crate::color::Rgb;
use crate::error::{Result, TreeError};
use crate::graphics::FrameBuffer;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use std::io::Write;

/// Upper half block: foreground paints the top pixel, background the bottom one
const HALF_BLOCK: char = '\u{2580}';

/// Current terminal size as (columns, rows)
pub fn terminal_size() -> (u16, u16) {
    termsize::get()
        .map(|size| (size.cols, size.rows))
        .or_else(|| terminal::size().ok())
        .unwrap_or((80, 24))
}

/// Raw mode, alternate screen and mouse capture for as long as it lives
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().map_err(|e| TreeError::Terminal(e.to_string()))?;
        execute!(
            std::io::stdout(),
            EnterAlternateScreen,
            EnableMouseCapture,
            Hide,
            Clear(ClearType::All)
        )?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(
            std::io::stdout(),
            ResetColor,
            Show,
            DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = disable_raw_mode();
    }
}

fn to_color(rgb: Rgb) -> Color {
    let (r, g, b) = rgb.to_rgb8();
    Color::Rgb { r, g, b }
}

/// Writes two frame rows per terminal row, then a status line
pub fn present<W: Write>(out: &mut W, frame: &FrameBuffer, status: &str) -> Result<()> {
    let rows: Vec<&[Rgb]> = frame.rows().collect();
    for (row, pair) in rows.chunks(2).enumerate() {
        queue!(out, MoveTo(0, row as u16))?;
        let mut last: Option<(Color, Color)> = None;
        for (x, top) in pair[0].iter().enumerate() {
            let bottom = pair.get(1).map_or(Rgb::BLACK, |r| r[x]);
            let colors = (to_color(*top), to_color(bottom));
            if last != Some(colors) {
                queue!(out, SetForegroundColor(colors.0), SetBackgroundColor(colors.1))?;
                last = Some(colors);
            }
            queue!(out, Print(HALF_BLOCK))?;
        }
    }

    let status_row = frame.height().div_ceil(2) as u16;
    let width = frame.width();
    let mut line: String = status.chars().take(width).collect();
    let padding = width.saturating_sub(line.chars().count());
    line.extend(std::iter::repeat_n(' ', padding));
    queue!(
        out,
        MoveTo(0, status_row),
        SetForegroundColor(to_color(Rgb::hex("#FCD34D"))),
        SetBackgroundColor(to_color(Rgb::hex("#022C22"))),
        Print(line),
        ResetColor
    )?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_writes_half_blocks_and_status() {
        let frame = FrameBuffer::new(3, 4, Rgb::WHITE);
        let mut out = Vec::new();
        present(&mut out, &frame, "Merry Christmas!").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches(HALF_BLOCK).count(), 6);
        assert!(text.contains("Mer"));
        assert!(!text.contains("Merr"));
    }
}
