//! Markdown terminal formatting using termimad

use termimad::{gray, MadSkin};

use crate::display::terminal::should_use_colors;

/// Print markdown to stdout, styled when colors are enabled
pub fn print_markdown(markdown: &str) {
    if should_use_colors() {
        summary_skin().print_text(markdown);
    } else {
        println!("{}", markdown);
    }
}

/// Skin for summary tables and headings
fn summary_skin() -> MadSkin {
    use termimad::crossterm::style::{Attribute, Color::*};

    let mut skin = MadSkin::default();
    skin.headers[0].set_fg(Yellow);
    skin.headers[0].add_attr(Attribute::Bold);
    skin.headers[1].set_fg(DarkYellow);
    skin.headers[1].add_attr(Attribute::Bold);

    skin.inline_code.set_fg(Cyan);
    skin.code_block.set_bg(gray(2));
    skin.table.set_fg(gray(18));
    skin.bold.set_fg(White);
    skin.bold.add_attr(Attribute::Bold);
    skin.bullet.set_fg(DarkYellow);
    skin
}
