use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};

use crate::core::DirectoryCount;
use crate::report::font::{self, GLYPH_HEIGHT, GLYPH_WIDTH};

const SCALE: u32 = 2;
const CHAR_ADVANCE: u32 = (GLYPH_WIDTH + 1) * SCALE;
const LINE_HEIGHT: u32 = GLYPH_HEIGHT * SCALE;

const MAX_LABEL_CHARS: usize = 40;
const BAR_SLOT: u32 = 56;
const BAR_WIDTH: u32 = 36;
/// Narrowest slot that still fits a rotated label.
const MIN_BAR_SLOT: u32 = LINE_HEIGHT + 4;
const MIN_PLOT_WIDTH: u32 = 480;
const MAX_PLOT_WIDTH: u32 = 8000;
const PLOT_HEIGHT: u32 = 420;
const MARGIN_LEFT: u32 = 100;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 76;
const CAPTION_GAP: u32 = 16;
const TARGET_TICKS: u64 = 5;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const BAR: Rgb<u8> = Rgb([135, 206, 235]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const TEXT: Rgb<u8> = Rgb([40, 40, 40]);

#[derive(Debug, Clone)]
pub struct ChartLabels {
    pub title: String,
    pub x_caption: String,
    pub y_caption: String,
}

impl Default for ChartLabels {
    fn default() -> Self {
        Self {
            title: "Markdown files per directory".to_string(),
            x_caption: "directory".to_string(),
            y_caption: "Markdown files".to_string(),
        }
    }
}

/// Renders one vertical bar per row, in the order given.
///
/// Bars carry their value above them and the directory label below,
/// rotated to read top to bottom. Slots narrow once the plot would exceed
/// `MAX_PLOT_WIDTH`; a row count that would need slots narrower than
/// `MIN_BAR_SLOT` fails before any pixels are allocated.
pub fn render_bar_chart(rows: &[DirectoryCount], labels: &ChartLabels) -> Result<RgbImage> {
    let slot = bar_slot(rows.len())?;
    let bar_width = (slot * BAR_WIDTH / BAR_SLOT).max(1);

    let bar_labels: Vec<String> = rows
        .iter()
        .map(|r| shorten_label(&r.directory, MAX_LABEL_CHARS))
        .collect();
    let longest = bar_labels
        .iter()
        .map(|l| l.chars().count() as u32)
        .max()
        .unwrap_or(0);

    let plot_width = (rows.len() as u32 * slot).max(MIN_PLOT_WIDTH);
    let label_area = longest * CHAR_ADVANCE + CAPTION_GAP;
    let width = MARGIN_LEFT + plot_width + MARGIN_RIGHT;
    let height = MARGIN_TOP + PLOT_HEIGHT + label_area + LINE_HEIGHT + 2 * CAPTION_GAP;

    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

    let plot_left = MARGIN_LEFT;
    let plot_bottom = MARGIN_TOP + PLOT_HEIGHT;

    let max_value = rows.iter().map(|r| r.count).max().unwrap_or(0);
    let (axis_max, step) = axis_scale(max_value);

    // grid and tick labels
    let mut tick = 0;
    while tick <= axis_max {
        let y = plot_bottom - scaled_height(tick, axis_max);
        if tick > 0 {
            fill_rect(&mut img, plot_left + 1, y, plot_width, 1, GRID);
        }
        let text = tick.to_string();
        let tx = plot_left.saturating_sub(text_width(&text) + 8);
        draw_text(&mut img, tx, y.saturating_sub(LINE_HEIGHT / 2), &text, TEXT);
        tick += step;
    }

    for (i, (row, label)) in rows.iter().zip(&bar_labels).enumerate() {
        let slot_left = plot_left + i as u32 * slot;
        let bar_left = slot_left + (slot - bar_width) / 2;
        let bar_height = scaled_height(row.count, axis_max);
        fill_rect(
            &mut img,
            bar_left,
            plot_bottom - bar_height,
            bar_width,
            bar_height,
            BAR,
        );

        let value = row.count.to_string();
        let center = bar_left + bar_width / 2;
        let vx = center.saturating_sub(text_width(&value) / 2);
        let vy = (plot_bottom - bar_height).saturating_sub(LINE_HEIGHT + 4);
        draw_text(&mut img, vx, vy, &value, TEXT);

        let lx = center.saturating_sub(LINE_HEIGHT / 2);
        draw_text_down(&mut img, lx, plot_bottom + CAPTION_GAP / 2, label, TEXT);
    }

    // axes
    fill_rect(&mut img, plot_left, MARGIN_TOP, 2, PLOT_HEIGHT + 1, AXIS);
    fill_rect(&mut img, plot_left, plot_bottom, plot_width, 2, AXIS);

    let title_x = (width.saturating_sub(text_width(&labels.title))) / 2;
    draw_text(&mut img, title_x, CAPTION_GAP, &labels.title, TEXT);

    let caption_x = plot_left + (plot_width.saturating_sub(text_width(&labels.x_caption))) / 2;
    let caption_y = plot_bottom + label_area + CAPTION_GAP;
    draw_text(&mut img, caption_x, caption_y, &labels.x_caption, TEXT);

    let y_caption_bottom = MARGIN_TOP + (PLOT_HEIGHT + text_width(&labels.y_caption)) / 2;
    draw_text_up(&mut img, CAPTION_GAP / 2, y_caption_bottom, &labels.y_caption, TEXT);

    Ok(img)
}

pub fn write_bar_chart(rows: &[DirectoryCount], labels: &ChartLabels, path: &Path) -> Result<()> {
    let img = render_bar_chart(rows, labels)?;
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write chart image: {}", path.display()))
}

fn bar_slot(bars: usize) -> Result<u32> {
    let max_bars = (MAX_PLOT_WIDTH / MIN_BAR_SLOT) as usize;
    if bars > max_bars {
        anyhow::bail!("too many directories to chart: {bars} (limit {max_bars})");
    }
    let bars = bars.max(1) as u32;
    Ok(BAR_SLOT.min(MAX_PLOT_WIDTH / bars))
}

/// Picks a 1/2/5 tick step giving about five ticks and the axis maximum it implies.
fn axis_scale(max_value: u64) -> (u64, u64) {
    if max_value == 0 {
        return (1, 1);
    }
    let raw = max_value.div_ceil(TARGET_TICKS).max(1);
    let mut magnitude = 1u64;
    let step = loop {
        if let Some(s) = [1, 2, 5]
            .iter()
            .map(|m| m * magnitude)
            .find(|s| *s >= raw)
        {
            break s;
        }
        magnitude = magnitude.saturating_mul(10);
    };
    (max_value.div_ceil(step) * step, step)
}

fn scaled_height(value: u64, axis_max: u64) -> u32 {
    if axis_max == 0 {
        return 0;
    }
    ((value.min(axis_max) as u128 * PLOT_HEIGHT as u128) / axis_max as u128) as u32
}

fn shorten_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_string();
    }
    let head: String = label.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{head}...")
}

fn text_width(text: &str) -> u32 {
    let n = text.chars().count() as u32;
    (n * CHAR_ADVANCE).saturating_sub(SCALE)
}

fn put(img: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, color);
    }
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for dy in 0..h {
        for dx in 0..w {
            put(img, x + dx, y + dy, color);
        }
    }
}

fn draw_block(img: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    fill_rect(img, x, y, SCALE, SCALE, color);
}

fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let columns = font::glyph(ch);
        let left = x + i as u32 * CHAR_ADVANCE;
        for gx in 0..GLYPH_WIDTH {
            for gy in 0..GLYPH_HEIGHT {
                if font::pixel(&columns, gx, gy) {
                    draw_block(img, left + gx * SCALE, y + gy * SCALE, color);
                }
            }
        }
    }
}

/// Text rotated 90 degrees clockwise, starting at (x, y) and running downwards.
fn draw_text_down(img: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let columns = font::glyph(ch);
        let top = y + i as u32 * CHAR_ADVANCE;
        for gx in 0..GLYPH_WIDTH {
            for gy in 0..GLYPH_HEIGHT {
                if font::pixel(&columns, gx, gy) {
                    let nx = GLYPH_HEIGHT - 1 - gy;
                    draw_block(img, x + nx * SCALE, top + gx * SCALE, color);
                }
            }
        }
    }
}

/// Text rotated 90 degrees counter-clockwise, ending at `bottom` and running upwards.
fn draw_text_up(img: &mut RgbImage, x: u32, bottom: u32, text: &str, color: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let columns = font::glyph(ch);
        let Some(top) = bottom.checked_sub((i as u32 + 1) * CHAR_ADVANCE) else {
            break;
        };
        for gx in 0..GLYPH_WIDTH {
            for gy in 0..GLYPH_HEIGHT {
                if font::pixel(&columns, gx, gy) {
                    let ny = GLYPH_WIDTH - 1 - gx;
                    draw_block(img, x + gy * SCALE, top + ny * SCALE, color);
                }
            }
        }
    }
}
