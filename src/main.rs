use itertools::Itertools;
use lazy_static::lazy_static;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontStyle, FontTransform, register_font};
use regex::Regex;
use reqwest::blocking::Client;
use std::{collections::HashMap, error::Error, fs, time::Duration};

const INPUT_PATH: &str = "dict.cc.tsv";
const OUTPUT_PATH: &str = "first letter.png";

// column order in the dict.cc export
const SOURCE_LANG: &str = "German";
const TARGET_LANG: &str = "English";
const TITLE: &str = "The First Letter Of English And German Words";

const FONT_FAMILY: &str = "Lexend";
const FONT_URL: &str = "https://github.com/googlefonts/lexend/blob/main/fonts/lexend/variable/Lexend%5BHEXP%2Cwght%5D.ttf?raw=true";

// dict.cc wraps annotations in any of these four bracket styles
const BRACKET_PAIRS: [(char, char); 4] = [('(', ')'), ('[', ']'), ('{', '}'), ('<', '>')];

const IMAGE_SIZE: u32 = 3000;
const BACKGROUND: RGBColor = RGBColor(13, 13, 13);
const FOREGROUND: RGBColor = RGBColor(234, 234, 234);

// magma anchors borrowed from matplotlib, sampled every 0.25
const MAGMA: [(u8, u8, u8); 5] = [
    (0, 0, 4),
    (81, 18, 124),
    (183, 55, 121),
    (252, 137, 97),
    (252, 253, 191),
];

lazy_static! {
    // one lowercase ascii letter, then word characters, nothing else
    static ref VALID: Regex = Regex::new(r"^[a-z]\w*$").unwrap();
}

fn main() -> Result<(), ()> {
    let text = unescape_entities(&fs::read_to_string(INPUT_PATH).unwrap());
    let rows = tabular_rows(&text);
    println!("parsed \x1b[92m{}\x1b[m rows from {INPUT_PATH}", rows.len());

    let pairs = clean_rows(rows);
    println!("kept \x1b[92m{}\x1b[m word pairs after cleaning", pairs.len());

    let table = crosstab(&pairs);
    println!(
        "first letters span a \x1b[92m{}x{}\x1b[m grid, {} pairs counted",
        table.rows.len(),
        table.cols.len(),
        table.total()
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap();
    let font = client.get(FONT_URL).send().unwrap();
    if !font.status().is_success() {
        println!(
            "\x1b[91mcouldn't fetch {FONT_FAMILY} :< status code {}\x1b[m",
            font.status()
        );
        return Err(());
    }
    let bytes: &'static [u8] = Box::leak(font.bytes().unwrap().to_vec().into_boxed_slice());
    if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_err() {
        println!("\x1b[91m{FONT_FAMILY} came back unparseable\x1b[m");
        return Err(());
    }

    if let Err(e) = render_heatmap(&table) {
        println!("\x1b[91mrendering failed: {e}\x1b[m");
        return Err(());
    }
    println!("wrote \x1b[92m{OUTPUT_PATH}\x1b[m");
    Ok(())
}

/// Decode the HTML entities that show up in dict.cc exports. Named entities
/// outside the usual six, and anything unterminated, pass through literally.
fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        match decode_entity(&tail[1..end]) {
            Some(ch) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse))?
                .ok()?;
            char::from_u32(code)
        }
    }
}

/// Comment and blank lines never reach the parser; everything else is split
/// on tabs and the first two fields become a (source, target) row. Rows with
/// fewer than two fields or an empty field are dropped.
fn tabular_rows(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split('\t').next_tuple::<(&str, &str)>())
        .filter(|(src, tgt)| !src.is_empty() && !tgt.is_empty())
        .map(|(src, tgt)| (src.to_string(), tgt.to_string()))
        .collect_vec()
}

/// Strip bracketed spans, one bracket type at a time in the order of
/// `BRACKET_PAIRS`. Depth saturates at zero, so a stray closer vanishes
/// without effect; a stray opener swallows the rest of the field.
fn remove_brackets(text: &str) -> String {
    let mut text = text.to_string();
    for &(open, close) in &BRACKET_PAIRS {
        let mut depth = 0u32;
        let mut kept = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth = depth.saturating_sub(1);
            } else if depth == 0 {
                kept.push(ch);
            }
        }
        text = kept;
    }
    text
}

/// Truncate at the first `/`, dropping alternate-form suffixes.
fn collapse(text: &str) -> String {
    match text.find('/') {
        Some(idx) => text[..idx].trim().to_string(),
        None => text.to_string(),
    }
}

fn normalize(text: &str) -> String {
    let text = remove_brackets(text);
    let text = collapse(&text);
    text.trim().to_lowercase()
}

fn is_valid(text: &str) -> bool {
    VALID.is_match(text)
}

fn clean_rows(rows: Vec<(String, String)>) -> Vec<(String, String)> {
    rows.into_iter()
        .map(|(src, tgt)| (normalize(&src), normalize(&tgt)))
        .filter(|(src, tgt)| is_valid(src) && is_valid(tgt))
        .unique()
        .collect_vec()
}

/// Count (source first letter, target first letter) pairs. Axes are the
/// sorted distinct first letters seen on each side; anything not in the map
/// reads as zero.
fn crosstab(pairs: &[(String, String)]) -> Crosstab {
    let mut counts = HashMap::new();
    for (src, tgt) in pairs {
        let key = (src.chars().next().unwrap(), tgt.chars().next().unwrap());
        *counts.entry(key).or_insert(0u32) += 1;
    }
    let rows = counts.keys().map(|&(r, _)| r).sorted().dedup().collect_vec();
    let cols = counts.keys().map(|&(_, c)| c).sorted().dedup().collect_vec();
    Crosstab { rows, cols, counts }
}

fn magma(t: f64) -> RGBColor {
    let scaled = t.clamp(0.0, 1.0) * (MAGMA.len() - 1) as f64;
    let idx = (scaled as usize).min(MAGMA.len() - 2);
    let frac = scaled - idx as f64;
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;
    let (r0, g0, b0) = MAGMA[idx];
    let (r1, g1, b1) = MAGMA[idx + 1];
    RGBColor(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}

/// Cells on a square bitmap, the plot area spanning the middle 70% in both
/// directions. Rows run top to bottom in sorted order, row tick letters are
/// rotated a quarter turn like the axis title next to them.
fn render_heatmap(table: &Crosstab) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(OUTPUT_PATH, (IMAGE_SIZE, IMAGE_SIZE)).into_drawing_area();
    root.fill(&BACKGROUND)?;

    let size = IMAGE_SIZE as i32;
    let (left, top) = (size * 15 / 100, size * 15 / 100);
    let span = size * 70 / 100;
    let nrows = table.rows.len() as i32;
    let ncols = table.cols.len() as i32;
    let max = f64::from(table.max_count().max(1));

    for (i, &row) in table.rows.iter().enumerate() {
        for (j, &col) in table.cols.iter().enumerate() {
            let (i, j) = (i as i32, j as i32);
            let cell = [
                (left + span * j / ncols, top + span * i / nrows),
                (left + span * (j + 1) / ncols, top + span * (i + 1) / nrows),
            ];
            let shade = magma(f64::from(table.count(row, col)) / max);
            root.draw(&Rectangle::new(cell, shade.filled()))?;
        }
    }

    let centered = Pos::new(HPos::Center, VPos::Center);
    let ticks = (FONT_FAMILY, 83).into_font().color(&FOREGROUND).pos(centered);
    let ticks_rot = (FONT_FAMILY, 83)
        .into_font()
        .transform(FontTransform::Rotate270)
        .color(&FOREGROUND)
        .pos(centered);
    for (j, col) in table.cols.iter().enumerate() {
        let x = left + span * (2 * j as i32 + 1) / (2 * ncols);
        root.draw(&Text::new(col.to_string(), (x, top + span + 70), ticks.clone()))?;
    }
    for (i, row) in table.rows.iter().enumerate() {
        let y = top + span * (2 * i as i32 + 1) / (2 * nrows);
        root.draw(&Text::new(row.to_string(), (left - 70, y), ticks_rot.clone()))?;
    }

    let titles = (FONT_FAMILY, 125).into_font().color(&FOREGROUND).pos(centered);
    let titles_rot = (FONT_FAMILY, 125)
        .into_font()
        .transform(FontTransform::Rotate270)
        .color(&FOREGROUND)
        .pos(centered);
    root.draw(&Text::new(
        TARGET_LANG,
        (left + span / 2, top + span + 250),
        titles.clone(),
    ))?;
    root.draw(&Text::new(SOURCE_LANG, (left - 250, top + span / 2), titles_rot))?;
    root.draw(&Text::new(TITLE, (size / 2, top / 2), titles))?;

    root.present()?;
    Ok(())
}

/// The only state that survives to the rendering stage.
struct Crosstab {
    rows: Vec<char>,
    cols: Vec<char>,
    counts: HashMap<(char, char), u32>,
}

impl Crosstab {
    fn count(&self, row: char, col: char) -> u32 {
        self.counts.get(&(row, col)).copied().unwrap_or(0)
    }

    fn max_count(&self) -> u32 {
        self.counts.values().copied().max().unwrap_or(0)
    }

    fn total(&self) -> u32 {
        self.counts.values().sum()
    }
}
