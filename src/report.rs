use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use colored::*;

use crate::config::Configuration;
use crate::counter::FileRecord;

const DEFAULT_DISPLAY_WIDTH: usize = 80;
const NUM_WIDTH: usize = 10;
const MIN_PATH_WIDTH: usize = 20;
const ELLIPSIS: char = '…';

/// Per-language totals. The grand total uses the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageTotal {
    pub language: String,
    pub files: u64,
    pub total: u64,
    pub non_blank: u64,
    pub comment: u64,
    pub over_width: u64,
}

impl LanguageTotal {
    fn new(language: &str) -> Self {
        LanguageTotal {
            language: language.to_string(),
            ..LanguageTotal::default()
        }
    }

    fn add_record(&mut self, record: &FileRecord, max_width: usize) {
        self.files += 1;
        self.total += record.total;
        self.non_blank += record.non_blank;
        self.comment += record.comment;
        if is_over_width(record, max_width) {
            self.over_width += 1;
        }
    }

    fn add_total(&mut self, other: &LanguageTotal) {
        self.files += other.files;
        self.total += other.total;
        self.non_blank += other.non_blank;
        self.comment += other.comment;
        self.over_width += other.over_width;
    }
}

/// The files of one language, in listing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub language: String,
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub rows: Vec<LanguageTotal>,
    pub grand_total: LanguageTotal,
    /// Present in detailed mode, in the same order as `rows`.
    pub files: Option<Vec<FileGroup>>,
    pub skipped: usize,
    pub max_width: usize,
    pub comments: bool,
}

/// Where and how wide the report is drawn.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub width: usize,
    /// Detailed paths are shown relative to this directory when possible.
    pub current_dir: PathBuf,
}

impl RenderOptions {
    /// Terminal width of stdout, or 80 columns when stdout is not a terminal.
    pub fn detect(current_dir: PathBuf) -> Self {
        let width = terminal_size::terminal_size()
            .map(|(terminal_size::Width(w), _)| w as usize)
            .filter(|&w| w > 0)
            .unwrap_or(DEFAULT_DISPLAY_WIDTH);
        RenderOptions { width, current_dir }
    }
}

/// Case-insensitive name order; names equal but for case fall back to
/// byte order so the result stays total.
fn name_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn path_order(a: &Path, b: &Path) -> Ordering {
    name_order(&a.to_string_lossy(), &b.to_string_lossy()).then_with(|| a.cmp(b))
}

fn is_over_width(record: &FileRecord, max_width: usize) -> bool {
    max_width > 0 && record.max_width > max_width
}

pub fn aggregate(records: Vec<FileRecord>, skipped: usize, config: &Configuration) -> Report {
    let mut by_language: BTreeMap<String, (LanguageTotal, Vec<FileRecord>)> = BTreeMap::new();
    for record in records {
        let (total, files) = by_language
            .entry(record.language.clone())
            .or_insert_with(|| (LanguageTotal::new(&record.language), Vec::new()));
        total.add_record(&record, config.max_width);
        if !config.summary {
            files.push(record);
        }
    }

    let mut groups: Vec<(LanguageTotal, Vec<FileRecord>)> = by_language.into_values().collect();
    if config.sort_by_lines {
        groups.sort_by(|(a, _), (b, _)| {
            b.total
                .cmp(&a.total)
                .then_with(|| name_order(&a.language, &b.language))
        });
    } else {
        groups.sort_by(|(a, _), (b, _)| name_order(&a.language, &b.language));
    }

    let mut grand_total = LanguageTotal::new("Total");
    for (row, files) in groups.iter_mut() {
        grand_total.add_total(row);
        if config.sort_by_lines {
            files.sort_by(|a, b| {
                b.total
                    .cmp(&a.total)
                    .then_with(|| path_order(&a.path, &b.path))
            });
        } else {
            files.sort_by(|a, b| path_order(&a.path, &b.path));
        }
    }

    let (rows, file_groups): (Vec<LanguageTotal>, Vec<FileGroup>) = groups
        .into_iter()
        .map(|(row, files)| {
            let group = FileGroup {
                language: row.language.clone(),
                files,
            };
            (row, group)
        })
        .unzip();

    Report {
        rows,
        grand_total,
        files: if config.summary { None } else { Some(file_groups) },
        skipped,
        max_width: config.max_width,
        comments: config.comments,
    }
}

impl Report {
    pub fn render(&self, options: &RenderOptions) -> String {
        let mut output = String::new();
        if let Some(groups) = &self.files {
            for group in groups {
                self.render_group(&mut output, group, options);
            }
        }
        self.render_summary(&mut output);
        if self.skipped > 0 {
            let noun = if self.skipped == 1 { "entry" } else { "entries" };
            let _ = writeln!(output, "\n{} {} {}", "Skipped".yellow(), self.skipped, noun);
        }
        output
    }

    fn number_columns(&self) -> usize {
        2 + usize::from(self.comments)
    }

    fn render_group(&self, output: &mut String, group: &FileGroup, options: &RenderOptions) {
        let path_width = options
            .width
            .saturating_sub(2 + (NUM_WIDTH + 1) * self.number_columns() + 2)
            .max(MIN_PATH_WIDTH);
        let band = format!("{:<width$}", group.language, width = path_width + 2);
        let _ = writeln!(output, "{}", band.bright_cyan().bold().reversed());

        let mut subtotal = LanguageTotal::new(&group.language);
        for record in &group.files {
            subtotal.add_record(record, self.max_width);
            let shown = elide(&display_path(&record.path, &options.current_dir), path_width);
            let flag = if is_over_width(record, self.max_width) { " *" } else { "" };
            let _ = writeln!(
                output,
                "  {:<path_width$} {}{}",
                shown,
                self.numbers(record.total, record.non_blank, record.comment),
                flag
            );
        }
        let label = format!("{} files", subtotal.files);
        let _ = writeln!(
            output,
            "  {:<path_width$} {}\n",
            label,
            self.numbers(subtotal.total, subtotal.non_blank, subtotal.comment)
        );
    }

    fn numbers(&self, total: u64, non_blank: u64, comment: u64) -> String {
        let mut text = format!("{total:>NUM_WIDTH$} {non_blank:>NUM_WIDTH$}");
        if self.comments {
            let _ = write!(text, " {comment:>NUM_WIDTH$}");
        }
        text
    }

    fn render_summary(&self, output: &mut String) {
        let name_width = self
            .rows
            .iter()
            .map(|row| row.language.chars().count())
            .chain(std::iter::once("Language".len()))
            .max()
            .unwrap_or(0);

        let mut header = format!(
            "{:<name_width$} {:>8} {:>NUM_WIDTH$} {:>NUM_WIDTH$}",
            "Language", "Files", "Lines", "Non-blank"
        );
        if self.comments {
            let _ = write!(header, " {:>NUM_WIDTH$}", "Comments");
        }
        if self.max_width > 0 {
            let _ = write!(header, " {:>8}", "Wide");
        }
        let rule = "-".repeat(header.chars().count());
        let _ = writeln!(output, "{}", header.blue().bold());
        let _ = writeln!(output, "{rule}");
        for row in &self.rows {
            let _ = writeln!(output, "{}", self.summary_line(row, name_width));
        }
        let _ = writeln!(output, "{rule}");
        let _ = writeln!(
            output,
            "{}",
            self.summary_line(&self.grand_total, name_width).bold()
        );
    }

    fn summary_line(&self, row: &LanguageTotal, name_width: usize) -> String {
        let mut line = format!(
            "{:<name_width$} {:>8} {}",
            row.language,
            row.files,
            self.numbers(row.total, row.non_blank, row.comment)
        );
        if self.max_width > 0 {
            let _ = write!(line, " {:>8}", row.over_width);
        }
        line
    }
}

fn display_path(path: &Path, current_dir: &Path) -> String {
    match path.strip_prefix(current_dir) {
        Ok(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
        _ => path.to_string_lossy().into_owned(),
    }
}

/// Shorten `text` to at most `max` characters by replacing its middle with
/// an ellipsis.
pub fn elide(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let keep = max - 1;
    let head = keep / 2;
    let tail = keep - head;
    let mut result: String = text.chars().take(head).collect();
    result.push(ELLIPSIS);
    result.extend(text.chars().skip(count - tail));
    result
}
