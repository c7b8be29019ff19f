use std::fs;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::CountError;
use crate::languages::LanguageDescriptor;

/// A NUL byte within this many leading bytes marks a file as binary.
pub const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Line counts for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub language: String,
    pub total: u64,
    pub non_blank: u64,
    /// Only counted in comment mode, otherwise 0.
    pub comment: u64,
    /// Widest line in characters (NFC), excluding the line terminator.
    pub max_width: usize,
}

/// Reads lines as text, converting invalid UTF-8 sequences to replacement
/// characters instead of failing.
struct LossyLineReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: BufRead> LossyLineReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(8 * 1024),
        }
    }
}

impl<R: BufRead> Iterator for LossyLineReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                let text = String::from_utf8_lossy(&self.buffer);
                let line = text.trim_end_matches(['\n', '\r']).to_string();
                Some(Ok(line))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Code,
}

enum Marker {
    Line,
    Block(usize),
}

/// Classifies lines as blank, comment or code in a single pass. Block
/// comment state carries over from one line to the next.
pub struct CommentScanner<'a> {
    language: &'a LanguageDescriptor,
    open_block: Option<usize>,
}

impl<'a> CommentScanner<'a> {
    pub fn new(language: &'a LanguageDescriptor) -> Self {
        CommentScanner {
            language,
            open_block: None,
        }
    }

    pub fn in_block(&self) -> bool {
        self.open_block.is_some()
    }

    /// A line is a comment when all of its non-whitespace text lies inside
    /// comment spans.
    pub fn classify(&mut self, line: &str) -> LineKind {
        let mut rest = line.trim();
        if rest.is_empty() {
            return LineKind::Blank;
        }
        let mut has_code = false;
        let mut has_comment = false;
        loop {
            if let Some(idx) = self.open_block {
                has_comment = true;
                let close = self.language.block_comments[idx].1.as_str();
                match rest.find(close) {
                    Some(end) => {
                        rest = &rest[end + close.len()..];
                        self.open_block = None;
                    }
                    None => break,
                }
            } else {
                match self.next_marker(rest) {
                    None => {
                        has_code |= !rest.trim().is_empty();
                        break;
                    }
                    Some((pos, Marker::Line)) => {
                        has_code |= !rest[..pos].trim().is_empty();
                        has_comment = true;
                        break;
                    }
                    Some((pos, Marker::Block(idx))) => {
                        has_code |= !rest[..pos].trim().is_empty();
                        has_comment = true;
                        let open = self.language.block_comments[idx].0.as_str();
                        rest = &rest[pos + open.len()..];
                        self.open_block = Some(idx);
                    }
                }
            }
        }
        if has_code || !has_comment {
            LineKind::Code
        } else {
            LineKind::Comment
        }
    }

    /// Earliest comment opener in `s`; on a tie the longer marker wins so
    /// that `#[` beats `#`.
    fn next_marker(&self, s: &str) -> Option<(usize, Marker)> {
        let mut best: Option<(usize, usize, Marker)> = None;
        let candidates = self
            .language
            .line_comments
            .iter()
            .map(|m| (m.as_str(), Marker::Line))
            .chain(
                self.language
                    .block_comments
                    .iter()
                    .enumerate()
                    .map(|(idx, (open, _))| (open.as_str(), Marker::Block(idx))),
            );
        for (marker, kind) in candidates {
            if marker.is_empty() {
                continue;
            }
            if let Some(pos) = s.find(marker) {
                let better = match &best {
                    None => true,
                    Some((best_pos, best_len, _)) => {
                        pos < *best_pos || (pos == *best_pos && marker.len() > *best_len)
                    }
                };
                if better {
                    best = Some((pos, marker.len(), kind));
                }
            }
        }
        best.map(|(pos, _, kind)| (pos, kind))
    }
}

/// Counts the lines of one file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCounter {
    comments: bool,
}

impl FileCounter {
    pub fn new(comments: bool) -> Self {
        FileCounter { comments }
    }

    pub fn count(
        &self,
        path: &Path,
        language: &LanguageDescriptor,
    ) -> Result<FileRecord, CountError> {
        let file = fs::File::open(path)?;
        self.count_reader(path, file, language)
    }

    pub fn count_reader<R: Read>(
        &self,
        path: &Path,
        mut reader: R,
        language: &LanguageDescriptor,
    ) -> Result<FileRecord, CountError> {
        let mut head = Vec::with_capacity(BINARY_SNIFF_LEN);
        reader
            .by_ref()
            .take(BINARY_SNIFF_LEN as u64)
            .read_to_end(&mut head)?;
        if head.contains(&0) {
            return Err(CountError::Binary);
        }

        let mut record = FileRecord {
            path: path.to_path_buf(),
            language: language.name.clone(),
            total: 0,
            non_blank: 0,
            comment: 0,
            max_width: 0,
        };
        let mut scanner = (self.comments && language.has_comment_syntax())
            .then(|| CommentScanner::new(language));
        let lines = LossyLineReader::new(BufReader::new(Cursor::new(head).chain(reader)));
        for line_result in lines {
            let line = line_result?;
            record.total += 1;
            record.max_width = record.max_width.max(line.nfc().count());
            let kind = match scanner.as_mut() {
                Some(scanner) => scanner.classify(&line),
                None if line.trim().is_empty() => LineKind::Blank,
                None => LineKind::Code,
            };
            match kind {
                LineKind::Blank => {}
                LineKind::Comment => {
                    record.non_blank += 1;
                    record.comment += 1;
                }
                LineKind::Code => record.non_blank += 1,
            }
        }
        if scanner.is_some_and(|scanner| scanner.in_block()) {
            debug!("{}: block comment still open at end of file", path.display());
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;
    use tempfile::TempDir;

    fn lang(name: &str) -> LanguageDescriptor {
        LanguageRegistry::builtin()
            .lookup(name)
            .cloned()
            .expect("builtin language")
    }

    fn count_str(content: &str, language: &str, comments: bool) -> FileRecord {
        FileCounter::new(comments)
            .count_reader(Path::new("mem"), content.as_bytes(), &lang(language))
            .expect("in-memory count succeeds")
    }

    fn kinds(language: &str, text: &str) -> Vec<LineKind> {
        let descriptor = lang(language);
        let mut scanner = CommentScanner::new(&descriptor);
        text.lines().map(|line| scanner.classify(line)).collect()
    }

    #[test]
    fn test_empty_file() {
        let record = count_str("", "py", false);
        assert_eq!((record.total, record.non_blank, record.max_width), (0, 0, 0));
        assert_eq!(record.language, "Python");
    }

    #[test]
    fn test_whitespace_only_lines() {
        let record = count_str("   \n\t\n\n  \t \n", "py", false);
        assert_eq!(record.total, 4);
        assert_eq!(record.non_blank, 0);
        assert_eq!(record.max_width, 4);
    }

    #[test]
    fn test_blank_and_non_blank_counts() {
        let content = "import os\n\nx = 1\ny = 2\n\nz = 3\na = 4\nb = 5\nc = 6\nd = 7\n";
        let record = count_str(content, "py", false);
        assert_eq!(record.total, 10);
        assert_eq!(record.non_blank, 8);
    }

    #[test]
    fn test_unterminated_final_line_counts() {
        let record = count_str("a();\nb();", "js", false);
        assert_eq!(record.total, 2);
        assert_eq!(record.non_blank, 2);
    }

    #[test]
    fn test_crlf_terminators_do_not_add_width() {
        let record = count_str("abc\r\nde\r\n", "c", false);
        assert_eq!(record.total, 2);
        assert_eq!(record.max_width, 3);
    }

    #[test]
    fn test_max_width_counts_characters_after_nfc() {
        // "e" followed by a combining acute accent composes to one character.
        let record = count_str("caf\u{0065}\u{0301}\n", "py", false);
        assert_eq!(record.max_width, 4);
        let record = count_str("λλλλλ\n", "py", false);
        assert_eq!(record.max_width, 5);
        let record = count_str(&format!("{}\n", "x".repeat(120)), "py", false);
        assert_eq!(record.max_width, 120);
    }

    #[test]
    fn test_invalid_utf8_is_counted_lossily() {
        let bytes: &[u8] = b"ok\n\xff\xfe text\n";
        let record = FileCounter::new(false)
            .count_reader(Path::new("mem"), bytes, &lang("c"))
            .expect("lossy decode");
        assert_eq!(record.total, 2);
        assert_eq!(record.non_blank, 2);
    }

    #[test]
    fn test_nul_byte_means_binary() {
        let bytes: &[u8] = b"\x7fELF\x00\x01\x02\n";
        let result = FileCounter::new(false).count_reader(Path::new("mem"), bytes, &lang("c"));
        assert!(matches!(result, Err(CountError::Binary)), "result: {result:?}");
    }

    #[test]
    fn test_nul_beyond_sniff_window_is_text() {
        let mut bytes = "x\n".repeat(BINARY_SNIFF_LEN).into_bytes();
        bytes.push(0);
        let record = FileCounter::new(false)
            .count_reader(Path::new("mem"), bytes.as_slice(), &lang("c"))
            .expect("only the head is sniffed");
        assert_eq!(record.total, BINARY_SNIFF_LEN as u64 + 1);
    }

    #[test]
    fn test_count_missing_file_is_read_error() {
        let temp_dir = TempDir::new().expect("temp dir");
        let result = FileCounter::new(false).count(&temp_dir.path().join("gone.rs"), &lang("rs"));
        assert!(matches!(result, Err(CountError::Read(_))), "result: {result:?}");
    }

    #[test]
    fn test_count_file_on_disk() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("main.rs");
        fs::write(&path, "fn main() {\n\n    // hi\n}\n")?;
        let record = FileCounter::new(true)
            .count(&path, &lang("rs"))
            .map_err(|err| io::Error::other(err.to_string()))?;
        assert_eq!(record.path, path);
        assert_eq!((record.total, record.non_blank, record.comment), (4, 3, 1));
        Ok(())
    }

    #[test]
    fn test_comment_mode_off_reports_zero_comments() {
        let record = count_str("// one\n// two\ncode();\n", "c", false);
        assert_eq!(record.comment, 0);
        assert_eq!(record.non_blank, 3);
    }

    #[test]
    fn test_c_style_block_spans_lines() {
        let text = "int a;\n/* start\n   middle\n   end */\nint b; /* trailing */\n/* one */ int c;\n  // note\n";
        assert_eq!(
            kinds("c", text),
            vec![
                LineKind::Code,
                LineKind::Comment,
                LineKind::Comment,
                LineKind::Comment,
                LineKind::Code,
                LineKind::Code,
                LineKind::Comment,
            ]
        );
    }

    #[test]
    fn test_block_close_followed_by_code() {
        let text = "/* a\n b */ x = 1;\n";
        assert_eq!(kinds("c", text), vec![LineKind::Comment, LineKind::Code]);
    }

    #[test]
    fn test_line_marker_inside_block_is_ignored() {
        let descriptor = lang("rs");
        let mut scanner = CommentScanner::new(&descriptor);
        assert_eq!(scanner.classify("/* // not a line comment"), LineKind::Comment);
        assert!(scanner.in_block());
        assert_eq!(scanner.classify("still */"), LineKind::Comment);
        assert!(!scanner.in_block());
        assert_eq!(scanner.classify("let x = 1;"), LineKind::Code);
    }

    #[test]
    fn test_python_docstrings_and_hashes() {
        let text = "\"\"\"Module doc.\n\nMore.\n\"\"\"\nimport os  # trailing\n# full\n'''one'''\n";
        assert_eq!(
            kinds("py", text),
            vec![
                LineKind::Comment,
                LineKind::Blank,
                LineKind::Comment,
                LineKind::Comment,
                LineKind::Code,
                LineKind::Comment,
                LineKind::Comment,
            ]
        );
    }

    #[test]
    fn test_longer_marker_wins_at_same_position() {
        let text = "#[ block\nstill ]#\n# line\necho 1\n";
        assert_eq!(
            kinds("nim", text),
            vec![
                LineKind::Comment,
                LineKind::Comment,
                LineKind::Comment,
                LineKind::Code,
            ]
        );
    }

    #[test]
    fn test_language_without_comment_syntax_is_all_code() {
        let descriptor = LanguageDescriptor::new("sql", "SQL", &["sql"]);
        assert!(!descriptor.has_comment_syntax());
        let record = FileCounter::new(true)
            .count_reader(Path::new("mem"), "-- c\nselect 1;\n\n".as_bytes(), &descriptor)
            .expect("count");
        assert_eq!((record.total, record.non_blank, record.comment), (3, 2, 0));
    }
}
