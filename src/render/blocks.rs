//! Line-level structure of a prose segment: headings, lists, paragraphs.

use super::inline::{ self, Inline };
use super::RenderBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Numbered,
}

enum Line<'a> {
    Blank,
    Heading(u8, &'a str),
    Item(ListKind, &'a str),
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return Line::Blank;
    }

    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if (1..=6).contains(&hashes) {
        if let Some(rest) = line[hashes..].strip_prefix(' ') {
            return Line::Heading(hashes as u8, rest.trim());
        }
    }

    let indented = line.trim_start();
    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = indented.strip_prefix(bullet) {
            return Line::Item(ListKind::Bullet, rest.trim());
        }
    }
    let digits = indented.bytes().take_while(u8::is_ascii_digit).count();
    if (1..=9).contains(&digits) {
        if let Some(rest) = indented[digits..].strip_prefix(". ") {
            return Line::Item(ListKind::Numbered, rest.trim());
        }
    }

    Line::Text(line)
}

#[derive(Default)]
struct Builder {
    blocks: Vec<RenderBlock>,
    paragraph: Vec<Inline>,
    list: Option<(ListKind, Vec<Vec<Inline>>)>,
}

impl Builder {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            self.blocks.push(RenderBlock::Paragraph(std::mem::take(&mut self.paragraph)));
        }
    }

    fn flush_list(&mut self) {
        if let Some((kind, items)) = self.list.take() {
            self.blocks.push(RenderBlock::List { kind, items });
        }
    }

    fn flush(&mut self) {
        self.flush_paragraph();
        self.flush_list();
    }
}

pub fn parse(prose: &str, out: &mut Vec<RenderBlock>) {
    let mut builder = Builder::default();

    for raw in prose.split('\n') {
        match classify(raw) {
            Line::Blank => builder.flush(),
            Line::Heading(level, text) => {
                builder.flush();
                builder.blocks.push(RenderBlock::Heading {
                    level,
                    content: inline::parse(text),
                });
            }
            Line::Item(kind, text) => {
                builder.flush_paragraph();
                let continues = matches!(&builder.list, Some((current, _)) if *current == kind);
                if !continues {
                    builder.flush_list();
                }
                builder.list
                    .get_or_insert_with(|| (kind, Vec::new()))
                    .1.push(inline::parse(text));
            }
            Line::Text(text) => {
                builder.flush_list();
                if !builder.paragraph.is_empty() {
                    builder.paragraph.push(Inline::LineBreak);
                }
                builder.paragraph.extend(inline::parse(text));
            }
        }
    }
    builder.flush();
    out.append(&mut builder.blocks);
}
