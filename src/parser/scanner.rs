//! Depth-tracked scanner over one raw sensor message
//!
//! The server speaks s-expressions: `(tag value ... (child ...) ...)`. Instead of
//! building a tree, the scanner walks the bytes once and keeps a signed depth
//! counter:
//!
//! ```text
//! (GS (unum 1) (team left))
//! ^   ^      ^ ^         ^^
//! 1   2      1 2         10    depth after each paren
//! ```
//!
//! `(` raises the depth once the tag name behind it is consumed, `)` lowers it
//! where it occurs. [`ParseSession::next_tag`] also reports the smallest depth seen
//! while searching, which tells a caller whether the tag it found still belongs to
//! the element it is iterating.

use std::borrow::Cow;

/// Minimum depth reported when the buffer is exhausted; below any entry depth
pub const END_OF_MESSAGE: i32 = i32::MIN;

/// Result of a tag search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    pub name: Option<&'a [u8]>,
    pub min_depth: i32,
}

/// Cursor and depth for a single message, constructed fresh per message
#[derive(Debug)]
pub struct ParseSession<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: i32,
}

#[inline]
fn is_delimiter(b: u8) -> bool {
    matches!(b, b' ' | b')' | b'(')
}

impl<'a> ParseSession<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, depth: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn raw(&self) -> &'a [u8] {
        self.buf
    }

    /// Advance to the next tag name, tracking depth.
    pub fn next_tag(&mut self) -> Tag<'a> {
        let mut min_depth = self.depth;
        while let Some(&b) = self.buf.get(self.pos) {
            match b {
                b')' => {
                    self.depth -= 1;
                    min_depth = min_depth.min(self.depth);
                    self.pos += 1;
                }
                b'(' => {
                    self.pos += 1;
                    let start = self.pos;
                    while self.pos < self.buf.len() && !is_delimiter(self.buf[self.pos]) {
                        self.pos += 1;
                    }
                    self.depth += 1;
                    return Tag {
                        name: Some(&self.buf[start..self.pos]),
                        min_depth,
                    };
                }
                _ => self.pos += 1,
            }
        }
        Tag {
            name: None,
            min_depth: END_OF_MESSAGE,
        }
    }

    /// Next direct child of the element opened at `entry_depth`.
    ///
    /// Grandchildren the caller did not descend into are skipped. When the element
    /// has closed, the cursor is rewound so the enclosing loop sees the tag that
    /// follows.
    pub fn next_child(&mut self, entry_depth: i32) -> Option<&'a [u8]> {
        loop {
            let saved = (self.pos, self.depth);
            let tag = self.next_tag();
            let name = tag.name?;
            if tag.min_depth < entry_depth {
                (self.pos, self.depth) = saved;
                return None;
            }
            if self.depth == entry_depth + 1 {
                return Some(name);
            }
        }
    }

    /// Skip whatever remains of the element opened at `entry_depth`
    pub fn skip_element(&mut self, entry_depth: i32) {
        while self.next_child(entry_depth).is_some() {}
    }

    fn skip_spaces(&mut self) {
        while self.buf.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
    }

    /// Raw bytes up to the next space or parenthesis
    pub fn read_token(&mut self) -> &'a [u8] {
        self.skip_spaces();
        let start = self.pos;
        while self.pos < self.buf.len() && !is_delimiter(self.buf[self.pos]) {
            self.pos += 1;
        }
        &self.buf[start..self.pos]
    }

    pub fn read_string(&mut self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.read_token())
    }

    /// Float token; the literal `nan` yields NaN, anything unparsable `None`
    pub fn read_float(&mut self) -> Option<f32> {
        let token = self.read_token();
        if token == b"nan" {
            return Some(f32::NAN);
        }
        std::str::from_utf8(token).ok()?.parse().ok()
    }

    pub fn read_int(&mut self) -> Option<i64> {
        std::str::from_utf8(self.read_token()).ok()?.parse().ok()
    }

    /// Three consecutive floats
    pub fn read_vec3(&mut self) -> Option<[f32; 3]> {
        Some([self.read_float()?, self.read_float()?, self.read_float()?])
    }
}
