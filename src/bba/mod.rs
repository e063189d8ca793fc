/* Copyright (C) 2022 Antmicro
 * 
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 * 
 *     https://www.apache.org/licenses/LICENSE-2.0
 * 
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Symbolic writer for the BBA ("binary blob assembler") stream.
//!
//! Nothing here computes addresses. Every primitive is written as one text
//! line and `bbasm` resolves labels and references into the final blob.


use std::collections::HashSet;
use std::io::Write;

use crate::error::{ChipDbError, Result};

/* Every command is one line, and `str` payloads are delimited by `|` */
fn check_line(what: &'static str, s: &str) -> Result<()> {
    if s.contains(['\n', '\r']) {
        return Err(ChipDbError::InvalidToken { what, text: s.to_string() });
    }
    Ok(())
}

fn check_symbol(what: &'static str, s: &str) -> Result<()> {
    if s.is_empty() || s.contains(char::is_whitespace) {
        return Err(ChipDbError::InvalidToken { what, text: s.to_string() });
    }
    Ok(())
}

/// Writes BBA commands into a single output sink.
///
/// Symbols (scope names, labels) must be single non-empty words and no
/// argument may span lines, so the scope and label bookkeeping always
/// describes the stream that was actually written.
pub struct BbaWriter<W> where W: Write {
    out: W,
    depth: usize,
    labels: HashSet<String>,
    refs: HashSet<String>,
}

impl<W> BbaWriter<W> where W: Write {
    pub fn new(out: W) -> Self {
        Self {
            out,
            depth: 0,
            labels: HashSet::new(),
            refs: HashSet::new(),
        }
    }

    pub fn pre(&mut self, s: &str) -> Result<()> {
        check_line("pre", s)?;
        writeln!(self.out, "pre {}", s)?;
        Ok(())
    }

    pub fn post(&mut self, s: &str) -> Result<()> {
        check_line("post", s)?;
        writeln!(self.out, "post {}", s)?;
        Ok(())
    }

    pub fn push(&mut self, s: &str) -> Result<()> {
        check_symbol("scope", s)?;
        writeln!(self.out, "push {}", s)?;
        self.depth += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(ChipDbError::UnbalancedScope);
        }
        writeln!(self.out, "pop")?;
        self.depth -= 1;
        Ok(())
    }

    pub fn offset32(&mut self) -> Result<()> {
        writeln!(self.out, "offset32")?;
        Ok(())
    }

    pub fn reference(&mut self, label: &str, comment: &str) -> Result<()> {
        check_symbol("label", label)?;
        check_line("comment", comment)?;
        writeln!(self.out, "ref {} {}", label, comment)?;
        self.refs.insert(label.to_string());
        Ok(())
    }

    /// A reference to a list followed by its element count. Both halves go to
    /// the same sink.
    pub fn slice(&mut self, label: &str, size: usize, comment: &str) -> Result<()> {
        let size = u32::try_from(size)
            .map_err(|_| ChipDbError::IndexOverflow("slice size", size))?;
        self.reference(label, comment)?;
        self.u32(size, "")
    }

    pub fn str(&mut self, s: &str, comment: &str) -> Result<()> {
        check_line("string", s)?;
        if s.contains('|') {
            return Err(ChipDbError::InvalidToken { what: "string", text: s.to_string() });
        }
        check_line("comment", comment)?;
        writeln!(self.out, "str |{}| {}", s, comment)?;
        Ok(())
    }

    pub fn align(&mut self) -> Result<()> {
        writeln!(self.out, "align")?;
        Ok(())
    }

    pub fn label(&mut self, s: &str) -> Result<()> {
        check_symbol("label", s)?;
        if !self.labels.insert(s.to_string()) {
            return Err(ChipDbError::DuplicateLabel(s.to_string()));
        }
        writeln!(self.out, "label {}", s)?;
        Ok(())
    }

    pub fn u8(&mut self, n: u8, comment: &str) -> Result<()> {
        check_line("comment", comment)?;
        writeln!(self.out, "u8 {} {}", n, comment)?;
        Ok(())
    }

    pub fn u16(&mut self, n: u16, comment: &str) -> Result<()> {
        check_line("comment", comment)?;
        writeln!(self.out, "u16 {} {}", n, comment)?;
        Ok(())
    }

    pub fn u32(&mut self, n: u32, comment: &str) -> Result<()> {
        check_line("comment", comment)?;
        writeln!(self.out, "u32 {} {}", n, comment)?;
        Ok(())
    }

    /// Signed values are written as their two's complement bit pattern.
    pub fn i16(&mut self, n: i16, comment: &str) -> Result<()> {
        self.u16(n as u16, comment)
    }

    pub fn i32(&mut self, n: i32, comment: &str) -> Result<()> {
        self.u32(n as u32, comment)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Checks that the stream is complete (every scope closed, every reference
    /// resolvable) and hands back the sink.
    pub fn finish(mut self) -> Result<W> {
        if self.depth != 0 {
            return Err(ChipDbError::UnbalancedScope);
        }
        let mut missing: Vec<_> = self.refs.difference(&self.labels).collect();
        missing.sort();
        if let Some(label) = missing.first() {
            return Err(ChipDbError::UndeclaredLabel(label.to_string()));
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Something that can be laid out in the chip database.
///
/// Serialisation happens in two passes: `serialise_lists` emits the
/// variable-length children under their own labels, then `serialise` emits
/// the fixed-size record which refers back to those labels. `ctx` is the
/// label prefix of the owning object and keeps labels unique.
pub trait BbaStruct {
    fn serialise_lists<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()>;
    fn serialise<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()>;
}

/// Emits the children of every item, then a labelled table of the records.
pub fn serialise_table<'a, W, T, I>(
    label: &str,
    items: I,
    bba: &mut BbaWriter<W>
) -> Result<usize> where
    W: Write,
    T: BbaStruct + 'a,
    I: IntoIterator<Item = &'a T>,
    I::IntoIter: Clone,
{
    let items = items.into_iter();
    for (idx, item) in items.clone().enumerate() {
        item.serialise_lists(&format!("{}{}", label, idx), bba)?;
    }
    bba.label(label)?;
    let mut count = 0;
    for (idx, item) in items.enumerate() {
        item.serialise(&format!("{}{}", label, idx), bba)?;
        count += 1;
    }
    Ok(count)
}
