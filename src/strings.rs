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

use std::collections::HashMap;
use std::borrow::Borrow;
use std::io::Write;

use crate::bba::{BbaStruct, BbaWriter};
use crate::error::Result;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct IdString(u32);

impl IdString {
    pub const EMPTY: IdString = IdString(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Interns every name used by the database. Handles are handed out in
/// first-seen order and the empty string is always handle 0.
pub struct StringPool {
    strings: Vec<String>,
    revmap: HashMap<String, IdString>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        let mut revmap = HashMap::new();
        revmap.insert(String::new(), IdString::EMPTY);
        Self { strings: vec![String::new()], revmap }
    }

    /// Get an identifier for a provided string. Creates a new identifier if the
    /// string was not registered. Returns an existing identifier if the string has been
    /// already registered.
    pub fn id<S>(&mut self, s: S) -> IdString where
        S: ToString + Borrow<str>
    {
        if let Some(id) = self.revmap.get(s.borrow()) {
            return *id;
        }

        let id = IdString(self.strings.len() as u32);
        let s = s.to_string();
        self.revmap.insert(s.clone(), id);
        self.strings.push(s);
        id
    }

    /// Looks up a string without registering it.
    pub fn lookup(&self, s: &str) -> Option<IdString> {
        self.revmap.get(s).copied()
    }

    pub fn get(&self, id: IdString) -> &str {
        &self.strings[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        /* The empty string is always present */
        false
    }
}

impl BbaStruct for StringPool {
    fn serialise_lists<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.label(&format!("{}_strs", ctx))?;
        for (idx, s) in self.strings.iter().enumerate() {
            bba.str(s, &format!("id {}", idx))?;
        }
        bba.align()
    }

    fn serialise<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.slice(&format!("{}_strs", ctx), self.strings.len(), "strings")
    }
}
