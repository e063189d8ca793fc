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

use std::path::PathBuf;
use std::fs::File;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use serde::Serialize;

use crate::chip::Chip;
use crate::error::Result;

#[derive(Default)]
struct ExportChecker {
    export: HashSet<String>,
    export_all: bool,
}

impl ExportChecker {
    fn new(arg_list: &Option<Vec<String>>) -> Self {
        let mut checker = Self::default();
        if let Some(args) = arg_list {
            for arg in args {
                if arg == ":all" {
                    checker.export_all = true;
                } else {
                    checker.export.insert(arg.clone());
                }
            }
        }
        checker
    }

    fn should_export(&self, name: &str) -> bool {
        self.export_all || self.export.contains(name)
    }
}

pub trait Exporter<D> {
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F) -> Result<()>
    where
        F: FnOnce() -> D + 's;

    /* Unfiltered entry describing the whole export, kept apart from the named ones */
    fn set_summary(&mut self, summary: D) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

#[derive(Serialize)]
struct JsonDocument<'a, D> where D: Serialize {
    #[serde(skip_serializing_if = "Option::is_none")]
    chip: Option<&'a D>,
    tile_types: &'a BTreeMap<String, D>,
}

/// Gathers named entries and writes them out as one pretty-printed JSON object:
/// the summary under `chip` and the named entries under `tile_types`.
pub struct CompoundJsonExporter<D> where D: Serialize {
    filename: PathBuf,
    data: BTreeMap<String, D>,
    summary: Option<D>,
    checker: ExportChecker,
}

impl<D> CompoundJsonExporter<D> where D: Serialize {
    pub fn new(arg_list: &Option<Vec<String>>, filename: PathBuf) -> Self {
        Self {
            filename,
            data: BTreeMap::new(),
            summary: None,
            checker: ExportChecker::new(arg_list),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let doc = JsonDocument { chip: self.summary.as_ref(), tile_types: &self.data };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

impl<D> Exporter<D> for CompoundJsonExporter<D> where D: Serialize {
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F) -> Result<()>
    where
        F: FnOnce() -> D + 's
    {
        if self.checker.should_export(name) {
            let data = exporter();
            self.data.insert(name.into(), data);
        }
        Ok(())
    }

    fn set_summary(&mut self, summary: D) -> Result<()> {
        self.summary = Some(summary);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let data = self.to_json()?;
        let mut file = File::create(&self.filename)?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChipStats {
    TileType {
        wires: usize,
        pips: usize,
        bels: usize,
        instances: usize,
    },
    Chip {
        width: usize,
        height: usize,
        tile_types: usize,
        node_shapes: usize,
        tile_shapes: usize,
        strings: usize,
    },
}

/// Feeds per-tile-type statistics into `exporter`, with the chip-wide totals
/// as its summary.
pub fn export_chip_stats<E>(chip: &Chip, exporter: &mut E) -> Result<()> where
    E: Exporter<ChipStats>
{
    for (idx, tt) in chip.tile_types().iter().enumerate() {
        exporter.ignore_or_export(chip.strs.get(tt.type_name), || ChipStats::TileType {
            wires: tt.wires.len(),
            pips: tt.pips.len(),
            bels: tt.bels.len(),
            instances: chip.tiles().iter()
                .filter(|t| t.type_idx.map(|i| i.0) == Some(idx))
                .count(),
        })?;
    }
    exporter.set_summary(ChipStats::Chip {
        width: chip.width(),
        height: chip.height(),
        tile_types: chip.tile_types().len(),
        node_shapes: chip.node_shapes().len(),
        tile_shapes: chip.tile_shapes().len(),
        strings: chip.strs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_type_chip() -> Chip {
        let mut chip = Chip::new("test", "STATS", 3, 1);
        {
            let mut tt = chip.create_tile_type("A");
            tt.create_wire("W0", "");
            tt.create_wire("W1", "");
            tt.create_pip("W0", "W1").unwrap();
            tt.finalise().unwrap();
        }
        chip.create_tile_type("B").finalise().unwrap();
        chip.set_tile_type(0, 0, "A").unwrap();
        chip.set_tile_type(1, 0, "A").unwrap();
        chip.set_tile_type(2, 0, "B").unwrap();
        chip.flatten_tile_shapes().unwrap();
        chip
    }

    #[test]
    fn test_export_all() {
        let chip = two_type_chip();
        let mut exporter =
            CompoundJsonExporter::new(&Some(vec![":all".into()]), PathBuf::from("unused.json"));

        export_chip_stats(&chip, &mut exporter).unwrap();

        assert_eq!(exporter.data.len(), 2);
        assert_eq!(
            exporter.data["A"],
            ChipStats::TileType { wires: 2, pips: 1, bels: 0, instances: 2 }
        );
        let json: serde_json::Value = serde_json::from_str(&exporter.to_json().unwrap()).unwrap();
        assert_eq!(json["chip"]["tile_shapes"], 2);
        assert_eq!(json["tile_types"]["B"]["instances"], 1);
    }

    #[test]
    fn test_export_selected() {
        let chip = two_type_chip();
        let mut exporter =
            CompoundJsonExporter::new(&Some(vec!["B".into()]), PathBuf::from("unused.json"));

        export_chip_stats(&chip, &mut exporter).unwrap();

        assert_eq!(exporter.data.keys().collect::<Vec<_>>(), vec!["B"]);

        let mut none = CompoundJsonExporter::new(&None, PathBuf::from("unused.json"));
        export_chip_stats(&chip, &mut none).unwrap();
        assert!(none.data.is_empty());
        assert!(none.summary.is_some());
    }

    #[test]
    fn test_tile_type_named_like_chip() {
        let mut chip = two_type_chip();
        chip.name = "A".into();
        let mut exporter =
            CompoundJsonExporter::new(&Some(vec![":all".into()]), PathBuf::from("unused.json"));

        export_chip_stats(&chip, &mut exporter).unwrap();

        let json: serde_json::Value = serde_json::from_str(&exporter.to_json().unwrap()).unwrap();
        assert_eq!(json["tile_types"]["A"]["instances"], 2);
        assert_eq!(json["chip"]["width"], 3);
    }
}
