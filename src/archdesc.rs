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

//! Declarative architecture descriptions.
//!
//! A YAML document listing tile types, the grid and the nodes is turned into a
//! `Chip` through the same API an architecture script would use.

use std::path::Path;
use std::fs::File;
use std::io::{BufReader, Read};

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::chip::{Chip, NodeWire};
use crate::error::Result;
use crate::tile_type::PinType;
#[allow(unused)]
use crate::log::*;

#[derive(Deserialize, Debug)]
pub struct WireDesc {
    pub name: String,
    #[serde(default, rename = "type")]
    pub wire_type: String,
    #[serde(default)]
    pub flags: u32,
}

#[derive(Deserialize, Debug)]
pub struct PipDesc {
    pub src: String,
    pub dst: String,
    #[serde(default, rename = "type")]
    pub pip_type: String,
    #[serde(default)]
    pub flags: u32,
}

#[derive(Deserialize, Debug)]
pub struct BelPinDesc {
    pub name: String,
    pub wire: String,
    pub dir: PinType,
}

fn default_z() -> i16 {
    -1
}

#[derive(Deserialize, Debug)]
pub struct BelDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub bel_type: String,
    #[serde(default = "default_z")]
    pub z: i16,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub pins: Vec<BelPinDesc>,
}

#[derive(Deserialize, Debug)]
pub struct TileTypeDesc {
    pub name: String,
    #[serde(default)]
    pub wires: Vec<WireDesc>,
    #[serde(default)]
    pub pips: Vec<PipDesc>,
    #[serde(default)]
    pub bels: Vec<BelDesc>,
}

#[derive(Deserialize, Debug)]
pub struct TileDesc {
    pub x: usize,
    pub y: usize,
    #[serde(default, rename = "type")]
    pub tile_type: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ArchDesc {
    pub uarch: String,
    pub name: String,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub default_tile_type: Option<String>,
    pub tile_types: Vec<TileTypeDesc>,
    #[serde(default)]
    pub tiles: Vec<TileDesc>,
    /* Each node is a list of (x, y, wire), the first one being the root */
    #[serde(default)]
    pub nodes: Vec<Vec<(usize, usize, String)>>,
}

#[derive(Default)]
pub struct OpenOpts {
    pub gzip: bool,
}

pub fn open<P>(path: P, opts: OpenOpts) -> Result<ArchDesc> where
    P: AsRef<Path>,
{
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if opts.gzip {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(serde_yaml::from_reader(reader)?)
}

pub fn parse(text: &str) -> Result<ArchDesc> {
    Ok(serde_yaml::from_str(text)?)
}

impl ArchDesc {
    /// Builds the chip following the usual order: tile types, grid,
    /// finalisation, nodes and finally tile shape deduplication.
    pub fn build(&self) -> Result<Chip> {
        let mut chip = Chip::new(&self.uarch, &self.name, self.width, self.height);

        for ttd in &self.tile_types {
            let mut tt = chip.create_tile_type(&ttd.name);
            for w in &ttd.wires {
                let wire = tt.create_wire(&w.name, &w.wire_type);
                if w.flags != 0 {
                    tt.set_wire_flags(wire, w.flags)?;
                }
            }
            for p in &ttd.pips {
                let pip = tt.create_pip(&p.src, &p.dst)?;
                if !p.pip_type.is_empty() {
                    tt.set_pip_type(pip, &p.pip_type)?;
                }
                if p.flags != 0 {
                    tt.set_pip_flags(pip, p.flags)?;
                }
            }
            for b in &ttd.bels {
                let bel = tt.create_bel(&b.name, &b.bel_type, b.z);
                if b.flags != 0 {
                    tt.set_bel_flags(bel, b.flags)?;
                }
                for pin in &b.pins {
                    tt.add_bel_pin(bel, &pin.name, &pin.wire, pin.dir)?;
                }
            }
            tt.finalise()?;
        }

        if let Some(default) = &self.default_tile_type {
            for y in 0 .. self.height {
                for x in 0 .. self.width {
                    chip.set_tile_type(x, y, default)?;
                }
            }
        }
        for tile in &self.tiles {
            if let Some(tile_type) = &tile.tile_type {
                chip.set_tile_type(tile.x, tile.y, tile_type)?;
            }
            if let Some(prefix) = &tile.prefix {
                chip.set_tile_prefix(tile.x, tile.y, prefix)?;
            }
        }

        for node in &self.nodes {
            let wires: Vec<_> = node.iter()
                .map(|(x, y, wire)| NodeWire::new(*x, *y, wire))
                .collect();
            chip.add_node(&wires)?;
        }
        dbg_log!(
            DBG_INFO,
            "{} nodes deduplicated into {} node shapes",
            self.nodes.len(), chip.node_shapes().len()
        );

        chip.flatten_tile_shapes()?;
        Ok(chip)
    }
}
