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

//! The chip grid and its deduplicated routing graph.
//!
//! Nodes merge tile-internal wires across tiles to create inter-tile
//! connectivity; a length-4 wire might connect (x, y, "E4AI") and
//! (x+3, y, "E4AO"). Each node is stored once as a shape relative to its
//! first ("root") wire. Tiles only record, per wire, either the shape index
//! (at the root) or the offset back to the root. Regular grids repeat the same
//! shapes over and over, so the shape table stays small.

pub mod node;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::io::Write;

pub use self::node::*;
use crate::bba::{serialise_table, BbaStruct, BbaWriter};
use crate::error::{ChipDbError, Result};
use crate::strings::{IdString, StringPool};
use crate::tile_type::{TileType, TileTypeBuilder, TileTypeIdx};
#[allow(unused)]
use crate::log::*;

pub const CHIPDB_MAGIC: u32 = 0x00ca7ca7;
pub const CHIPDB_VERSION: u32 = 1;

#[derive(Clone, Debug)]
pub struct TileInst {
    pub x: usize,
    pub y: usize,
    pub type_idx: Option<TileTypeIdx>,
    pub name_prefix: IdString,
    pub loc_type: u32,
    /* Grown on demand by `Chip::add_node`, unset entries are `RelNodeRef::TileWire` */
    pub wire_to_node: Vec<RelNodeRef>,
    /* Set by `Chip::flatten_tile_shapes` */
    pub shape_idx: Option<usize>,
}

impl TileInst {
    fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            type_idx: None,
            name_prefix: IdString::EMPTY,
            loc_type: 0,
            wire_to_node: Vec::new(),
            shape_idx: None,
        }
    }
}

impl BbaStruct for TileInst {
    fn serialise_lists<W: Write>(&self, _ctx: &str, _bba: &mut BbaWriter<W>) -> Result<()> {
        Ok(())
    }

    fn serialise<W: Write>(&self, _ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        let type_idx = self.type_idx
            .ok_or(ChipDbError::UntypedTile { x: self.x, y: self.y })?;
        let shape_idx = self.shape_idx.ok_or(ChipDbError::NotFlattened)?;
        bba.u32(self.name_prefix.index(), "name_prefix")?;
        bba.u32(to_u32("tile type", type_idx.0)?, "type")?;
        bba.u32(to_u32("tile shape", shape_idx)?, "shape")?;
        bba.u32(self.loc_type, "loc_type")?;
        bba.u32(0, "extra_data")
    }
}

fn to_u32(what: &'static str, idx: usize) -> Result<u32> {
    u32::try_from(idx).map_err(|_| ChipDbError::IndexOverflow(what, idx))
}

pub struct Chip {
    pub strs: StringPool,
    pub uarch: String,
    pub name: String,
    width: usize,
    height: usize,
    tile_types: Vec<TileType>,
    tile_type_idx: HashMap<String, TileTypeIdx>,
    /* Row-major, index is y * width + x */
    tiles: Vec<TileInst>,
    node_shapes: Vec<NodeShape>,
    node_shape_idx: HashMap<ShapeKey, usize>,
    tile_shapes: Vec<TileRoutingShape>,
    tile_shape_idx: HashMap<ShapeKey, usize>,
    flattened: bool,
}

impl Chip {
    pub fn new(uarch: &str, name: &str, width: usize, height: usize) -> Self {
        let tiles = (0 .. height)
            .flat_map(|y| (0 .. width).map(move |x| TileInst::new(x, y)))
            .collect();
        Self {
            strs: StringPool::new(),
            uarch: uarch.to_string(),
            name: name.to_string(),
            width,
            height,
            tile_types: Vec::new(),
            tile_type_idx: HashMap::new(),
            tiles,
            node_shapes: Vec::new(),
            node_shape_idx: HashMap::new(),
            tile_shapes: Vec::new(),
            tile_shape_idx: HashMap::new(),
            flattened: false,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn create_tile_type<'c>(&'c mut self, name: &str) -> TileTypeBuilder<'c> {
        let index = TileTypeIdx(self.tile_types.len());
        if let Some(prev) = self.tile_type_idx.insert(name.to_string(), index) {
            dbg_log!(DBG_WARN, "Tile type {} (#{}) redefined as #{}", name, prev.0, index.0);
        }
        self.tile_types.push(TileType::new(&mut self.strs, name));
        dbg_log!(DBG_INFO, "Created tile type {} (#{})", name, index.0);
        TileTypeBuilder {
            strs: &mut self.strs,
            tt: &mut self.tile_types[index.0],
            index,
        }
    }

    pub fn tile_type_mut<'c>(&'c mut self, index: TileTypeIdx) -> Result<TileTypeBuilder<'c>> {
        let tt = self.tile_types.get_mut(index.0)
            .ok_or(ChipDbError::InvalidIndex("tile type", index.0))?;
        Ok(TileTypeBuilder { strs: &mut self.strs, tt, index })
    }

    pub fn tile_type_index(&self, name: &str) -> Result<TileTypeIdx> {
        self.tile_type_idx.get(name)
            .copied()
            .ok_or_else(|| ChipDbError::UnknownTileType(name.to_string()))
    }

    pub fn tile_types(&self) -> &[TileType] {
        &self.tile_types
    }

    /// Finalises every tile type that is not finalised yet.
    pub fn finalise_tile_types(&mut self) -> Result<()> {
        for tt in self.tile_types.iter_mut().filter(|tt| !tt.is_finalised()) {
            tt.finalise(&self.strs)?;
        }
        Ok(())
    }

    fn tile_offset(&self, x: usize, y: usize) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(ChipDbError::OutOfBounds { x, y });
        }
        Ok(y * self.width + x)
    }

    pub fn tile(&self, x: usize, y: usize) -> Result<&TileInst> {
        Ok(&self.tiles[self.tile_offset(x, y)?])
    }

    pub fn tiles(&self) -> &[TileInst] {
        &self.tiles
    }

    pub fn set_tile_type(&mut self, x: usize, y: usize, type_name: &str) -> Result<()> {
        /* Node shapes were computed against the current tile types */
        if !self.node_shapes.is_empty() {
            return Err(ChipDbError::GridFrozen);
        }
        let type_idx = self.tile_type_index(type_name)?;
        let offset = self.tile_offset(x, y)?;
        self.tiles[offset].type_idx = Some(type_idx);
        Ok(())
    }

    pub fn set_tile_prefix(&mut self, x: usize, y: usize, prefix: &str) -> Result<()> {
        let offset = self.tile_offset(x, y)?;
        self.tiles[offset].name_prefix = self.strs.id(prefix);
        Ok(())
    }

    pub fn tile_type_at(&self, x: usize, y: usize) -> Result<&TileType> {
        let type_idx = self.tile(x, y)?.type_idx
            .ok_or(ChipDbError::UntypedTile { x, y })?;
        Ok(&self.tile_types[type_idx.0])
    }

    pub fn node_shapes(&self) -> &[NodeShape] {
        &self.node_shapes
    }

    pub fn tile_shapes(&self) -> &[TileRoutingShape] {
        &self.tile_shapes
    }

    /// Computes the shape of a node. Fails if any wire cannot be resolved
    /// or an offset does not fit in a relative reference.
    fn node_shape(&self, wires: &[NodeWire]) -> Result<NodeShape> {
        let root = wires.first().ok_or(ChipDbError::EmptyNode)?;
        let (x0, y0) = (root.x as i64, root.y as i64);

        let mut shape = NodeShape::default();
        for w in wires {
            let tt = self.tile_type_at(w.x, w.y)?;
            if !tt.is_finalised() {
                return Err(ChipDbError::NotFinalised(self.strs.get(tt.type_name).to_string()));
            }
            let wire = tt.wire_index(&self.strs, w.wire)?;
            let wire = u16::try_from(wire.0)
                .map_err(|_| ChipDbError::IndexOverflow("wire", wire.0))?;

            let (dx, dy) = (w.x as i64 - x0, w.y as i64 - y0);
            if dx > RelNodeRef::MAX_DX || dx < i16::MIN as i64
                || dy > i16::MAX as i64 || dy < i16::MIN as i64
            {
                return Err(ChipDbError::OffsetOverflow { dx, dy });
            }
            shape.wires.push(TileWireRef { dx: dx as i16, dy: dy as i16, wire });
        }
        Ok(shape)
    }

    /// Adds a node spanning `wires`; the first wire is the root. Returns the
    /// index of the (possibly shared) node shape.
    ///
    /// Tile types must be finalised and assigned to the grid before nodes are
    /// added. On error nothing is modified.
    pub fn add_node(&mut self, wires: &[NodeWire]) -> Result<usize> {
        if self.flattened {
            return Err(ChipDbError::ShapesFrozen);
        }
        let shape = self.node_shape(wires)?;
        let root_wire = shape.wires[0].wire;

        let key = shape.key();
        let shape_idx = match self.node_shape_idx.get(&key) {
            Some(idx) => *idx,
            None => {
                let idx = self.node_shapes.len();
                to_u32("node shape", idx)?;
                self.node_shape_idx.insert(key, idx);
                self.node_shapes.push(shape.clone());
                dbg_log!(DBG_EXTRA, "New node shape #{}: {:?}", idx, shape.wires);
                idx
            }
        };

        for (i, (w, rel)) in wires.iter().zip(shape.wires.iter()).enumerate() {
            /* Coordinates were validated by `node_shape` */
            let inst = &mut self.tiles[w.y * self.width + w.x];
            let wire_idx = rel.wire as usize;
            if wire_idx >= inst.wire_to_node.len() {
                inst.wire_to_node.resize(wire_idx + 1, RelNodeRef::TileWire);
            }
            inst.wire_to_node[wire_idx] = if i == 0 {
                /* The node is based here, so store the shape instead of a back-reference */
                RelNodeRef::Root { shape: shape_idx as u32 }
            } else {
                RelNodeRef::Backref { dx: rel.dx, dy: rel.dy, wire: root_wire }
            };
        }

        Ok(shape_idx)
    }

    /// Deduplicates the `wire_to_node` arrays of all tiles into tile shapes.
    /// No nodes can be added afterwards.
    pub fn flatten_tile_shapes(&mut self) -> Result<()> {
        if self.flattened {
            return Ok(());
        }
        /* Check everything first so that a failure leaves the chip untouched */
        for tile in &self.tiles {
            if tile.type_idx.is_none() {
                return Err(ChipDbError::UntypedTile { x: tile.x, y: tile.y });
            }
        }

        for tile in self.tiles.iter_mut() {
            let Some(type_idx) = tile.type_idx else { continue };
            let mut shape = TileRoutingShape { wire_to_node: tile.wire_to_node.clone() };
            let wire_count = self.tile_types[type_idx.0].wires.len();
            if shape.wire_to_node.len() < wire_count {
                shape.wire_to_node.resize(wire_count, RelNodeRef::TileWire);
            }

            let key = shape.key();
            let shape_idx = match self.tile_shape_idx.get(&key) {
                Some(idx) => *idx,
                None => {
                    let idx = self.tile_shapes.len();
                    self.tile_shape_idx.insert(key, idx);
                    self.tile_shapes.push(shape);
                    idx
                }
            };
            tile.shape_idx = Some(shape_idx);
        }
        self.flattened = true;

        dbg_log!(
            DBG_INFO,
            "{} tiles deduplicated into {} tile shapes, {} node shapes",
            self.tiles.len(), self.tile_shapes.len(), self.node_shapes.len()
        );
        Ok(())
    }

    pub fn is_flattened(&self) -> bool {
        self.flattened
    }

    /// Writes the whole database as a BBA stream. Tile shapes must have been
    /// flattened.
    pub fn write_bba<W: Write>(&self, out: W) -> Result<W> {
        if !self.flattened {
            return Err(ChipDbError::NotFlattened);
        }
        for tt in &self.tile_types {
            if !tt.is_finalised() {
                return Err(ChipDbError::NotFinalised(self.strs.get(tt.type_name).to_string()));
            }
        }

        let mut bba = BbaWriter::new(out);
        bba.pre("#include \"nextpnr.h\"")?;
        bba.pre("#include \"embed.h\"")?;
        bba.pre("NEXTPNR_NAMESPACE_BEGIN")?;
        bba.post(&format!(
            "EmbeddedFile chipdb_file_{uarch}_{name}(\"{uarch}/chipdb-{name}.bin\", chipdb_blob_{name});",
            uarch = self.uarch, name = self.name
        ))?;
        bba.post("NEXTPNR_NAMESPACE_END")?;
        bba.push(&format!("chipdb_blob_{}", self.name))?;
        bba.offset32()?;
        bba.reference("chip_info", "chip_info")?;

        self.serialise_lists("chip", &mut bba)?;
        self.serialise("chip", &mut bba)?;

        bba.pop()?;
        let out = bba.finish()?;
        dbg_log!(DBG_INFO, "Chip database {} written", self.name);
        Ok(out)
    }
}

impl BbaStruct for Chip {
    fn serialise_lists<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        self.strs.serialise_lists(ctx, bba)?;
        serialise_table("tile_types", &self.tile_types, bba)?;
        serialise_table("node_shapes", &self.node_shapes, bba)?;
        serialise_table("tile_shapes", &self.tile_shapes, bba)?;
        serialise_table("tile_insts", &self.tiles, bba)?;

        bba.label("uarch_name")?;
        bba.str(&self.uarch, "")?;
        bba.label("chip_name")?;
        bba.str(&self.name, "")?;
        bba.label("generator")?;
        bba.str(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")), "")?;
        bba.align()
    }

    fn serialise<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.label("chip_info")?;
        bba.u32(CHIPDB_MAGIC, "magic")?;
        bba.u32(CHIPDB_VERSION, "version")?;
        bba.u32(to_u32("width", self.width)?, "width")?;
        bba.u32(to_u32("height", self.height)?, "height")?;
        bba.reference("uarch_name", "uarch")?;
        bba.reference("chip_name", "name")?;
        bba.reference("generator", "generator")?;
        bba.slice("tile_types", self.tile_types.len(), "tile_types")?;
        bba.slice("tile_insts", self.tiles.len(), "tile_insts")?;
        bba.slice("node_shapes", self.node_shapes.len(), "node_shapes")?;
        bba.slice("tile_shapes", self.tile_shapes.len(), "tile_shapes")?;
        self.strs.serialise(ctx, bba)?;
        bba.u32(0, "extra_data")
    }
}
