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

use std::io::Write;

use sha2::{Digest, Sha256};

use crate::bba::{BbaStruct, BbaWriter};
use crate::error::Result;

/* Values of the `dx_mode` field that do not encode a tile offset */
pub const MODE_TILE_WIRE: i16 = 0x7000;
pub const MODE_IS_ROOT: i16 = 0x7001;
pub const MODE_ROW_CONST: i16 = 0x7002;
pub const MODE_GLB_CONST: i16 = 0x7003;

/// Content hash of a node or tile shape.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ShapeKey([u8; 32]);

impl ShapeKey {
    fn of_triples<I>(triples: I) -> Self where I: IntoIterator<Item = [u16; 3]> {
        let mut hasher = Sha256::new();
        for triple in triples {
            for field in triple {
                hasher.update(field.to_le_bytes());
            }
        }
        Self(hasher.finalize().into())
    }
}

/// A wire of a node given in absolute grid coordinates (pre-deduplication).
#[derive(Copy, Clone, Debug)]
pub struct NodeWire<'a> {
    pub x: usize,
    pub y: usize,
    pub wire: &'a str,
}

impl<'a> NodeWire<'a> {
    pub fn new(x: usize, y: usize, wire: &'a str) -> Self {
        Self { x, y, wire }
    }
}

/// A wire of a node shape, relative to the root tile of the node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct TileWireRef {
    pub dx: i16,
    pub dy: i16,
    pub wire: u16,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct NodeShape {
    pub wires: Vec<TileWireRef>,
}

impl NodeShape {
    /// Offsets are hashed as signed 16-bit values, so tiles north or west
    /// of the root do not alias anything.
    pub fn key(&self) -> ShapeKey {
        ShapeKey::of_triples(
            self.wires.iter().map(|w| [w.dx as u16, w.dy as u16, w.wire])
        )
    }
}

/// What a tile-local wire is, as seen from the routing graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum RelNodeRef {
    /// Not part of any node.
    #[default]
    TileWire,
    /// Root of a node, the node's wires are given by node shape `shape`.
    Root { shape: u32 },
    /// Part of a node rooted at wire `wire` of the tile at offset (`dx`, `dy`).
    Backref { dx: i16, dy: i16, wire: u16 },
    /// Member of a row-wide constant network. The payload is stored as-is.
    RowConst { dy: i16, wire: u16 },
    /// Member of the global constant network. The payload is stored as-is.
    GlobalConst { dy: i16, wire: u16 },
}

impl RelNodeRef {
    /// Largest horizontal offset a back-reference can hold.
    pub const MAX_DX: i64 = MODE_TILE_WIRE as i64 - 1;

    /// Packs the reference into the three 16-bit fields stored in the
    /// database: `dx_mode`, `dy` and `wire`.
    pub fn to_raw(&self) -> [u16; 3] {
        match *self {
            Self::TileWire => [MODE_TILE_WIRE as u16, 0, 0],
            Self::Root { shape } =>
                [MODE_IS_ROOT as u16, (shape & 0xFFFF) as u16, ((shape >> 16) & 0xFFFF) as u16],
            Self::Backref { dx, dy, wire } => [dx as u16, dy as u16, wire],
            Self::RowConst { dy, wire } => [MODE_ROW_CONST as u16, dy as u16, wire],
            Self::GlobalConst { dy, wire } => [MODE_GLB_CONST as u16, dy as u16, wire],
        }
    }

    /// Inverse of `to_raw`. Mode values that are reserved but not assigned
    /// yield `None`.
    pub fn from_raw(raw: [u16; 3]) -> Option<Self> {
        let [dx_mode, dy, wire] = raw;
        let r = match dx_mode as i16 {
            MODE_TILE_WIRE => Self::TileWire,
            MODE_IS_ROOT => Self::Root { shape: (dy as u32) | ((wire as u32) << 16) },
            MODE_ROW_CONST => Self::RowConst { dy: dy as i16, wire },
            MODE_GLB_CONST => Self::GlobalConst { dy: dy as i16, wire },
            dx if dx > MODE_GLB_CONST => return None,
            dx => Self::Backref { dx, dy: dy as i16, wire },
        };
        Some(r)
    }

    pub fn root_shape(&self) -> Option<u32> {
        match self {
            Self::Root { shape } => Some(*shape),
            _ => None,
        }
    }
}

impl BbaStruct for RelNodeRef {
    fn serialise_lists<W: Write>(&self, _ctx: &str, _bba: &mut BbaWriter<W>) -> Result<()> {
        Ok(())
    }

    fn serialise<W: Write>(&self, _ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        let [dx_mode, dy, wire] = self.to_raw();
        bba.u16(dx_mode, "dx_mode")?;
        bba.u16(dy, "dy")?;
        bba.u16(wire, "wire")
    }
}

impl BbaStruct for NodeShape {
    fn serialise_lists<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.label(&format!("{}_wires", ctx))?;
        for w in &self.wires {
            bba.i16(w.dx, "dx")?;
            bba.i16(w.dy, "dy")?;
            bba.u16(w.wire, "wire")?;
            bba.u16(0, "padding")?;
        }
        Ok(())
    }

    fn serialise<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.slice(&format!("{}_wires", ctx), self.wires.len(), "tile_wires")?;
        bba.i32(-1, "timing_index")
    }
}

/// The `wire_to_node` array of a tile, shared by every tile with the same
/// connectivity pattern.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TileRoutingShape {
    pub wire_to_node: Vec<RelNodeRef>,
}

impl TileRoutingShape {
    pub fn key(&self) -> ShapeKey {
        ShapeKey::of_triples(self.wire_to_node.iter().map(RelNodeRef::to_raw))
    }
}

impl BbaStruct for TileRoutingShape {
    fn serialise_lists<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.label(&format!("{}_w2n", ctx))?;
        for r in &self.wire_to_node {
            r.serialise(ctx, bba)?;
        }
        bba.align()
    }

    fn serialise<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.slice(&format!("{}_w2n", ctx), self.wire_to_node.len(), "wire_to_node")?;
        bba.i32(-1, "timing_index")
    }
}
