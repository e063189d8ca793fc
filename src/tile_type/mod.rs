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

//! Tile types describe one kind of grid location in terms of its contents:
//! bels (logic functionality like LUTs, FFs, IOs), tile-internal wires and
//! the pips that switch between them. Connectivity to other tiles is not
//! described here, see `crate::chip` for nodes.


use std::collections::HashMap;
use std::io::Write;

use serde::Deserialize;

use crate::bba::{serialise_table, BbaStruct, BbaWriter};
use crate::error::{ChipDbError, Result};
use crate::strings::{IdString, StringPool};
#[allow(unused)]
use crate::log::*;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct WireIdx(pub usize);

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PipIdx(pub usize);

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BelIdx(pub usize);

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TileTypeIdx(pub usize);

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Input,
    Output,
    Inout,
}

impl PinType {
    fn code(self) -> u32 {
        match self {
            Self::Input => 0,
            Self::Output => 1,
            Self::Inout => 2,
        }
    }
}

pub const BEL_FLAG_GLOBAL: u32 = 0x01;
pub const BEL_FLAG_HIDDEN: u32 = 0x02;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BelPin {
    pub name: IdString,
    pub wire: WireIdx,
    pub dir: PinType,
}

#[derive(Clone, Debug)]
pub struct BelData {
    pub index: BelIdx,
    pub name: IdString,
    pub bel_type: IdString,
    pub z: i16,
    pub flags: u32,
    pub site: u32,
    pub checker_idx: u32,
    pub pins: Vec<BelPin>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BelPinRef {
    pub bel: BelIdx,
    pub pin: IdString,
}

#[derive(Clone, Debug)]
pub struct TileWireData {
    pub index: WireIdx,
    pub name: IdString,
    pub wire_type: IdString,
    pub flags: u32,
    /* Not serialised, used to build the global constant networks */
    pub const_val: i32,
    /* Filled by `TileType::finalise` */
    pub pips_uphill: Vec<PipIdx>,
    pub pips_downhill: Vec<PipIdx>,
    /* Kept up to date by `TileType::add_bel_pin` */
    pub bel_pins: Vec<BelPinRef>,
}

#[derive(Clone, Debug)]
pub struct PipData {
    pub index: PipIdx,
    pub src_wire: WireIdx,
    pub dst_wire: WireIdx,
    pub pip_type: IdString,
    pub flags: u32,
    pub timing_idx: i32,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum BuildState {
    Building,
    Finalised,
}

pub struct TileType {
    pub type_name: IdString,
    pub bels: Vec<BelData>,
    pub pips: Vec<PipData>,
    pub wires: Vec<TileWireData>,
    state: BuildState,
    /* Kept for diagnostics raised without access to the string pool */
    name: String,
    /* Construction-only lookup, never serialised */
    wire2idx: HashMap<IdString, WireIdx>,
}

impl TileType {
    pub fn new(strs: &mut StringPool, name: &str) -> Self {
        Self {
            type_name: strs.id(name),
            bels: Vec::new(),
            pips: Vec::new(),
            wires: Vec::new(),
            state: BuildState::Building,
            name: name.to_string(),
            wire2idx: HashMap::new(),
        }
    }

    /// Creates a new wire. Creating two wires with the same name is allowed,
    /// but only the latest one can be found by name afterwards; the earlier
    /// one stays reachable through its index.
    pub fn create_wire(&mut self, strs: &mut StringPool, name: &str, wire_type: &str)
        -> WireIdx
    {
        let index = WireIdx(self.wires.len());
        let name = strs.id(name);
        if let Some(prev) = self.wire2idx.insert(name, index) {
            dbg_log!(
                DBG_WARN,
                "Wire {} (#{}) in tile type {} is shadowed by wire #{}",
                strs.get(name), prev.0, strs.get(self.type_name), index.0
            );
        }
        self.wires.push(TileWireData {
            index,
            name,
            wire_type: strs.id(wire_type),
            flags: 0,
            const_val: -1,
            pips_uphill: Vec::new(),
            pips_downhill: Vec::new(),
            bel_pins: Vec::new(),
        });
        index
    }

    pub fn has_wire(&self, strs: &StringPool, name: &str) -> bool {
        strs.lookup(name)
            .map(|id| self.wire2idx.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn wire_index(&self, strs: &StringPool, name: &str) -> Result<WireIdx> {
        strs.lookup(name)
            .and_then(|id| self.wire2idx.get(&id).copied())
            .ok_or_else(|| ChipDbError::UnknownWire {
                tile_type: strs.get(self.type_name).to_string(),
                wire: name.to_string(),
            })
    }

    pub fn create_bel(&mut self, strs: &mut StringPool, name: &str, bel_type: &str, z: i16)
        -> BelIdx
    {
        let index = BelIdx(self.bels.len());
        self.bels.push(BelData {
            index,
            name: strs.id(name),
            bel_type: strs.id(bel_type),
            z,
            flags: 0,
            site: 0,
            checker_idx: 0,
            pins: Vec::new(),
        });
        index
    }

    /// Attaches a pin to a bel and records the reverse reference on the wire.
    /// Nothing is modified if the wire cannot be found.
    pub fn add_bel_pin(
        &mut self,
        strs: &mut StringPool,
        bel: BelIdx,
        pin: &str,
        wire: &str,
        dir: PinType
    ) -> Result<()> {
        if bel.0 >= self.bels.len() {
            return Err(ChipDbError::InvalidIndex("bel", bel.0));
        }
        let wire = self.wire_index(strs, wire)?;
        let pin = strs.id(pin);
        self.bels[bel.0].pins.push(BelPin { name: pin, wire, dir });
        self.wires[wire.0].bel_pins.push(BelPinRef { bel, pin });
        Ok(())
    }

    pub fn create_pip(&mut self, strs: &StringPool, src: &str, dst: &str) -> Result<PipIdx> {
        if self.state == BuildState::Finalised {
            return Err(ChipDbError::AlreadyFinalised(strs.get(self.type_name).to_string()));
        }
        let src_wire = self.wire_index(strs, src)?;
        let dst_wire = self.wire_index(strs, dst)?;
        let index = PipIdx(self.pips.len());
        self.pips.push(PipData {
            index,
            src_wire,
            dst_wire,
            pip_type: IdString::EMPTY,
            flags: 0,
            timing_idx: -1,
        });
        Ok(index)
    }

    pub fn pip_mut(&mut self, pip: PipIdx) -> Result<&mut PipData> {
        self.pips.get_mut(pip.0).ok_or(ChipDbError::InvalidIndex("pip", pip.0))
    }

    pub fn bel_mut(&mut self, bel: BelIdx) -> Result<&mut BelData> {
        self.bels.get_mut(bel.0).ok_or(ChipDbError::InvalidIndex("bel", bel.0))
    }

    pub fn wire_mut(&mut self, wire: WireIdx) -> Result<&mut TileWireData> {
        self.wires.get_mut(wire.0).ok_or(ChipDbError::InvalidIndex("wire", wire.0))
    }

    pub fn is_finalised(&self) -> bool {
        self.state == BuildState::Finalised
    }

    /// Fills in the uphill/downhill pip lists of every wire. Can only be done
    /// once; pips cannot be added afterwards.
    pub fn finalise(&mut self, strs: &StringPool) -> Result<()> {
        if self.state == BuildState::Finalised {
            return Err(ChipDbError::AlreadyFinalised(strs.get(self.type_name).to_string()));
        }
        for pip in &self.pips {
            self.wires[pip.dst_wire.0].pips_uphill.push(pip.index);
            self.wires[pip.src_wire.0].pips_downhill.push(pip.index);
        }
        self.state = BuildState::Finalised;
        dbg_log!(
            DBG_INFO,
            "Finalised tile type {}: {} wires, {} pips, {} bels",
            strs.get(self.type_name), self.wires.len(), self.pips.len(), self.bels.len()
        );
        Ok(())
    }
}

/// Ties a tile type to the string pool of its chip for the duration of its
/// construction.
pub struct TileTypeBuilder<'c> {
    pub(crate) strs: &'c mut StringPool,
    pub(crate) tt: &'c mut TileType,
    pub(crate) index: TileTypeIdx,
}

impl<'c> TileTypeBuilder<'c> {
    pub fn index(&self) -> TileTypeIdx {
        self.index
    }

    pub fn tile_type(&self) -> &TileType {
        &*self.tt
    }

    pub fn create_wire(&mut self, name: &str, wire_type: &str) -> WireIdx {
        self.tt.create_wire(self.strs, name, wire_type)
    }

    pub fn has_wire(&self, name: &str) -> bool {
        self.tt.has_wire(&*self.strs, name)
    }

    pub fn create_bel(&mut self, name: &str, bel_type: &str, z: i16) -> BelIdx {
        self.tt.create_bel(self.strs, name, bel_type, z)
    }

    pub fn add_bel_pin(&mut self, bel: BelIdx, pin: &str, wire: &str, dir: PinType)
        -> Result<()>
    {
        self.tt.add_bel_pin(self.strs, bel, pin, wire, dir)
    }

    pub fn create_pip(&mut self, src: &str, dst: &str) -> Result<PipIdx> {
        self.tt.create_pip(&*self.strs, src, dst)
    }

    pub fn set_pip_type(&mut self, pip: PipIdx, pip_type: &str) -> Result<()> {
        let pip_type = self.strs.id(pip_type);
        self.tt.pip_mut(pip)?.pip_type = pip_type;
        Ok(())
    }

    pub fn set_pip_flags(&mut self, pip: PipIdx, flags: u32) -> Result<()> {
        self.tt.pip_mut(pip)?.flags = flags;
        Ok(())
    }

    pub fn set_bel_flags(&mut self, bel: BelIdx, flags: u32) -> Result<()> {
        self.tt.bel_mut(bel)?.flags = flags;
        Ok(())
    }

    pub fn set_wire_flags(&mut self, wire: WireIdx, flags: u32) -> Result<()> {
        self.tt.wire_mut(wire)?.flags = flags;
        Ok(())
    }

    pub fn finalise(&mut self) -> Result<()> {
        self.tt.finalise(&*self.strs)
    }
}

fn index_u32(what: &'static str, idx: usize) -> Result<u32> {
    u32::try_from(idx).map_err(|_| ChipDbError::IndexOverflow(what, idx))
}

impl BbaStruct for BelPin {
    fn serialise_lists<W: Write>(&self, _ctx: &str, _bba: &mut BbaWriter<W>) -> Result<()> {
        Ok(())
    }

    fn serialise<W: Write>(&self, _ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.u32(self.name.index(), "name")?;
        bba.u32(index_u32("wire", self.wire.0)?, "wire")?;
        bba.u32(self.dir.code(), "dir")
    }
}

impl BbaStruct for BelData {
    fn serialise_lists<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.label(&format!("{}_pins", ctx))?;
        for pin in &self.pins {
            pin.serialise(ctx, bba)?;
        }
        Ok(())
    }

    fn serialise<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.u32(self.name.index(), "name")?;
        bba.u32(self.bel_type.index(), "type")?;
        bba.i16(self.z, "z")?;
        bba.u16(0, "padding")?;
        bba.u32(self.flags, "flags")?;
        bba.u32(self.site, "site")?;
        bba.u32(self.checker_idx, "checker_idx")?;
        bba.slice(&format!("{}_pins", ctx), self.pins.len(), "pins")?;
        bba.u32(0, "extra_data")
    }
}

impl BbaStruct for TileWireData {
    fn serialise_lists<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.label(&format!("{}_uh", ctx))?;
        for pip in &self.pips_uphill {
            bba.u32(index_u32("pip", pip.0)?, "")?;
        }
        bba.label(&format!("{}_dh", ctx))?;
        for pip in &self.pips_downhill {
            bba.u32(index_u32("pip", pip.0)?, "")?;
        }
        bba.label(&format!("{}_bp", ctx))?;
        for bp in &self.bel_pins {
            bba.u32(index_u32("bel", bp.bel.0)?, "bel")?;
            bba.u32(bp.pin.index(), "pin")?;
        }
        Ok(())
    }

    fn serialise<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.u32(self.name.index(), "name")?;
        bba.u32(self.wire_type.index(), "type")?;
        bba.u32(self.flags, "flags")?;
        bba.slice(&format!("{}_uh", ctx), self.pips_uphill.len(), "pips_uh")?;
        bba.slice(&format!("{}_dh", ctx), self.pips_downhill.len(), "pips_dh")?;
        bba.slice(&format!("{}_bp", ctx), self.bel_pins.len(), "bel_pins")
    }
}

impl BbaStruct for PipData {
    fn serialise_lists<W: Write>(&self, _ctx: &str, _bba: &mut BbaWriter<W>) -> Result<()> {
        Ok(())
    }

    fn serialise<W: Write>(&self, _ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.u32(index_u32("wire", self.src_wire.0)?, "src_wire")?;
        bba.u32(index_u32("wire", self.dst_wire.0)?, "dst_wire")?;
        bba.u32(self.pip_type.index(), "type")?;
        bba.u32(self.flags, "flags")?;
        bba.i32(self.timing_idx, "timing_idx")
    }
}

impl BbaStruct for TileType {
    fn serialise_lists<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        if self.state != BuildState::Finalised {
            return Err(ChipDbError::NotFinalised(self.name.clone()));
        }
        serialise_table(&format!("{}_bels", ctx), &self.bels, bba)?;
        serialise_table(&format!("{}_wires", ctx), &self.wires, bba)?;
        serialise_table(&format!("{}_pips", ctx), &self.pips, bba)?;
        Ok(())
    }

    fn serialise<W: Write>(&self, ctx: &str, bba: &mut BbaWriter<W>) -> Result<()> {
        bba.u32(self.type_name.index(), "type_name")?;
        bba.slice(&format!("{}_bels", ctx), self.bels.len(), "bels")?;
        bba.slice(&format!("{}_wires", ctx), self.wires.len(), "wires")?;
        bba.slice(&format!("{}_pips", ctx), self.pips.len(), "pips")?;
        bba.u32(0, "extra_data")
    }
}
