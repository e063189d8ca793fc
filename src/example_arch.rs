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

//! A toy architecture: a grid of LUT4/FF logic tiles ringed by IO tiles, with
//! a BRAM column every 8 columns. The routing is a terrible switch matrix in
//! every tile plus direct connections to all 8 neighbours.

use crate::chip::{Chip, NodeWire};
use crate::error::Result;
use crate::tile_type::{PinType, TileTypeBuilder};
#[allow(unused)]
use crate::log::*;

/* LUT input count */
const K: usize = 4;
/* SLICEs per tile */
const N: usize = 8;
/* Number of local wires */
const WL: usize = N * (K + 1) + 16;
/* 1/Fc for bel input wire pips and bel output wire pips */
const SI: usize = 6;
const SQ: usize = 6;
/* IOs per IO tile */
const N_IO: usize = 2;
/* BRAM address and data width */
const AW: usize = 9;
const DW: usize = 16;

const DIRS: [(&str, i64, i64); 8] = [
    ("N", 0, -1),
    ("NE", 1, -1),
    ("E", 1, 0),
    ("SE", 1, 1),
    ("S", 0, 1),
    ("SW", -1, 1),
    ("W", -1, 0),
    ("NW", -1, -1),
];

fn create_switch_matrix(tt: &mut TileTypeBuilder, inputs: &[String], outputs: &[String])
    -> Result<()>
{
    for i in 0 .. WL {
        tt.create_wire(&format!("SWITCH{}", i), "SWITCH");
    }
    for i in 0 .. WL {
        for (d, _, _) in DIRS {
            tt.create_wire(&format!("{}{}", d, i), &format!("NEIGH_{}", d));
        }
    }
    for (i, w) in inputs.iter().enumerate() {
        for j in ((i % SI) .. WL).step_by(SI) {
            tt.create_pip(&format!("SWITCH{}", j), w)?;
        }
    }
    for (i, w) in outputs.iter().enumerate() {
        for j in ((i % SQ) .. WL).step_by(SQ) {
            tt.create_pip(w, &format!("SWITCH{}", j))?;
        }
    }
    for i in 0 .. WL {
        for (j, (d, _, _)) in DIRS.iter().enumerate() {
            tt.create_pip(&format!("{}{}", d, (i + j) % WL), &format!("SWITCH{}", i))?;
        }
    }
    /* Clock "ladder" */
    if !tt.has_wire("CLK") {
        tt.create_wire("CLK", "TILE_CLK");
    }
    tt.create_wire("CLK_PREV", "CLK_ROUTE");
    tt.create_pip("CLK_PREV", "CLK")?;
    Ok(())
}

fn create_logic_tiletype(chip: &mut Chip) -> Result<()> {
    let mut tt = chip.create_tile_type("LOGIC");
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for i in 0 .. N {
        for j in 0 .. K {
            inputs.push(format!("L{}_I{}", i, j));
            tt.create_wire(&format!("L{}_I{}", i, j), "LUT_INPUT");
        }
        tt.create_wire(&format!("L{}_D", i), "FF_DATA");
        tt.create_wire(&format!("L{}_O", i), "LUT_OUT");
        tt.create_wire(&format!("L{}_Q", i), "FF_OUT");
        outputs.push(format!("L{}_O", i));
        outputs.push(format!("L{}_Q", i));
    }
    tt.create_wire("CLK", "TILE_CLK");
    for i in 0 .. N {
        let lut = tt.create_bel(&format!("L{}_LUT", i), "LUT", (i * 2) as i16);
        for j in 0 .. K {
            tt.add_bel_pin(lut, &format!("I[{}]", j), &format!("L{}_I{}", i, j), PinType::Input)?;
        }
        tt.add_bel_pin(lut, "O", &format!("L{}_O", i), PinType::Output)?;
        /* FF data can come from LUT output or LUT I3 */
        tt.create_pip(&format!("L{}_O", i), &format!("L{}_D", i))?;
        tt.create_pip(&format!("L{}_I{}", i, K - 1), &format!("L{}_D", i))?;
        let ff = tt.create_bel(&format!("L{}_FF", i), "FF", (i * 2 + 1) as i16);
        tt.add_bel_pin(ff, "D", &format!("L{}_D", i), PinType::Input)?;
        tt.add_bel_pin(ff, "CLK", "CLK", PinType::Input)?;
        tt.add_bel_pin(ff, "Q", &format!("L{}_Q", i), PinType::Output)?;
    }
    create_switch_matrix(&mut tt, &inputs, &outputs)?;
    tt.finalise()
}

fn create_io_tiletype(chip: &mut Chip) -> Result<()> {
    let mut tt = chip.create_tile_type("IO");
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for i in 0 .. N_IO {
        tt.create_wire(&format!("IO{}_T", i), "IO_T");
        tt.create_wire(&format!("IO{}_I", i), "IO_I");
        tt.create_wire(&format!("IO{}_O", i), "IO_O");
        tt.create_wire(&format!("IO{}_PAD", i), "IO_PAD");
        inputs.push(format!("IO{}_T", i));
        inputs.push(format!("IO{}_I", i));
        outputs.push(format!("IO{}_O", i));
    }
    tt.create_wire("CLK", "TILE_CLK");
    for i in 0 .. N_IO {
        let io = tt.create_bel(&format!("IO{}", i), "IO", i as i16);
        tt.add_bel_pin(io, "I", &format!("IO{}_I", i), PinType::Input)?;
        tt.add_bel_pin(io, "T", &format!("IO{}_T", i), PinType::Input)?;
        tt.add_bel_pin(io, "O", &format!("IO{}_O", i), PinType::Output)?;
        tt.add_bel_pin(io, "PAD", &format!("IO{}_PAD", i), PinType::Inout)?;
    }
    create_switch_matrix(&mut tt, &inputs, &outputs)?;
    tt.finalise()
}

fn create_bram_tiletype(chip: &mut Chip) -> Result<()> {
    let mut tt = chip.create_tile_type("BRAM");
    let mut inputs: Vec<_> = (0 .. AW).map(|i| format!("RAM_WA{}", i)).collect();
    inputs.extend((0 .. AW).map(|i| format!("RAM_RA{}", i)));
    inputs.extend((0 .. DW / 8).map(|i| format!("RAM_WE{}", i)));
    inputs.extend((0 .. DW).map(|i| format!("RAM_DI{}", i)));
    let outputs: Vec<_> = (0 .. DW).map(|i| format!("RAM_DO{}", i)).collect();
    for w in &inputs {
        tt.create_wire(w, "RAM_IN");
    }
    for w in &outputs {
        tt.create_wire(w, "RAM_OUT");
    }
    tt.create_wire("CLK", "TILE_CLK");
    let ram = tt.create_bel("RAM", &format!("BRAM_{}X{}", 1 << AW, DW), 0);
    tt.add_bel_pin(ram, "CLK", "CLK", PinType::Input)?;
    for i in 0 .. AW {
        tt.add_bel_pin(ram, &format!("WA[{}]", i), &format!("RAM_WA{}", i), PinType::Input)?;
        tt.add_bel_pin(ram, &format!("RA[{}]", i), &format!("RAM_RA{}", i), PinType::Input)?;
    }
    for i in 0 .. DW / 8 {
        tt.add_bel_pin(ram, &format!("WE[{}]", i), &format!("RAM_WE{}", i), PinType::Input)?;
    }
    for i in 0 .. DW {
        tt.add_bel_pin(ram, &format!("DI[{}]", i), &format!("RAM_DI{}", i), PinType::Input)?;
        tt.add_bel_pin(ram, &format!("DO[{}]", i), &format!("RAM_DO{}", i), PinType::Output)?;
    }
    create_switch_matrix(&mut tt, &inputs, &outputs)?;
    tt.finalise()
}

fn tile_type_name(x: usize, y: usize, width: usize, height: usize) -> &'static str {
    let x_edge = x == 0 || x == width - 1;
    let y_edge = y == 0 || y == height - 1;
    match (x_edge, y_edge) {
        (true, true) => "NULL",
        (true, false) | (false, true) => "IO",
        _ if x % 8 == 4 => "BRAM",
        _ => "LOGIC",
    }
}

fn neighbour(x: usize, y: usize, dx: i64, dy: i64, width: usize, height: usize)
    -> Option<(usize, usize)>
{
    let x1 = usize::try_from(x as i64 + dx).ok().filter(|x1| *x1 < width)?;
    let y1 = usize::try_from(y as i64 + dy).ok().filter(|y1| *y1 < height)?;
    Some((x1, y1))
}

/// Builds the example chip, ready to be written out.
pub fn build(width: usize, height: usize) -> Result<Chip> {
    let mut chip = Chip::new("example", &format!("EX{}X{}", width, height), width, height);
    create_logic_tiletype(&mut chip)?;
    create_io_tiletype(&mut chip)?;
    create_bram_tiletype(&mut chip)?;
    chip.create_tile_type("NULL").finalise()?;

    for y in 0 .. height {
        for x in 0 .. width {
            chip.set_tile_type(x, y, tile_type_name(x, y, width, height))?;
            chip.set_tile_prefix(x, y, &format!("X{}Y{}/", x, y))?;
        }
    }

    let routed = |x: usize, y: usize| tile_type_name(x, y, width, height) != "NULL";
    let mut node_count = 0;
    for y in 0 .. height {
        for x in 0 .. width {
            if !routed(x, y) {
                continue;
            }
            for i in 0 .. WL {
                let switch = format!("SWITCH{}", i);
                let neigh: Vec<_> = DIRS.iter()
                    .filter_map(|(d, dx, dy)| {
                        neighbour(x, y, *dx, *dy, width, height)
                            .filter(|(x1, y1)| routed(*x1, *y1))
                            .map(|(x1, y1)| (x1, y1, format!("{}{}", d, i)))
                    })
                    .collect();
                let mut wires = vec![NodeWire::new(x, y, &switch)];
                wires.extend(neigh.iter().map(|(x1, y1, w)| NodeWire::new(*x1, *y1, w)));
                chip.add_node(&wires)?;
                node_count += 1;
            }
            if y + 1 < height && routed(x, y + 1) {
                chip.add_node(&[NodeWire::new(x, y, "CLK"), NodeWire::new(x, y + 1, "CLK_PREV")])?;
                node_count += 1;
            }
        }
    }
    dbg_log!(
        DBG_INFO,
        "Example chip: {} nodes deduplicated into {} node shapes",
        node_count, chip.node_shapes().len()
    );

    chip.flatten_tile_shapes()?;
    Ok(chip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::RelNodeRef;

    #[test]
    fn test_example_tile_types() {
        let chip = build(6, 6).unwrap();
        let logic = &chip.tile_types()[0];

        assert_eq!(chip.tile_types().len(), 4);
        assert_eq!(logic.bels.len(), 2 * N);
        /* Logic wires, clock, switch wires, neighbour wires and CLK_PREV */
        assert_eq!(logic.wires.len(), N * (K + 3) + 1 + WL + WL * DIRS.len() + 1);
        assert!(logic.is_finalised());
        assert_eq!(chip.strs.get(chip.tile_type_at(0, 0).unwrap().type_name), "NULL");
        assert_eq!(chip.strs.get(chip.tile_type_at(0, 2).unwrap().type_name), "IO");
        assert_eq!(chip.strs.get(chip.tile_type_at(4, 2).unwrap().type_name), "BRAM");
        assert_eq!(chip.strs.get(chip.tile_type_at(2, 2).unwrap().type_name), "LOGIC");
    }

    #[test]
    fn test_example_shapes_are_shared() {
        let small = build(12, 12).unwrap();
        let large = build(24, 24).unwrap();

        /* A bigger grid only repeats the same local patterns */
        assert_eq!(small.node_shapes().len(), large.node_shapes().len());
        assert_eq!(small.tile_shapes().len(), large.tile_shapes().len());
        assert!(large.tile_shapes().len() < large.tiles().len());

        let clk_prev = large.tile_type_at(2, 3).unwrap()
            .wire_index(&large.strs, "CLK_PREV").unwrap();
        let clk = large.tile_type_at(2, 2).unwrap()
            .wire_index(&large.strs, "CLK").unwrap();
        assert_eq!(
            large.tile(2, 3).unwrap().wire_to_node[clk_prev.0],
            RelNodeRef::Backref { dx: 0, dy: 1, wire: clk.0 as u16 }
        );
    }
}
