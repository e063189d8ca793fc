use super::*;
use crate::tile_type::PinType;

/* A `width` x `height` grid of a single tile type with wires A and B */
fn make_chip(width: usize, height: usize) -> Chip {
    let mut chip = Chip::new("test", "TEST", width, height);
    {
        let mut tt = chip.create_tile_type("T");
        tt.create_wire("A", "");
        tt.create_wire("B", "");
        tt.create_pip("A", "B").unwrap();
        tt.finalise().unwrap();
    }
    for y in 0 .. height {
        for x in 0 .. width {
            chip.set_tile_type(x, y, "T").unwrap();
        }
    }
    chip
}

#[test]
fn test_two_tile_node() {
    let mut chip = Chip::new("test", "TEST", 2, 1);
    {
        let mut tt = chip.create_tile_type("T");
        tt.create_wire("A", "");
        tt.finalise().unwrap();
    }
    chip.set_tile_type(0, 0, "T").unwrap();
    chip.set_tile_type(1, 0, "T").unwrap();

    let shape = chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(1, 0, "A")]).unwrap();

    assert_eq!(shape, 0);
    assert_eq!(chip.node_shapes().len(), 1);
    assert_eq!(chip.node_shapes()[0].wires, vec![
        TileWireRef { dx: 0, dy: 0, wire: 0 },
        TileWireRef { dx: 1, dy: 0, wire: 0 },
    ]);
    assert_eq!(chip.tile(0, 0).unwrap().wire_to_node, vec![RelNodeRef::Root { shape: 0 }]);
    assert_eq!(
        chip.tile(1, 0).unwrap().wire_to_node,
        vec![RelNodeRef::Backref { dx: 1, dy: 0, wire: 0 }]
    );
}

#[test]
fn test_same_topology_is_deduplicated() {
    let mut chip = make_chip(8, 8);

    let a = chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(1, 0, "B")]).unwrap();
    let b = chip.add_node(&[NodeWire::new(5, 5, "A"), NodeWire::new(6, 5, "B")]).unwrap();

    assert_eq!(a, b);
    assert_eq!(chip.node_shapes().len(), 1);
    assert_eq!(chip.tile(5, 5).unwrap().wire_to_node[0], RelNodeRef::Root { shape: a as u32 });
    assert_eq!(
        chip.tile(6, 5).unwrap().wire_to_node[1],
        RelNodeRef::Backref { dx: 1, dy: 0, wire: 0 }
    );
}

#[test]
fn test_different_topologies_are_distinct() {
    let mut chip = make_chip(4, 4);

    let east = chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(1, 0, "A")]).unwrap();
    let south = chip.add_node(&[NodeWire::new(2, 0, "A"), NodeWire::new(2, 1, "A")]).unwrap();
    let other_wire = chip.add_node(&[NodeWire::new(0, 2, "A"), NodeWire::new(1, 2, "B")]).unwrap();
    /* Same members, different root */
    let reversed = chip.add_node(&[NodeWire::new(1, 3, "A"), NodeWire::new(0, 3, "A")]).unwrap();

    assert_ne!(east, south);
    assert_ne!(east, other_wire);
    assert_ne!(south, other_wire);
    assert_ne!(east, reversed);
    assert_eq!(chip.node_shapes().len(), 4);
}

#[test]
fn test_negative_offsets() {
    let mut chip = make_chip(3, 3);

    let shape = chip.add_node(&[
        NodeWire::new(1, 1, "A"),
        NodeWire::new(0, 1, "B"),
        NodeWire::new(1, 0, "B"),
    ]).unwrap();

    assert_eq!(chip.node_shapes()[shape].wires[1], TileWireRef { dx: -1, dy: 0, wire: 1 });
    assert_eq!(chip.node_shapes()[shape].wires[2], TileWireRef { dx: 0, dy: -1, wire: 1 });
    assert_eq!(
        chip.tile(0, 1).unwrap().wire_to_node[1],
        RelNodeRef::Backref { dx: -1, dy: 0, wire: 0 }
    );
    assert_eq!(
        chip.tile(1, 0).unwrap().wire_to_node[1],
        RelNodeRef::Backref { dx: 0, dy: -1, wire: 0 }
    );

    /* The mirrored node must not share the shape */
    let mirrored = chip.add_node(&[
        NodeWire::new(1, 2, "A"),
        NodeWire::new(2, 2, "B"),
        NodeWire::new(1, 1, "B"),
    ]).unwrap();
    assert_ne!(shape, mirrored);
}

#[test]
fn test_wire_to_node_grows_lazily() {
    let mut chip = make_chip(2, 1);

    chip.add_node(&[NodeWire::new(0, 0, "B"), NodeWire::new(1, 0, "B")]).unwrap();

    assert_eq!(
        chip.tile(0, 0).unwrap().wire_to_node,
        vec![RelNodeRef::TileWire, RelNodeRef::Root { shape: 0 }]
    );
}

#[test]
fn test_offset_overflow_is_rejected() {
    let width = MODE_TILE_WIRE as usize + 1;
    let mut chip = make_chip(width, 1);

    let err = chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(width - 1, 0, "A")]);
    assert!(matches!(err, Err(ChipDbError::OffsetOverflow { dx: 0x7000, dy: 0 })));
    assert!(chip.node_shapes().is_empty());
    assert!(chip.tile(0, 0).unwrap().wire_to_node.is_empty());
    assert!(chip.tile(width - 1, 0).unwrap().wire_to_node.is_empty());

    /* One tile closer is still representable */
    chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(width - 2, 0, "A")]).unwrap();
    assert_eq!(
        chip.tile(width - 2, 0).unwrap().wire_to_node[0],
        RelNodeRef::Backref { dx: 0x6FFF, dy: 0, wire: 0 }
    );
}

#[test]
fn test_unresolved_node_wire() {
    let mut chip = make_chip(2, 1);

    let err = chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(1, 0, "C")]);
    assert!(matches!(err, Err(ChipDbError::UnknownWire { .. })));
    assert!(chip.node_shapes().is_empty());
    assert!(chip.tile(0, 0).unwrap().wire_to_node.is_empty());

    assert!(matches!(chip.add_node(&[]), Err(ChipDbError::EmptyNode)));
    assert!(matches!(
        chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(2, 0, "A")]),
        Err(ChipDbError::OutOfBounds { x: 2, y: 0 })
    ));
}

#[test]
fn test_node_requires_typed_finalised_tiles() {
    let mut chip = Chip::new("test", "TEST", 2, 1);
    {
        let mut tt = chip.create_tile_type("T");
        tt.create_wire("A", "");
    }
    chip.set_tile_type(0, 0, "T").unwrap();

    assert!(matches!(
        chip.add_node(&[NodeWire::new(0, 0, "A")]),
        Err(ChipDbError::NotFinalised(_))
    ));
    chip.finalise_tile_types().unwrap();
    assert!(matches!(
        chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(1, 0, "A")]),
        Err(ChipDbError::UntypedTile { x: 1, y: 0 })
    ));
    assert!(chip.node_shapes().is_empty());
}

#[test]
fn test_unknown_tile_type() {
    let mut chip = make_chip(1, 1);

    assert!(matches!(chip.set_tile_type(0, 0, "NOPE"), Err(ChipDbError::UnknownTileType(_))));
    assert!(matches!(chip.set_tile_type(1, 0, "T"), Err(ChipDbError::OutOfBounds { .. })));
    assert!(chip.tile_type_at(0, 0).is_ok());
}

#[test]
fn test_grid_is_frozen_by_nodes() {
    let mut chip = make_chip(2, 1);
    chip.add_node(&[NodeWire::new(0, 0, "A"), NodeWire::new(1, 0, "A")]).unwrap();

    assert!(matches!(chip.set_tile_type(0, 0, "T"), Err(ChipDbError::GridFrozen)));
}

#[test]
fn test_root_reference_round_trip() {
    for shape in (0 ..= 1u32 << 20).chain([u16::MAX as u32 + 1, u32::MAX]) {
        let r = RelNodeRef::Root { shape };
        let raw = r.to_raw();
        assert_eq!(raw[0], MODE_IS_ROOT as u16);
        assert_eq!(raw[1] as u32 | (raw[2] as u32) << 16, shape);
        assert_eq!(RelNodeRef::from_raw(raw), Some(r));
    }
}

#[test]
fn test_reference_encoding() {
    let refs = [
        RelNodeRef::TileWire,
        RelNodeRef::Backref { dx: -5, dy: 3, wire: 7 },
        RelNodeRef::Backref { dx: 0x6FFF, dy: -1, wire: 0 },
        RelNodeRef::Backref { dx: i16::MIN, dy: 0, wire: u16::MAX },
        RelNodeRef::RowConst { dy: 2, wire: 1 },
        RelNodeRef::GlobalConst { dy: 0, wire: 4 },
    ];
    for r in refs {
        assert_eq!(RelNodeRef::from_raw(r.to_raw()), Some(r));
    }

    assert_eq!(RelNodeRef::TileWire.to_raw(), [0x7000, 0, 0]);
    assert_eq!(RelNodeRef::Backref { dx: -1, dy: -2, wire: 3 }.to_raw(), [0xFFFF, 0xFFFE, 3]);
    /* Reserved, but unassigned */
    assert_eq!(RelNodeRef::from_raw([0x7004, 0, 0]), None);
    assert_eq!(RelNodeRef::from_raw([0x7FFF, 0, 0]), None);
}

#[test]
fn test_flatten_tile_shapes() {
    let mut chip = make_chip(4, 1);
    for x in 0 .. 3 {
        chip.add_node(&[NodeWire::new(x, 0, "A"), NodeWire::new(x + 1, 0, "B")]).unwrap();
    }

    chip.flatten_tile_shapes().unwrap();

    let shapes: Vec<_> = chip.tiles().iter().map(|t| t.shape_idx.unwrap()).collect();
    assert_eq!(chip.tile_shapes().len(), 3);
    assert_eq!(shapes[1], shapes[2]);
    assert_ne!(shapes[0], shapes[1]);
    assert_ne!(shapes[3], shapes[1]);
    assert_eq!(
        chip.tile_shapes()[shapes[0]].wire_to_node,
        vec![RelNodeRef::Root { shape: 0 }, RelNodeRef::TileWire]
    );
    assert_eq!(
        chip.tile_shapes()[shapes[3]].wire_to_node,
        vec![RelNodeRef::TileWire, RelNodeRef::Backref { dx: 1, dy: 0, wire: 0 }]
    );

    assert!(matches!(
        chip.add_node(&[NodeWire::new(0, 0, "B"), NodeWire::new(1, 0, "A")]),
        Err(ChipDbError::ShapesFrozen)
    ));
}

#[test]
fn test_flatten_pads_untouched_tiles() {
    let mut chip = make_chip(3, 1);
    chip.flatten_tile_shapes().unwrap();

    assert_eq!(chip.tile_shapes().len(), 1);
    assert_eq!(chip.tile_shapes()[0].wire_to_node, vec![RelNodeRef::TileWire; 2]);
}

#[test]
fn test_flatten_requires_typed_tiles() {
    let mut chip = Chip::new("test", "TEST", 2, 1);
    chip.create_tile_type("T").finalise().unwrap();
    chip.set_tile_type(0, 0, "T").unwrap();

    assert!(matches!(chip.flatten_tile_shapes(), Err(ChipDbError::UntypedTile { x: 1, y: 0 })));
    assert!(!chip.is_flattened());
    assert!(chip.tile_shapes().is_empty());
}

#[test]
fn test_write_bba() {
    let mut chip = Chip::new("example", "EX1", 2, 1);
    {
        let mut tt = chip.create_tile_type("LOGIC");
        tt.create_wire("I", "LUT_INPUT");
        tt.create_wire("O", "LUT_OUT");
        let lut = tt.create_bel("LUT", "LUT4", 0);
        tt.add_bel_pin(lut, "I0", "I", PinType::Input).unwrap();
        tt.add_bel_pin(lut, "O", "O", PinType::Output).unwrap();
        tt.create_pip("O", "I").unwrap();
        tt.finalise().unwrap();
    }
    chip.set_tile_type(0, 0, "LOGIC").unwrap();
    chip.set_tile_type(1, 0, "LOGIC").unwrap();
    chip.set_tile_prefix(1, 0, "R0C1_").unwrap();

    assert!(matches!(chip.write_bba(Vec::new()), Err(ChipDbError::NotFlattened)));

    chip.add_node(&[NodeWire::new(0, 0, "O"), NodeWire::new(1, 0, "I")]).unwrap();
    chip.flatten_tile_shapes().unwrap();
    let out = String::from_utf8(chip.write_bba(Vec::new()).unwrap()).unwrap();
    let lines: Vec<_> = out.lines().collect();

    assert_eq!(lines[0], "pre #include \"nextpnr.h\"");
    assert!(lines.contains(&"push chipdb_blob_EX1"));
    assert!(lines.contains(&"label chip_info"));
    assert!(lines.contains(&"label tile_types0_bels0_pins"));
    assert!(lines.contains(&"str |R0C1_| id 9"));
    assert!(lines.contains(&"u32 13270183 magic"));
    assert_eq!(*lines.last().unwrap(), "pop");
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("push")).count(),
        lines.iter().filter(|l| **l == "pop").count()
    );

    /* The chip_info record comes after everything it refers to */
    let info = lines.iter().position(|l| *l == "label chip_info").unwrap();
    let shapes = lines.iter().position(|l| *l == "label node_shapes").unwrap();
    assert!(shapes < info);
}

#[test]
fn test_write_bba_rejects_names_breaking_the_stream() {
    let mut chip = Chip::new("test", "TEST", 1, 1);
    {
        let mut tt = chip.create_tile_type("T");
        tt.create_wire("A\npop\nu8 0", "");
        tt.finalise().unwrap();
    }
    chip.set_tile_type(0, 0, "T").unwrap();
    chip.flatten_tile_shapes().unwrap();
    assert!(matches!(chip.write_bba(Vec::new()), Err(ChipDbError::InvalidToken { .. })));

    let mut chip = make_chip(1, 1);
    chip.name = "TWO WORDS".into();
    chip.flatten_tile_shapes().unwrap();
    assert!(matches!(chip.write_bba(Vec::new()), Err(ChipDbError::InvalidToken { .. })));
}
