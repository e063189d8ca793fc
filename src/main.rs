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

use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use flate2::write::GzEncoder;
use flate2::Compression;

use chipdbgen::archdesc::{self, OpenOpts};
use chipdbgen::exporter::{export_chip_stats, CompoundJsonExporter, Exporter};
use chipdbgen::log::*;
use chipdbgen::{dbg_log, example_arch, Chip, Result};

#[derive(Parser, Debug)]
#[clap(
    author = "Antmicro",
    version = "0.1.0",
    about = "Builds deduplicated nextpnr chip databases in BBA form",
    long_about = None
)]
struct Args {
    #[clap(help = "BBA output file")]
    bba: String,
    #[arg(long, help = "Gzip the BBA output")]
    compress: bool,
    #[arg(
        long,
        help = "Write tile type and chip statistics to this JSON file"
    )]
    json: Option<String>,
    #[arg(
        long,
        help = "Tile types to include in statistics, :all for everything"
    )]
    json_tile_types: Option<Vec<String>>,
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Parser, Debug)]
struct BuildCmd {
    #[arg(help = "Architecture description (YAML)")]
    arch: String,
    #[arg(long, help = "Architecture description is gzip-compressed")]
    gzip: bool,
}

#[derive(Parser, Debug)]
struct ExampleCmd {
    #[arg(long, default_value = "100", help = "Grid width, including IO tiles")]
    width: usize,
    #[arg(long, default_value = "100", help = "Grid height, including IO tiles")]
    height: usize,
}

#[derive(Parser, Debug)]
enum SubCommands {
    Build(BuildCmd),
    Example(ExampleCmd),
}

fn write_bba(chip: &Chip, path: &str, compress: bool) -> Result<()> {
    let file = File::create(path)?;
    if compress {
        let out = BufWriter::new(GzEncoder::new(file, Compression::default()));
        chip.write_bba(out)?
            .into_inner()
            .map_err(|e| e.into_error())?
            .finish()?;
    } else {
        let mut out = chip.write_bba(BufWriter::new(file))?;
        out.flush()?;
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let chip = match &args.command {
        SubCommands::Build(cmd) => {
            let desc = archdesc::open(&cmd.arch, OpenOpts { gzip: cmd.gzip })?;
            dbg_log!(DBG_INFO, "Loaded architecture description {}", cmd.arch);
            desc.build()?
        },
        SubCommands::Example(cmd) => example_arch::build(cmd.width, cmd.height)?,
    };

    println!(concat!(
        "Chip {} ({}x{}):\n",
        "    No. of tile types:   {}\n",
        "    No. of node shapes:  {}\n",
        "    No. of tile shapes:  {}\n",
        "    No. of strings:      {}"
        ),
        chip.name,
        chip.width(),
        chip.height(),
        chip.tile_types().len(),
        chip.node_shapes().len(),
        chip.tile_shapes().len(),
        chip.strs.len()
    );

    write_bba(&chip, &args.bba, args.compress)?;

    if let Some(json) = &args.json {
        let tile_types = args.json_tile_types.clone()
            .or_else(|| Some(vec![":all".to_string()]));
        let mut exporter = CompoundJsonExporter::new(&tile_types, PathBuf::from(json));
        export_chip_stats(&chip, &mut exporter)?;
        exporter.flush()?;
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        dbg_log!(DBG_CRITICAL, "{}", e);
        std::process::exit(1);
    }
}
