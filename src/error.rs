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

/// Errors raised while building or emitting a chip database.
///
/// None of these are recoverable: a failing call leaves the database untouched
/// and the caller is expected to abort the build.
#[derive(Debug, thiserror::Error)]
pub enum ChipDbError {
    #[error("tile type {tile_type} has no wire named {wire}")]
    UnknownWire { tile_type: String, wire: String },

    #[error("unknown tile type {0}")]
    UnknownTileType(String),

    #[error("tile ({x}, {y}) has no tile type assigned")]
    UntypedTile { x: usize, y: usize },

    #[error("tile ({x}, {y}) is outside of the grid")]
    OutOfBounds { x: usize, y: usize },

    #[error("node offset ({dx}, {dy}) overlaps with reserved reference values")]
    OffsetOverflow { dx: i64, dy: i64 },

    #[error("{0} index {1} does not fit in the database field")]
    IndexOverflow(&'static str, usize),

    #[error("no {0} with index {1}")]
    InvalidIndex(&'static str, usize),

    #[error("a node needs at least one wire")]
    EmptyNode,

    #[error("tile type {0} has already been finalised")]
    AlreadyFinalised(String),

    #[error("tile type {0} has not been finalised")]
    NotFinalised(String),

    #[error("tile shapes have been flattened, no more nodes can be added")]
    ShapesFrozen,

    #[error("tile types cannot be reassigned once nodes have been added")]
    GridFrozen,

    #[error("tile shapes have not been flattened yet")]
    NotFlattened,

    #[error("pop without a matching push")]
    UnbalancedScope,

    #[error("label {0} is referenced but never declared")]
    UndeclaredLabel(String),

    #[error("label {0} is declared more than once")]
    DuplicateLabel(String),

    #[error("{what} {text:?} cannot be written to the BBA stream")]
    InvalidToken { what: &'static str, text: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("architecture description error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChipDbError>;
