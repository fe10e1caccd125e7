//! OBJ file loader for 3D models
//!
//! Reads positions, texture coordinates and faces. Polygons are fan-triangulated
//! and identical vertices are merged so the index buffer does the sharing.

use crate::render::mesh::{Mesh, MeshBuilder, Vertex};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// OBJ parsing errors
#[derive(Error, Debug)]
pub enum ObjError {
    /// Underlying read failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A token could not be parsed
    #[error("Parse error on line {line}: {reason}")]
    ParseError {
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },
    /// The file parsed but does not describe a usable mesh
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Wavefront OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file and return a deduplicated mesh
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh, ObjError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mesh = Self::parse(BufReader::new(file))?;
        log::info!(
            "Loaded mesh {:?}: {} vertices, {} indices",
            path,
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(mesh)
    }

    /// Parse OBJ text from any buffered reader
    pub fn parse<R: BufRead>(reader: R) -> Result<Mesh, ObjError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut builder = MeshBuilder::new();

        for (line_index, line) in reader.lines().enumerate() {
            let line_number = line_index + 1;
            let line = line?;
            let mut parts = line.split_whitespace();

            match parts.next() {
                Some("v") => {
                    let [x, y, z] = parse_floats::<3>(&mut parts, line_number, "vertex position")?;
                    positions.push([x, y, z]);
                }
                Some("vt") => {
                    let [u, v] = parse_floats::<2>(&mut parts, line_number, "texture coordinate")?;
                    tex_coords.push([u, v]);
                }
                Some("f") => {
                    let corners = parts
                        .map(|token| {
                            resolve_corner(token, &positions, &tex_coords, line_number)
                        })
                        .collect::<Result<Vec<_>, _>>()?;

                    if corners.len() < 3 {
                        return Err(ObjError::ParseError {
                            line: line_number,
                            reason: format!("face has {} corners, need at least 3", corners.len()),
                        });
                    }

                    // Fan triangulation around the first corner
                    for i in 1..corners.len() - 1 {
                        builder.push(corners[0]);
                        builder.push(corners[i]);
                        builder.push(corners[i + 1]);
                    }
                }
                // Normals, groups, materials and comments are not used by the textured pipeline
                _ => {}
            }
        }

        let mesh = builder.build();
        if mesh.is_empty() {
            return Err(ObjError::InvalidFormat("No faces found in OBJ data".to_string()));
        }
        Ok(mesh)
    }
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
    line: usize,
    what: &str,
) -> Result<[f32; N], ObjError> {
    let mut values = [0.0; N];
    for value in &mut values {
        let token = parts.next().ok_or_else(|| ObjError::ParseError {
            line,
            reason: format!("{} needs {} components", what, N),
        })?;
        *value = token.parse().map_err(|_| ObjError::ParseError {
            line,
            reason: format!("invalid {} component '{}'", what, token),
        })?;
    }
    Ok(values)
}

/// Resolve a 1-based (or negative, relative) OBJ index into the list it refers to
fn resolve_index(token: &str, len: usize, line: usize) -> Result<usize, ObjError> {
    let raw: i64 = token.parse().map_err(|_| ObjError::ParseError {
        line,
        reason: format!("invalid index '{}'", token),
    })?;

    let index = match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => len.checked_sub(r.unsigned_abs() as usize),
    };

    index.filter(|&i| i < len).ok_or_else(|| ObjError::ParseError {
        line,
        reason: format!("index {} out of range (have {})", raw, len),
    })
}

fn resolve_corner(
    token: &str,
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    line: usize,
) -> Result<Vertex, ObjError> {
    let mut fields = token.split('/');

    let position_token = fields.next().unwrap_or_default();
    let pos = positions[resolve_index(position_token, positions.len(), line)?];

    let tex_coord = match fields.next() {
        Some(t) if !t.is_empty() => {
            let [u, v] = tex_coords[resolve_index(t, tex_coords.len(), line)?];
            // OBJ puts V=0 at the bottom of the image, Vulkan samples from the top
            [u, 1.0 - v]
        }
        _ => [0.0, 0.0],
    };

    Ok(Vertex::new(pos, DEFAULT_COLOR, tex_coord))
}
