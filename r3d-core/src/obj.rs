/// Wavefront OBJ reader and writer
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{char, i64 as index, space0, space1},
    combinator::{all_consuming, map, opt},
    multi::separated_list1,
    number::complete::double,
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::error::{R3dError, Result};
use crate::geometry::Mesh;

enum Statement {
    Vertex(Point3<f64>, Option<[f64; 4]>),
    Face(Vec<i64>),
}

/// Parse OBJ text into an indexed triangle mesh.
///
/// Only `v` and `f` statements are interpreted; polygons are fan
/// triangulated and texture/normal references on face corners are dropped.
pub fn parse_obj(input: &str) -> Result<Mesh> {
    let mut vertices = Vec::new();
    let mut colors: Vec<Option<[f64; 4]>> = Vec::new();
    let mut faces = Vec::new();

    for (line_no, raw) in input.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let is_vertex = line.starts_with("v ") || line.starts_with("v\t");
        let is_face = line.starts_with("f ") || line.starts_with("f\t");
        if !is_vertex && !is_face {
            continue;
        }

        let statement = match all_consuming(terminated(parse_statement, space0))(line) {
            Ok((_, statement)) => statement,
            Err(e) => {
                return Err(R3dError::Parse {
                    line: line_no + 1,
                    message: format!("malformed statement '{line}': {e:?}"),
                })
            }
        };

        match statement {
            Statement::Vertex(p, color) => {
                vertices.push(p);
                colors.push(color);
            }
            Statement::Face(refs) => {
                if refs.len() < 3 {
                    return Err(R3dError::Parse {
                        line: line_no + 1,
                        message: format!("face needs at least 3 vertices, got {}", refs.len()),
                    });
                }
                let resolved = refs
                    .iter()
                    .map(|&r| resolve_index(r, vertices.len(), line_no + 1))
                    .collect::<Result<Vec<_>>>()?;
                for i in 1..resolved.len() - 1 {
                    faces.push([resolved[0], resolved[i], resolved[i + 1]]);
                }
            }
        }
    }

    let mut mesh = Mesh::from_parts(vertices, faces)?;
    if colors.iter().any(Option::is_some) {
        mesh.colors = Some(
            colors
                .into_iter()
                .map(|c| c.map_or([255; 4], color_to_rgba))
                .collect(),
        );
    }
    Ok(mesh)
}

fn parse_statement(input: &str) -> IResult<&str, Statement> {
    alt((parse_vertex, parse_face))(input)
}

fn parse_vertex(input: &str) -> IResult<&str, Statement> {
    let (input, values) = preceded(tuple((tag("v"), space1)), separated_list1(space1, double))(input)?;
    let statement = match values.as_slice() {
        [x, y, z] | [x, y, z, _] => Statement::Vertex(Point3::new(*x, *y, *z), None),
        [x, y, z, r, g, b] => {
            let opaque = if [r, g, b].iter().all(|v| **v <= 1.0) { 1.0 } else { 255.0 };
            Statement::Vertex(Point3::new(*x, *y, *z), Some([*r, *g, *b, opaque]))
        }
        [x, y, z, r, g, b, a] => {
            Statement::Vertex(Point3::new(*x, *y, *z), Some([*r, *g, *b, *a]))
        }
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Count,
            )))
        }
    };
    Ok((input, statement))
}

fn parse_face(input: &str) -> IResult<&str, Statement> {
    map(
        preceded(tuple((tag("f"), space1)), separated_list1(space1, parse_face_ref)),
        Statement::Face,
    )(input)
}

/// `v`, `v/vt`, `v/vt/vn` or `v//vn`; only the position index is kept
fn parse_face_ref(input: &str) -> IResult<&str, i64> {
    terminated(
        index,
        opt(preceded(char('/'), take_till(|c: char| c.is_whitespace()))),
    )(input)
}

fn resolve_index(reference: i64, count: usize, line: usize) -> Result<usize> {
    let resolved = match reference {
        r if r > 0 => Some(r as usize - 1),
        r if r < 0 => count.checked_sub(r.unsigned_abs() as usize),
        _ => None,
    };
    match resolved {
        Some(i) if i < count => Ok(i),
        _ => Err(R3dError::Parse {
            line,
            message: format!("vertex reference {reference} out of range ({count} vertices so far)"),
        }),
    }
}

/// Colors are either unit floats or 0..255 values
fn color_to_rgba(c: [f64; 4]) -> [u8; 4] {
    let unit = c[..3].iter().all(|v| *v <= 1.0);
    c.map(|v| {
        let v = if unit { v * 255.0 } else { v };
        v.round().clamp(0.0, 255.0) as u8
    })
}

/// Write a mesh as OBJ text with 1-based face indices
pub fn write_obj<W: Write>(mesh: &Mesh, writer: &mut W) -> std::io::Result<()> {
    for (i, v) in mesh.vertices.iter().enumerate() {
        match mesh.colors.as_ref().and_then(|c| c.get(i)) {
            Some([r, g, b, a]) => writeln!(
                writer,
                "v {} {} {} {:.6} {:.6} {:.6} {:.6}",
                v.x,
                v.y,
                v.z,
                f64::from(*r) / 255.0,
                f64::from(*g) / 255.0,
                f64::from(*b) / 255.0,
                f64::from(*a) / 255.0
            )?,
            None => writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?,
        }
    }
    for [a, b, c] in &mesh.faces {
        writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}

pub fn load_obj(path: &Path) -> Result<Mesh> {
    let text = fs::read_to_string(path).map_err(R3dError::at(path))?;
    parse_obj(&text)
}

pub fn save_obj(mesh: &Mesh, path: &Path) -> Result<()> {
    let file = fs::File::create(path).map_err(R3dError::at(path))?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer).map_err(R3dError::at(path))?;
    writer.flush().map_err(R3dError::at(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# a unit quad
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vn 0 0 1
f 1/1/1 2/1/1 3/1/1 4/1/1
";

    #[test]
    fn test_parse_quad_is_fan_triangulated() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(mesh.colors.is_none());
    }

    #[test]
    fn test_negative_and_slash_slash_references() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3//1 -2//1 -1//1\n";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_vertex_colors() {
        let text = "v 0 0 0 1 0 0\nv 1 0 0 0 255 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(text).unwrap();
        let colors = mesh.colors.unwrap();
        assert_eq!(colors[0], [255, 0, 0, 255]);
        assert_eq!(colors[1], [0, 255, 0, 255]);
        assert_eq!(colors[2], [255, 255, 255, 255]);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_obj("v 0 0 0\nv 1 zero 0\n").unwrap_err();
        assert!(matches!(err, R3dError::Parse { line: 2, .. }));

        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, R3dError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_write_then_parse_preserves_geometry() {
        let cube = Mesh::cube(2.0);
        let mut out = Vec::new();
        write_obj(&cube, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("v -1 -1 -1\n"));

        let parsed = parse_obj(&text).unwrap();
        assert_eq!(parsed.vertices, cube.vertices);
        assert_eq!(parsed.faces, cube.faces);
    }
}
