/// STL file parser for binary and ASCII formats
use std::collections::HashMap;

use nalgebra::Point3;
use nom::{
    bytes::complete::{tag, take_till},
    character::complete::{multispace0, multispace1},
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::error::{R3dError, Result};
use crate::geometry::{Mesh, Triangle};

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh> {
    if data.len() < 84 {
        return Err(R3dError::Stl("file too small to be a valid STL".to_string()));
    }

    // Skip 80-byte header
    let data = &data[80..];

    let triangle_count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

    // 50 bytes per facet after the count
    let available = (data.len() - 4) / 50;
    if triangle_count > available {
        return Err(R3dError::Stl(format!(
            "header declares {triangle_count} triangles, data holds {available}"
        )));
    }

    let mut triangles = Vec::with_capacity(triangle_count);
    let mut offset = 4;

    for _ in 0..triangle_count {

        // Facet normal is recomputed from the winding
        offset += 12;

        let mut corners = [Point3::origin(); 3];
        for corner in &mut corners {
            *corner = Point3::new(
                f64::from(read_f32(data, offset)),
                f64::from(read_f32(data, offset + 4)),
                f64::from(read_f32(data, offset + 8)),
            );
            offset += 12;
        }

        // Skip attribute byte count (2 bytes)
        offset += 2;

        triangles.push(Triangle::new(corners[0], corners[1], corners[2]));
    }

    Ok(weld(&triangles))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh> {
    match parse_ascii_stl_impl(input) {
        Ok((_, triangles)) => Ok(weld(&triangles)),
        Err(e) => Err(R3dError::Stl(format!("failed to parse ASCII STL: {e:?}"))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Vec<Triangle>> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = take_till(|c| c == '\n')(input)?; // Optional name
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    Ok((input, triangles))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, _normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input)?;
    let (input, v2) = parse_vertex(input)?;
    let (input, v3) = parse_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str) -> IResult<&str, Point3<f64>> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Point3::new(f64::from(x), f64::from(y), f64::from(z))))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Merge corners with bit-identical positions into shared vertices
fn weld(triangles: &[Triangle]) -> Mesh {
    let mut lookup: HashMap<[u64; 3], usize> = HashMap::new();
    let mut mesh = Mesh::new();
    mesh.faces.reserve(triangles.len());

    for tri in triangles {
        let mut face = [0usize; 3];
        for (slot, p) in face.iter_mut().zip(tri.vertices.iter()) {
            let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
            *slot = *lookup.entry(key).or_insert_with(|| {
                mesh.vertices.push(*p);
                mesh.vertices.len() - 1
            });
        }
        mesh.faces.push(face);
    }
    mesh
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<Mesh> {
    // Binary files may also start with "solid" in their header
    if data.len() > 5 && &data[0..5] == b"solid" {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(mesh) = parse_ascii_stl(text) {
                return Ok(mesh);
            }
        }
    }

    parse_binary_stl(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binary_header() {
        let mut data = vec![0u8; 84];
        data[80..84].copy_from_slice(&0u32.to_le_bytes());

        let mesh = parse_binary_stl(&data).unwrap();
        assert_eq!(mesh.faces.len(), 0);
    }

    #[test]
    fn test_binary_truncated() {
        let mut data = vec![0u8; 100];
        data[80..84].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(parse_binary_stl(&data), Err(R3dError::Stl(_))));
    }

    #[test]
    fn test_huge_declared_count_is_an_error() {
        let mut data = vec![0u8; 84];
        data[80..84].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(parse_binary_stl(&data), Err(R3dError::Stl(_))));

        let mut text = b"solid broken\n".to_vec();
        text.resize(84, b' ');
        text[80..84].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(parse_stl(&text), Err(R3dError::Stl(_))));
    }

    #[test]
    fn test_ascii_facets_are_welded() {
        let text = "solid square
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 1 1 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid square
";
        let mesh = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces[1], [0, 2, 3]);
    }
}
