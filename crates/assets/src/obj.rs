//! Wavefront OBJ geometry parser.
//!
//! Resolves the index/index/index face encoding into flat triangle lists
//! ready for GPU upload. Index pools are file-global, so sub-objects opened
//! by `o`/`g` share them. Faces are fan-triangulated; vertices are emitted
//! per corner without welding.

use serde::{Deserialize, Serialize};

use crate::AssetError;

/// One corner of a triangle, fully resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Triangulated geometry ready for upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// One `o`/`g` section with the material bound to its faces.
///
/// A `usemtl` switch after faces have been emitted opens a fresh section
/// under the same name, so each section carries exactly one material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjObject {
    pub name: String,
    pub material: Option<String>,
    pub mesh: MeshData,
}

/// A parsed OBJ file: sections in file order plus referenced libraries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjModel {
    pub objects: Vec<ObjObject>,
    pub material_libs: Vec<String>,
}

/// Parse an OBJ source. Sections without faces are dropped.
pub fn parse_obj(source: &str) -> Result<ObjModel, AssetError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut model = ObjModel::default();
    let mut current: Option<ObjObject> = None;

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut tokens = trimmed.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "v" => positions.push(parse_triple(&mut tokens, line, "v")?),
            "vn" => normals.push(parse_triple(&mut tokens, line, "vn")?),
            "vt" => uvs.push(parse_pair(&mut tokens, line, "vt")?),
            "o" | "g" => {
                flush(&mut model, &mut current);
                let name = rest_of_line(&mut tokens).unwrap_or_else(|| "default".into());
                current = Some(ObjObject {
                    name,
                    material: None,
                    mesh: MeshData::default(),
                });
            }
            "usemtl" => {
                let material = rest_of_line(&mut tokens);
                match current.as_mut() {
                    Some(obj) if obj.mesh.indices.is_empty() => obj.material = material,
                    Some(obj) => {
                        let name = obj.name.clone();
                        flush(&mut model, &mut current);
                        current = Some(ObjObject {
                            name,
                            material,
                            mesh: MeshData::default(),
                        });
                    }
                    None => {
                        current = Some(ObjObject {
                            name: "default".into(),
                            material,
                            mesh: MeshData::default(),
                        });
                    }
                }
            }
            "f" => {
                let obj = current.get_or_insert_with(|| ObjObject {
                    name: "default".into(),
                    material: None,
                    mesh: MeshData::default(),
                });
                let base = obj.mesh.vertices.len() as u32;
                let mut corners = 0u32;
                for token in tokens {
                    let vertex = parse_corner(token, line, &positions, &normals, &uvs)?;
                    obj.mesh.vertices.push(vertex);
                    corners += 1;
                }
                if corners < 3 {
                    return Err(AssetError::Obj(format!(
                        "line {line}: face with {corners} corners"
                    )));
                }
                // Fan triangulation around the first corner.
                for i in 1..corners - 1 {
                    obj.mesh.indices.push(base);
                    obj.mesh.indices.push(base + i);
                    obj.mesh.indices.push(base + i + 1);
                }
            }
            "mtllib" => {
                if let Some(lib) = rest_of_line(&mut tokens) {
                    model.material_libs.push(lib);
                }
            }
            _ => {}
        }
    }

    flush(&mut model, &mut current);
    Ok(model)
}

fn flush(model: &mut ObjModel, current: &mut Option<ObjObject>) {
    if let Some(obj) = current.take()
        && !obj.mesh.indices.is_empty()
    {
        model.objects.push(obj);
    }
}

/// Resolve one `pos[/uv[/normal]]` face corner against the global pools.
///
/// Positions must resolve; missing or dangling uv/normal references fall
/// back to defaults, which matches what common exporters rely on.
fn parse_corner(
    token: &str,
    line: usize,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
) -> Result<MeshVertex, AssetError> {
    let mut fields = token.split('/');
    let pos_field = fields.next().unwrap_or("");
    let uv_field = fields.next().unwrap_or("");
    let normal_field = fields.next().unwrap_or("");

    let pos_index = resolve_index(pos_field, positions.len(), line, "position")?;
    let position = positions[pos_index];

    let uv = if uv_field.is_empty() {
        [0.0, 0.0]
    } else {
        resolve_index(uv_field, uvs.len(), line, "uv")
            .ok()
            .and_then(|i| uvs.get(i).copied())
            .unwrap_or([0.0, 0.0])
    };

    let normal = if normal_field.is_empty() {
        [0.0, 1.0, 0.0]
    } else {
        resolve_index(normal_field, normals.len(), line, "normal")
            .ok()
            .and_then(|i| normals.get(i).copied())
            .unwrap_or([0.0, 1.0, 0.0])
    };

    Ok(MeshVertex {
        position,
        normal,
        uv,
    })
}

/// OBJ indices are 1-based; negative values count back from the end of the
/// pool as of this line.
fn resolve_index(
    field: &str,
    pool_len: usize,
    line: usize,
    what: &str,
) -> Result<usize, AssetError> {
    let value: i64 = field.parse().map_err(|_| {
        AssetError::Obj(format!("line {line}: invalid {what} index '{field}'"))
    })?;
    let resolved = if value > 0 {
        (value - 1) as usize
    } else if value < 0 {
        let back = (-value) as usize;
        if back > pool_len {
            return Err(AssetError::Obj(format!(
                "line {line}: {what} index {value} reaches before the pool"
            )));
        }
        pool_len - back
    } else {
        return Err(AssetError::Obj(format!("line {line}: {what} index 0")));
    };
    if resolved >= pool_len {
        return Err(AssetError::Obj(format!(
            "line {line}: {what} index {value} out of range ({pool_len} defined)"
        )));
    }
    Ok(resolved)
}

fn parse_float<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    keyword: &str,
) -> Result<f32, AssetError> {
    let token = tokens
        .next()
        .ok_or_else(|| AssetError::Obj(format!("line {line}: {keyword} missing component")))?;
    token
        .parse()
        .map_err(|_| AssetError::Obj(format!("line {line}: {keyword} invalid value '{token}'")))
}

fn parse_triple<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    keyword: &str,
) -> Result<[f32; 3], AssetError> {
    Ok([
        parse_float(tokens, line, keyword)?,
        parse_float(tokens, line, keyword)?,
        parse_float(tokens, line, keyword)?,
    ])
}

fn parse_pair<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    keyword: &str,
) -> Result<[f32; 2], AssetError> {
    Ok([
        parse_float(tokens, line, keyword)?,
        parse_float(tokens, line, keyword)?,
    ])
}

fn rest_of_line<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<String> {
    let parts: Vec<&str> = tokens.collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_triangle() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.objects.len(), 1);
        let mesh = &model.objects[0].mesh;
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn quads_fan_triangulate() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let model = parse_obj(source).unwrap();
        let mesh = &model.objects[0].mesh;
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn full_corner_form_resolves_all_attributes() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0.5 0.5
vn 0 0 1
f 1/1/1 2/1/1 3/1/1
";
        let model = parse_obj(source).unwrap();
        let v = model.objects[0].mesh.vertices[0];
        assert_eq!(v.uv, [0.5, 0.5]);
        assert_eq!(v.normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn position_and_normal_form_defaults_uv() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let model = parse_obj(source).unwrap();
        let v = model.objects[0].mesh.vertices[2];
        assert_eq!(v.uv, [0.0, 0.0]);
        assert_eq!(v.normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let model = parse_obj(source).unwrap();
        let mesh = &model.objects[0].mesh;
        assert_eq!(mesh.vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn objects_split_on_o_lines() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
o first
f 1 2 3
o second
f 3 2 1
";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.objects.len(), 2);
        assert_eq!(model.objects[0].name, "first");
        assert_eq!(model.objects[1].name, "second");
    }

    #[test]
    fn usemtl_binds_the_section_material() {
        let source = "\
mtllib showcase.mtl
v 0 0 0
v 1 0 0
v 0 1 0
o piece
usemtl Glaze
f 1 2 3
";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.material_libs, vec!["showcase.mtl"]);
        assert_eq!(model.objects[0].material.as_deref(), Some("Glaze"));
    }

    #[test]
    fn mid_object_material_switch_opens_a_new_section() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
o piece
usemtl A
f 1 2 3
usemtl B
f 3 2 1
";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.objects.len(), 2);
        assert_eq!(model.objects[0].material.as_deref(), Some("A"));
        assert_eq!(model.objects[1].material.as_deref(), Some("B"));
        assert_eq!(model.objects[1].name, "piece");
    }

    #[test]
    fn sections_without_faces_are_dropped() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\no empty\no real\nf 1 2 3\n";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.objects.len(), 1);
        assert_eq!(model.objects[0].name, "real");
    }

    #[test]
    fn out_of_range_position_is_an_error() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(matches!(err, AssetError::Obj(_)));
    }

    #[test]
    fn index_zero_is_an_error() {
        let err = parse_obj("v 0 0 0\nf 0 1 1\n").unwrap_err();
        assert!(matches!(err, AssetError::Obj(_)));
    }

    #[test]
    fn dangling_normal_reference_falls_back() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1//9 2//9 3//9\n";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.objects[0].mesh.vertices[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn dangling_uv_reference_falls_back() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/7 2/7 3/7\n";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.objects[0].mesh.vertices[0].uv, [0.0, 0.0]);
    }

    #[test]
    fn two_corner_face_is_an_error() {
        let err = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap_err();
        assert!(err.to_string().contains("2 corners"));
    }

    #[test]
    fn bad_float_reports_line() {
        let err = parse_obj("v 0 zero 0\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn empty_source_parses_to_no_objects() {
        let model = parse_obj("# header only\n").unwrap();
        assert!(model.objects.is_empty());
    }
}
