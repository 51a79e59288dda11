//! Wavefront MTL material library parser.
//!
//! Covers the Phong-style subset showcase models carry: colors, dissolve,
//! specular exponent, illumination model, and the diffuse/emission texture
//! references. Unknown directives are skipped.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::AssetError;

/// One parsed MTL material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtlMaterial {
    pub name: String,
    /// Ambient reflectance (Ka).
    pub ambient: Vec3,
    /// Diffuse color (Kd).
    pub diffuse: Vec3,
    /// Specular color (Ks).
    pub specular: Vec3,
    /// Emissive color (Ke).
    pub emission: Vec3,
    /// Specular exponent (Ns).
    pub specular_exponent: f32,
    /// Opacity (d); `Tr` lines store `1 - Tr` here.
    pub dissolve: f32,
    /// Illumination model index (illum).
    pub illumination_model: u32,
    /// Diffuse texture reference (map_Kd), kept as written.
    pub diffuse_map: Option<String>,
    /// Emission texture reference (map_Ke), kept as written.
    pub emission_map: Option<String>,
}

impl Default for MtlMaterial {
    fn default() -> Self {
        Self {
            name: "default".into(),
            ambient: Vec3::ONE,
            diffuse: Vec3::new(0.8, 0.8, 0.8),
            specular: Vec3::ZERO,
            emission: Vec3::ZERO,
            specular_exponent: 0.0,
            dissolve: 1.0,
            illumination_model: 2,
            diffuse_map: None,
            emission_map: None,
        }
    }
}

/// Parse an MTL source into a name-keyed material map.
///
/// Directives before the first `newmtl` are ignored, matching common
/// exporter output that opens with comment banners.
pub fn parse_mtl(source: &str) -> Result<BTreeMap<String, MtlMaterial>, AssetError> {
    let mut materials = BTreeMap::new();
    let mut current: Option<MtlMaterial> = None;

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
            "newmtl" => {
                if let Some(done) = current.take() {
                    materials.insert(done.name.clone(), done);
                }
                let name = tokens
                    .next()
                    .ok_or_else(|| AssetError::Mtl(format!("line {line}: newmtl without a name")))?
                    .to_string();
                current = Some(MtlMaterial {
                    name,
                    ..MtlMaterial::default()
                });
            }
            "Ka" => {
                if let Some(mat) = current.as_mut() {
                    mat.ambient = parse_color(&mut tokens, line, "Ka")?;
                }
            }
            "Kd" => {
                if let Some(mat) = current.as_mut() {
                    mat.diffuse = parse_color(&mut tokens, line, "Kd")?;
                }
            }
            "Ks" => {
                if let Some(mat) = current.as_mut() {
                    mat.specular = parse_color(&mut tokens, line, "Ks")?;
                }
            }
            "Ke" => {
                if let Some(mat) = current.as_mut() {
                    mat.emission = parse_color(&mut tokens, line, "Ke")?;
                }
            }
            "Ns" => {
                if let Some(mat) = current.as_mut() {
                    mat.specular_exponent = parse_scalar(&mut tokens, line, "Ns")?;
                }
            }
            "d" => {
                if let Some(mat) = current.as_mut() {
                    mat.dissolve = parse_scalar(&mut tokens, line, "d")?;
                }
            }
            "Tr" => {
                // Transparency is the inverse convention: d = 1 - Tr.
                if let Some(mat) = current.as_mut() {
                    mat.dissolve = 1.0 - parse_scalar(&mut tokens, line, "Tr")?;
                }
            }
            "illum" => {
                if let Some(mat) = current.as_mut() {
                    let token = tokens.next().ok_or_else(|| {
                        AssetError::Mtl(format!("line {line}: illum missing value"))
                    })?;
                    mat.illumination_model = token.parse().map_err(|_| {
                        AssetError::Mtl(format!("line {line}: illum invalid value '{token}'"))
                    })?;
                }
            }
            "map_Kd" => {
                if let Some(mat) = current.as_mut() {
                    mat.diffuse_map = Some(parse_path(&mut tokens, line, "map_Kd")?);
                }
            }
            "map_Ke" => {
                if let Some(mat) = current.as_mut() {
                    mat.emission_map = Some(parse_path(&mut tokens, line, "map_Ke")?);
                }
            }
            _ => {}
        }
    }

    if let Some(done) = current {
        materials.insert(done.name.clone(), done);
    }

    Ok(materials)
}

fn parse_scalar<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    keyword: &str,
) -> Result<f32, AssetError> {
    let token = tokens
        .next()
        .ok_or_else(|| AssetError::Mtl(format!("line {line}: {keyword} missing value")))?;
    token
        .parse()
        .map_err(|_| AssetError::Mtl(format!("line {line}: {keyword} invalid value '{token}'")))
}

fn parse_color<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    keyword: &str,
) -> Result<Vec3, AssetError> {
    let r = parse_scalar(tokens, line, keyword)?;
    let g = parse_scalar(tokens, line, keyword)?;
    let b = parse_scalar(tokens, line, keyword)?;
    Ok(Vec3::new(r, g, b))
}

/// Texture paths may contain spaces; take the rest of the line.
fn parse_path<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    keyword: &str,
) -> Result<String, AssetError> {
    let parts: Vec<&str> = tokens.collect();
    if parts.is_empty() {
        return Err(AssetError::Mtl(format!(
            "line {line}: {keyword} missing path"
        )));
    }
    Ok(parts.join(" "))
}
