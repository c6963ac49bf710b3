//! Wavefront OBJ 网格 (`Models/*.obj`)
//!
//! 解析分两步：[`ObjData`] 保留文件原始的顶点池和三角形（扇形三角化），
//! [`Mesh`] 再展开成逐角属性，缺失的法线按面补算，切线/副切线由 UV 差分
//! 推导。`usemtl` 切换记录为 [`MeshRange`]，供模型给每段分配材质层。

use glam::{Vec2, Vec3};

use crate::assets::{Asset, AssetKind, LoadContext};
use crate::errors::Result;

/// One face corner, indices already resolved to zero-based positions in the
/// [`ObjData`] pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjCorner {
    pub position: usize,
    pub uv: Option<usize>,
    pub normal: Option<usize>,
}

/// Raw parse of an OBJ file: attribute pools plus triangulated faces.
#[derive(Debug, Default, Clone)]
pub struct ObjData {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub triangles: Vec<[ObjCorner; 3]>,
    /// `usemtl` switches as (material name, first triangle index).
    pub groups: Vec<(String, usize)>,
}

/// OBJ indices are one-based; negative values count back from the end of
/// the pool as it stood on the face's line.
fn resolve_index(index: isize, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index.unsigned_abs() - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        None
    }
}

impl ObjData {
    /// Parses `text`, skipping malformed lines and faces with out-of-range
    /// indices. Never fails; a garbage file parses to an empty mesh.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut data = Self::default();
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => data.positions.push(read_vec3(&mut tokens)),
                Some("vt") => data.uvs.push(read_vec2(&mut tokens)),
                Some("vn") => data.normals.push(read_vec3(&mut tokens)),
                Some("usemtl") => {
                    let name = tokens.next().unwrap_or("").to_owned();
                    data.groups.push((name, data.triangles.len()));
                }
                Some("f") => {
                    let corners: Option<Vec<ObjCorner>> =
                        tokens.map(|token| data.parse_corner(token)).collect();
                    match corners {
                        Some(corners) if corners.len() >= 3 => {
                            // 扇形三角化
                            for i in 1..corners.len() - 1 {
                                data.triangles
                                    .push([corners[0], corners[i], corners[i + 1]]);
                            }
                        }
                        _ => log::warn!("skipping malformed face line: {line:?}"),
                    }
                }
                _ => {}
            }
        }
        data
    }

    /// `pos`, `pos/uv`, `pos//normal` or `pos/uv/normal`.
    fn parse_corner(&self, token: &str) -> Option<ObjCorner> {
        let mut parts = token.split('/');
        let position = resolve_index(parts.next()?.parse().ok()?, self.positions.len())?;
        let uv = match parts.next() {
            None | Some("") => None,
            Some(part) => Some(resolve_index(part.parse().ok()?, self.uvs.len())?),
        };
        let normal = match parts.next() {
            None | Some("") => None,
            Some(part) => Some(resolve_index(part.parse().ok()?, self.normals.len())?),
        };
        Some(ObjCorner {
            position,
            uv,
            normal,
        })
    }
}

fn read_vec3<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Vec3 {
    let mut axis = || {
        tokens
            .next()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    };
    Vec3::new(axis(), axis(), axis())
}

fn read_vec2<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Vec2 {
    let mut axis = || {
        tokens
            .next()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    };
    Vec2::new(axis(), axis())
}

// ============================================================================
// 展开后的网格
// ============================================================================

/// A contiguous run of corners drawn with one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshRange {
    pub name: String,
    /// First corner index.
    pub start: usize,
    /// Corner count, always a multiple of 3.
    pub count: usize,
}

/// Per-corner geometry expanded from [`ObjData`], ready to interleave into
/// a vertex buffer.
#[derive(Debug, Default, Clone)]
pub struct Mesh {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
    tangents: Vec<Vec3>,
    bitangents: Vec<Vec3>,
    ranges: Vec<MeshRange>,
}

impl Mesh {
    #[must_use]
    pub fn from_obj(data: &ObjData) -> Self {
        let corners = data.triangles.len() * 3;
        let mut mesh = Self {
            positions: Vec::with_capacity(corners),
            uvs: Vec::with_capacity(corners),
            normals: Vec::with_capacity(corners),
            tangents: Vec::with_capacity(corners),
            bitangents: Vec::with_capacity(corners),
            ranges: Vec::new(),
        };
        for triangle in &data.triangles {
            mesh.push_triangle(data, triangle);
        }
        mesh.ranges = collect_ranges(data);
        mesh
    }

    fn push_triangle(&mut self, data: &ObjData, triangle: &[ObjCorner; 3]) {
        let positions = triangle.map(|c| data.positions[c.position]);
        let uvs = triangle.map(|c| c.uv.map_or(Vec2::ZERO, |i| data.uvs[i]));

        // 没有法线就用面法线
        let face_normal = {
            let normal = (positions[1] - positions[0]).cross(positions[2] - positions[0]);
            if normal.length_squared() > f32::EPSILON {
                normal.normalize()
            } else {
                Vec3::Z
            }
        };
        let normals = triangle.map(|c| c.normal.map_or(face_normal, |i| data.normals[i]));

        let (tangent, bitangent) = tangent_frame(&positions, &uvs);

        self.positions.extend_from_slice(&positions);
        self.uvs.extend_from_slice(&uvs);
        self.normals.extend_from_slice(&normals);
        self.tangents.extend([tangent; 3]);
        self.bitangents.extend([bitangent; 3]);
    }

    // 访问器

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[must_use]
    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    #[must_use]
    pub fn tangents(&self) -> &[Vec3] {
        &self.tangents
    }

    #[must_use]
    pub fn bitangents(&self) -> &[Vec3] {
        &self.bitangents
    }

    #[must_use]
    pub fn ranges(&self) -> &[MeshRange] {
        &self.ranges
    }
}

/// Tangent and bitangent from the triangle's UV derivative. A degenerate
/// UV mapping falls back to the world axes.
fn tangent_frame(positions: &[Vec3; 3], uvs: &[Vec2; 3]) -> (Vec3, Vec3) {
    let edge1 = positions[1] - positions[0];
    let edge2 = positions[2] - positions[0];
    let duv1 = uvs[1] - uvs[0];
    let duv2 = uvs[2] - uvs[0];
    let det = duv1.x * duv2.y - duv2.x * duv1.y;
    if det.abs() <= f32::EPSILON {
        return (Vec3::X, Vec3::Y);
    }
    let r = 1.0 / det;
    let tangent = ((edge1 * duv2.y - edge2 * duv1.y) * r).normalize_or_zero();
    let bitangent = ((edge2 * duv1.x - edge1 * duv2.x) * r).normalize_or_zero();
    (tangent, bitangent)
}

/// `usemtl` groups as corner ranges. Files without any switch get a single
/// unnamed range; faces before the first switch form a leading unnamed one.
fn collect_ranges(data: &ObjData) -> Vec<MeshRange> {
    let total = data.triangles.len() * 3;
    if data.groups.is_empty() {
        return vec![MeshRange {
            name: String::new(),
            start: 0,
            count: total,
        }];
    }
    let mut ranges = Vec::new();
    if data.groups[0].1 > 0 {
        ranges.push(MeshRange {
            name: String::new(),
            start: 0,
            count: data.groups[0].1 * 3,
        });
    }
    for (i, (name, first)) in data.groups.iter().enumerate() {
        let end = data
            .groups
            .get(i + 1)
            .map_or(data.triangles.len(), |next| next.1);
        ranges.push(MeshRange {
            name: name.clone(),
            start: first * 3,
            count: (end - first) * 3,
        });
    }
    ranges
}

impl Asset for Mesh {
    type Params = ();
    const KIND: AssetKind = AssetKind::Mesh;

    fn new(_: &()) -> Self {
        Self::default()
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        *self = Self::default();
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let text = ctx.io().read_text(Self::KIND, ctx.name())?;
        *self = Self::from_obj(&ObjData::parse(&text));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
